//! Channel-voice message decoding.
//!
//! Channels exposed here are always 1-based (1-16). The status byte carries
//! the 0-based channel in its low nibble, so decoding adds one and encoding
//! subtracts one.

use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::pitch_bend;

/// Leading byte of a System Exclusive message.
pub const SYSEX_START: u8 = 0xF0;

/// Channel-voice command, stored as the status byte's high nibble.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MidiCommand {
    NoteOff = 0x80,
    NoteOn = 0x90,
    PolyKeyPressure = 0xA0,
    ControlChange = 0xB0,
    ProgramChange = 0xC0,
    ChannelPressure = 0xD0,
    PitchBend = 0xE0,
}

impl MidiCommand {
    /// Map a status byte onto its command. Returns `None` for data bytes and
    /// system messages.
    pub fn from_status(status: u8) -> Option<Self> {
        match status & 0xF0 {
            0x80 => Some(Self::NoteOff),
            0x90 => Some(Self::NoteOn),
            0xA0 => Some(Self::PolyKeyPressure),
            0xB0 => Some(Self::ControlChange),
            0xC0 => Some(Self::ProgramChange),
            0xD0 => Some(Self::ChannelPressure),
            0xE0 => Some(Self::PitchBend),
            _ => None,
        }
    }

    /// Build the status byte for a 1-based channel.
    #[inline]
    pub fn status(self, channel: u8) -> u8 {
        self as u8 + (channel.saturating_sub(1) & 0x0F)
    }
}

/// System real-time clock messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ClockMessage {
    Pulse = 0xF8,
    Start = 0xFA,
    Continue = 0xFB,
    Stop = 0xFC,
}

impl ClockMessage {
    pub fn from_status(status: u8) -> Option<Self> {
        match status {
            0xF8 => Some(Self::Pulse),
            0xFA => Some(Self::Start),
            0xFB => Some(Self::Continue),
            0xFC => Some(Self::Stop),
            _ => None,
        }
    }

    #[inline]
    pub fn status(self) -> u8 {
        self as u8
    }
}

/// A decoded channel-voice message. Immutable once decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelVoiceMessage {
    /// 1-based channel (1-16)
    pub channel: u8,
    pub command: MidiCommand,
    pub data1: u8,
    pub data2: u8,
}

impl ChannelVoiceMessage {
    /// Decode a status/data triple. Missing data bytes read as 0.
    ///
    /// Returns `None` when the status byte is not a channel-voice command.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let status = *bytes.first()?;
        let command = MidiCommand::from_status(status)?;
        Some(Self {
            channel: (status & 0x0F) + 1,
            command,
            data1: bytes.get(1).copied().unwrap_or(0),
            data2: bytes.get(2).copied().unwrap_or(0),
        })
    }

    #[inline]
    pub fn status(&self) -> u8 {
        self.command.status(self.channel)
    }
}

/// Note On / Note Off view over a channel-voice message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteMessage {
    pub message: ChannelVoiceMessage,
    pub note: u8,
    pub velocity: u8,
}

impl From<ChannelVoiceMessage> for NoteMessage {
    fn from(message: ChannelVoiceMessage) -> Self {
        Self {
            message,
            note: message.data1,
            velocity: message.data2,
        }
    }
}

impl Deref for NoteMessage {
    type Target = ChannelVoiceMessage;

    fn deref(&self) -> &ChannelVoiceMessage {
        &self.message
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlChangeMessage {
    pub message: ChannelVoiceMessage,
    pub control: u8,
    pub value: u8,
}

impl From<ChannelVoiceMessage> for ControlChangeMessage {
    fn from(message: ChannelVoiceMessage) -> Self {
        Self {
            message,
            control: message.data1,
            value: message.data2,
        }
    }
}

impl Deref for ControlChangeMessage {
    type Target = ChannelVoiceMessage;

    fn deref(&self) -> &ChannelVoiceMessage {
        &self.message
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramChangeMessage {
    pub message: ChannelVoiceMessage,
    pub program: u8,
    pub value: u8,
}

impl From<ChannelVoiceMessage> for ProgramChangeMessage {
    fn from(message: ChannelVoiceMessage) -> Self {
        Self {
            message,
            program: message.data1,
            value: message.data2,
        }
    }
}

impl Deref for ProgramChangeMessage {
    type Target = ChannelVoiceMessage;

    fn deref(&self) -> &ChannelVoiceMessage {
        &self.message
    }
}

/// Pitch bend normalized to roughly -1.0..=1.0.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PitchBendEvent {
    pub channel: u8,
    pub value: f64,
}

impl PitchBendEvent {
    pub fn from_message(message: &ChannelVoiceMessage) -> Self {
        Self {
            channel: message.channel,
            value: pitch_bend::from_bend(message.data1, message.data2),
        }
    }
}

/// Any message the decoder recognizes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MidiMessage {
    ChannelVoice(ChannelVoiceMessage),
    Clock(ClockMessage),
    /// Raw SysEx bytes, including the leading 0xF0.
    Sysex(Vec<u8>),
}

impl MidiMessage {
    /// Decode one packet from the wire.
    ///
    /// SysEx and clock bytes are recognized before channel/command
    /// decomposition. Anything else that is not a channel-voice command
    /// yields `None`.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let status = *bytes.first()?;
        if status == SYSEX_START {
            return Some(Self::Sysex(bytes.to_vec()));
        }
        if let Some(clock) = ClockMessage::from_status(status) {
            return Some(Self::Clock(clock));
        }
        ChannelVoiceMessage::from_bytes(bytes).map(Self::ChannelVoice)
    }
}
