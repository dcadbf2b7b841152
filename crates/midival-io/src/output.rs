//! Typed MIDI output.
//!
//! [`MidiOutput`] encodes every outbound command into raw bytes for one host
//! port. The only state is the default channel used when a call passes
//! `None`.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use midival_core::{controller, pitch_bend, ClockMessage, MidiCommand, RegisteredParameter};
use smallvec::{smallvec, SmallVec};

use crate::error::{Error, Result};
use crate::port::MidiOutputPort;

/// Pause between the steps of a multi-message RPN sequence.
pub const DEFAULT_MESSAGE_DELAY: Duration = Duration::from_millis(100);

/// Selector value that deselects any registered parameter.
const RPN_NULL: u8 = 127;

type MessageBytes = SmallVec<[u8; 3]>;

fn validate_channel(channel: u8) -> Result<u8> {
    if (1..=16).contains(&channel) {
        Ok(channel)
    } else {
        Err(Error::InvalidChannel(channel))
    }
}

struct OutputInner {
    port: Arc<dyn MidiOutputPort>,
    default_channel: AtomicU8,
}

/// Typed writer over one output port. Clones share the port and the default
/// channel.
#[derive(Clone)]
pub struct MidiOutput {
    inner: Arc<OutputInner>,
}

impl MidiOutput {
    pub fn new(port: Arc<dyn MidiOutputPort>) -> Self {
        tracing::debug!("MIDI output attached: {} ({})", port.name(), port.id());
        Self {
            inner: Arc::new(OutputInner {
                port,
                default_channel: AtomicU8::new(1),
            }),
        }
    }

    pub fn id(&self) -> &str {
        self.inner.port.id()
    }

    pub fn name(&self) -> &str {
        self.inner.port.name()
    }

    pub fn manufacturer(&self) -> &str {
        self.inner.port.manufacturer()
    }

    pub fn port(&self) -> &Arc<dyn MidiOutputPort> {
        &self.inner.port
    }

    /// Default channel (1-16) for calls that pass `None`.
    pub fn channel(&self) -> u8 {
        self.inner.default_channel.load(Ordering::Relaxed)
    }

    pub fn set_channel(&self, channel: u8) -> Result<()> {
        let channel = validate_channel(channel)?;
        self.inner.default_channel.store(channel, Ordering::Relaxed);
        Ok(())
    }

    fn resolve_channel(&self, channel: Option<u8>) -> Result<u8> {
        match channel {
            Some(channel) => validate_channel(channel),
            None => Ok(self.channel()),
        }
    }

    fn status(&self, command: MidiCommand, channel: Option<u8>) -> Result<u8> {
        Ok(command.status(self.resolve_channel(channel)?))
    }

    /// Write raw bytes to the port.
    pub fn send(&self, data: &[u8]) -> Result<()> {
        self.inner.port.send(data)
    }

    fn send_voice(&self, command: MidiCommand, data: &[u8], channel: Option<u8>) -> Result<()> {
        let mut bytes: MessageBytes = smallvec![self.status(command, channel)?];
        if data.iter().any(|byte| byte & 0x80 != 0) {
            tracing::warn!(?command, ?data, "Data bytes above 127 masked to 7 bits");
        }
        bytes.extend(data.iter().map(|byte| byte & 0x7F));
        self.send(&bytes)
    }

    pub fn send_note_on(&self, note: u8, velocity: u8, channel: Option<u8>) -> Result<()> {
        self.send_voice(MidiCommand::NoteOn, &[note, velocity], channel)
    }

    /// Note Off with release velocity 0.
    pub fn send_note_off(&self, note: u8, channel: Option<u8>) -> Result<()> {
        self.send_voice(MidiCommand::NoteOff, &[note, 0], channel)
    }

    pub fn send_poly_key_pressure(&self, key: u8, pressure: u8, channel: Option<u8>) -> Result<()> {
        self.send_voice(MidiCommand::PolyKeyPressure, &[key, pressure], channel)
    }

    pub fn send_control_change(&self, control: u8, value: u8, channel: Option<u8>) -> Result<()> {
        self.send_voice(MidiCommand::ControlChange, &[control, value], channel)
    }

    pub fn send_program_change(&self, program: u8, channel: Option<u8>) -> Result<()> {
        self.send_voice(MidiCommand::ProgramChange, &[program], channel)
    }

    pub fn send_channel_pressure(&self, pressure: u8, channel: Option<u8>) -> Result<()> {
        self.send_voice(MidiCommand::ChannelPressure, &[pressure], channel)
    }

    /// Pitch bend from a fraction in -1.0..=1.0. Out-of-range values fail
    /// before anything is written.
    pub fn send_pitch_bend(&self, value: f64, channel: Option<u8>) -> Result<()> {
        let [lsb, msb] = pitch_bend::to_bend_bytes(value)?;
        self.send_voice(MidiCommand::PitchBend, &[lsb, msb], channel)
    }

    // ------------------------------------------------------------------
    // Channel mode
    // ------------------------------------------------------------------

    pub fn send_all_sound_off(&self, channel: Option<u8>) -> Result<()> {
        self.send_control_change(controller::ALL_SOUNDS_OFF, 0, channel)
    }

    pub fn send_reset_all_controllers(&self, channel: Option<u8>) -> Result<()> {
        self.send_control_change(controller::RESET_ALL_CONTROLLERS, 0, channel)
    }

    pub fn send_local_control_off(&self, channel: Option<u8>) -> Result<()> {
        self.send_control_change(controller::LOCAL_CONTROL, 0, channel)
    }

    pub fn send_local_control_on(&self, channel: Option<u8>) -> Result<()> {
        self.send_control_change(controller::LOCAL_CONTROL, 127, channel)
    }

    pub fn send_all_notes_off(&self, channel: Option<u8>) -> Result<()> {
        self.send_control_change(controller::ALL_NOTES_OFF, 0, channel)
    }

    // ------------------------------------------------------------------
    // Clock
    // ------------------------------------------------------------------

    pub fn send_clock_start(&self) -> Result<()> {
        self.send(&[ClockMessage::Start.status()])
    }

    pub fn send_clock_stop(&self) -> Result<()> {
        self.send(&[ClockMessage::Stop.status()])
    }

    pub fn send_clock_continue(&self) -> Result<()> {
        self.send(&[ClockMessage::Continue.status()])
    }

    pub fn send_clock_pulse(&self) -> Result<()> {
        self.send(&[ClockMessage::Pulse.status()])
    }

    // ------------------------------------------------------------------
    // Registered parameters
    // ------------------------------------------------------------------

    /// Select a registered parameter: CC101 (MSB) then CC100 (LSB).
    pub fn send_rpn_selection(&self, [msb, lsb]: [u8; 2], channel: Option<u8>) -> Result<()> {
        self.send_control_change(controller::RPN_MSB, msb, channel)?;
        self.send_control_change(controller::RPN_LSB, lsb, channel)
    }

    pub fn send_rp_data_msb(&self, value: u8, channel: Option<u8>) -> Result<()> {
        self.send_control_change(controller::DATA_ENTRY_MSB, value, channel)
    }

    pub fn send_rp_data_lsb(&self, value: u8, channel: Option<u8>) -> Result<()> {
        self.send_control_change(controller::DATA_ENTRY_LSB, value, channel)
    }

    pub fn increment_rp_data(&self, amount: u8, channel: Option<u8>) -> Result<()> {
        self.send_control_change(controller::DATA_INCREMENT, amount, channel)
    }

    pub fn decrement_rp_data(&self, amount: u8, channel: Option<u8>) -> Result<()> {
        self.send_control_change(controller::DATA_DECREMENT, amount, channel)
    }

    /// Deselect the current parameter so stray Data Entry is ignored.
    pub fn send_rpn_null(&self, channel: Option<u8>) -> Result<()> {
        self.send_rpn_selection([RPN_NULL, RPN_NULL], channel)
    }

    // ------------------------------------------------------------------
    // Timed sequences
    // ------------------------------------------------------------------

    /// Configure both MPE zones with the default step delay.
    pub async fn initialize_mpe(&self, lower_zone_size: u8, upper_zone_size: u8) -> Result<()> {
        self.initialize_mpe_with_delay(lower_zone_size, upper_zone_size, DEFAULT_MESSAGE_DELAY)
            .await
    }

    /// MPE Configuration Message: select on channel 1, lower zone size on
    /// channel 1, upper zone size on channel 16, then null both channels.
    /// A size of 0 disables that zone.
    pub async fn initialize_mpe_with_delay(
        &self,
        lower_zone_size: u8,
        upper_zone_size: u8,
        delay: Duration,
    ) -> Result<()> {
        tracing::debug!(
            lower_zone_size,
            upper_zone_size,
            "Sending MPE configuration to {}",
            self.id()
        );
        self.send_rpn_selection(RegisteredParameter::MpeConfigurationMessage.selector(), Some(1))?;
        tokio::time::sleep(delay).await;
        self.send_rp_data_msb(lower_zone_size, Some(1))?;
        tokio::time::sleep(delay).await;
        self.send_rp_data_msb(upper_zone_size, Some(16))?;
        tokio::time::sleep(delay).await;
        self.send_rpn_null(Some(1))?;
        self.send_rpn_null(Some(16))?;
        tokio::time::sleep(delay).await;
        Ok(())
    }

    /// Set the pitch bend range with the default step delay.
    pub async fn set_pitch_bend_sensitivity(
        &self,
        semitones: u8,
        cents: u8,
        channel: Option<u8>,
    ) -> Result<()> {
        self.set_pitch_bend_sensitivity_with_delay(semitones, cents, channel, DEFAULT_MESSAGE_DELAY)
            .await
    }

    /// Pitch Bend Sensitivity RPN: select, semitones as Data Entry MSB,
    /// cents as Data Entry LSB when nonzero, then null.
    pub async fn set_pitch_bend_sensitivity_with_delay(
        &self,
        semitones: u8,
        cents: u8,
        channel: Option<u8>,
        delay: Duration,
    ) -> Result<()> {
        // Resolve once so the whole sequence lands on one channel.
        let channel = Some(self.resolve_channel(channel)?);
        tracing::debug!(semitones, cents, ?channel, "Sending pitch bend sensitivity");

        self.send_rpn_selection(RegisteredParameter::PitchBendSensitivity.selector(), channel)?;
        tokio::time::sleep(delay).await;
        self.send_rp_data_msb(semitones, channel)?;
        if cents > 0 {
            self.send_rp_data_lsb(cents, channel)?;
        }
        tokio::time::sleep(delay).await;
        self.send_rpn_null(channel)
    }
}

impl std::fmt::Debug for MidiOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiOutput")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("channel", &self.channel())
            .finish()
    }
}
