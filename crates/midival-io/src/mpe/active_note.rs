//! Handle to a sounding MPE note.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use atomic_float::AtomicF64;
use midival_core::controller;

use crate::error::Result;
use crate::output::MidiOutput;

struct ActiveNoteInner {
    note: u8,
    velocity: u8,
    channel: u8,
    output: MidiOutput,
    pitch_bend: AtomicF64,
    timbre: AtomicU8,
    pressure: AtomicU8,
    active: AtomicBool,
}

/// A note started on a member channel by [`MpeOutputZone::send_note_on`].
///
/// Expression changes go straight out on the note's channel. After
/// [`note_off`](Self::note_off) the handle is inert: changes are ignored
/// and nothing more is sent.
///
/// [`MpeOutputZone::send_note_on`]: super::MpeOutputZone::send_note_on
#[derive(Clone)]
pub struct ActiveNote {
    inner: Arc<ActiveNoteInner>,
}

impl ActiveNote {
    /// Send the Note On and return the handle.
    pub(crate) fn start(output: MidiOutput, note: u8, velocity: u8, channel: u8) -> Result<Self> {
        output.send_note_on(note, velocity, Some(channel))?;
        Ok(Self {
            inner: Arc::new(ActiveNoteInner {
                note,
                velocity,
                channel,
                output,
                pitch_bend: AtomicF64::new(0.0),
                timbre: AtomicU8::new(0),
                pressure: AtomicU8::new(0),
                active: AtomicBool::new(true),
            }),
        })
    }

    pub fn note(&self) -> u8 {
        self.inner.note
    }

    pub fn velocity(&self) -> u8 {
        self.inner.velocity
    }

    pub fn channel(&self) -> u8 {
        self.inner.channel
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    pub fn pitch_bend(&self) -> f64 {
        self.inner.pitch_bend.load(Ordering::Relaxed)
    }

    pub fn timbre(&self) -> u8 {
        self.inner.timbre.load(Ordering::Relaxed)
    }

    pub fn pressure(&self) -> u8 {
        self.inner.pressure.load(Ordering::Relaxed)
    }

    /// Send a pitch bend in `[-1.0, 1.0]` on the note's channel.
    pub fn change_bend(&self, value: f64) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }
        self.inner.output.send_pitch_bend(value, Some(self.inner.channel))?;
        self.inner.pitch_bend.store(value, Ordering::Relaxed);
        Ok(())
    }

    /// Send the timbre controller (CC74) on the note's channel.
    pub fn change_timbre(&self, value: u8) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }
        self.inner
            .output
            .send_control_change(controller::TIMBRE, value, Some(self.inner.channel))?;
        self.inner.timbre.store(value & 0x7F, Ordering::Relaxed);
        Ok(())
    }

    /// Send channel pressure on the note's channel.
    pub fn change_pressure(&self, value: u8) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }
        self.inner
            .output
            .send_channel_pressure(value, Some(self.inner.channel))?;
        self.inner.pressure.store(value & 0x7F, Ordering::Relaxed);
        Ok(())
    }

    // MPE dimension aliases

    pub fn x(&self) -> f64 {
        self.pitch_bend()
    }

    pub fn y(&self) -> u8 {
        self.timbre()
    }

    pub fn z(&self) -> u8 {
        self.pressure()
    }

    pub fn set_x(&self, value: f64) -> Result<()> {
        self.change_bend(value)
    }

    pub fn set_y(&self, value: u8) -> Result<()> {
        self.change_timbre(value)
    }

    pub fn set_z(&self, value: u8) -> Result<()> {
        self.change_pressure(value)
    }

    /// Release the note. Only the first call sends Note Off.
    pub fn note_off(&self) -> Result<()> {
        if !self.inner.active.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        self.inner
            .output
            .send_note_off(self.inner.note, Some(self.inner.channel))
    }
}

impl fmt::Debug for ActiveNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveNote")
            .field("note", &self.note())
            .field("velocity", &self.velocity())
            .field("channel", &self.channel())
            .field("pitch_bend", &self.pitch_bend())
            .field("timbre", &self.timbre())
            .field("pressure", &self.pressure())
            .field("active", &self.is_active())
            .finish()
    }
}
