//! MPE output: receiver configuration and member channel allocation.

use std::fmt;
use std::ops::RangeInclusive;
use std::time::Duration;

use midival_core::controller;
use parking_lot::Mutex;

use super::active_note::ActiveNote;
use super::{MpeZoneSizes, LOWER_ZONE_MASTER, UPPER_ZONE_MASTER};
use crate::error::Result;
use crate::output::MidiOutput;

/// Step delay for the MPE configuration and sensitivity sequences.
pub const MPE_MESSAGE_DELAY: Duration = Duration::from_millis(10);

/// One configured zone on an output.
///
/// New notes go to the member channel carrying the fewest active notes,
/// lowest channel first on ties.
pub struct MpeOutputZone {
    master_channel: u8,
    members: RangeInclusive<u8>,
    output: MidiOutput,
    notes: Mutex<Vec<ActiveNote>>,
}

impl MpeOutputZone {
    pub fn new(master_channel: u8, members: RangeInclusive<u8>, output: MidiOutput) -> Self {
        tracing::debug!(master_channel, ?members, "MPE output zone created");
        Self {
            master_channel,
            members,
            output,
            notes: Mutex::new(Vec::new()),
        }
    }

    pub fn master_channel(&self) -> u8 {
        self.master_channel
    }

    pub fn member_channels(&self) -> RangeInclusive<u8> {
        self.members.clone()
    }

    pub fn output(&self) -> &MidiOutput {
        &self.output
    }

    /// Start a note on the least loaded member channel.
    ///
    /// The note list is not locked during the send, so a loopback listener
    /// may read or drive the zone from its callback.
    pub fn send_note_on(&self, note: u8, velocity: u8) -> Result<ActiveNote> {
        let channel = {
            let mut notes = self.notes.lock();
            notes.retain(ActiveNote::is_active);
            self.least_loaded_channel(&notes)
        };
        let active = ActiveNote::start(self.output.clone(), note, velocity, channel)?;
        self.notes.lock().push(active.clone());
        Ok(active)
    }

    fn least_loaded_channel(&self, notes: &[ActiveNote]) -> u8 {
        let mut best = *self.members.start();
        let mut best_count = usize::MAX;
        for channel in self.members.clone() {
            let count = notes.iter().filter(|n| n.channel() == channel).count();
            if count < best_count {
                best = channel;
                best_count = count;
            }
        }
        best
    }

    /// Active note count for every member channel, in channel order.
    pub fn notes_per_channel(&self) -> Vec<(u8, usize)> {
        let notes = self.notes.lock();
        self.members
            .clone()
            .map(|channel| {
                let count = notes
                    .iter()
                    .filter(|n| n.is_active() && n.channel() == channel)
                    .count();
                (channel, count)
            })
            .collect()
    }

    pub fn active_notes(&self) -> Vec<ActiveNote> {
        self.notes
            .lock()
            .iter()
            .filter(|n| n.is_active())
            .cloned()
            .collect()
    }

    pub fn set_master_pitch_bend(&self, value: f64) -> Result<()> {
        self.output.send_pitch_bend(value, Some(self.master_channel))
    }

    pub fn set_master_timbre(&self, value: u8) -> Result<()> {
        self.output
            .send_control_change(controller::TIMBRE, value, Some(self.master_channel))
    }

    pub fn set_master_pressure(&self, value: u8) -> Result<()> {
        self.output
            .send_channel_pressure(value, Some(self.master_channel))
    }

    pub async fn set_master_pitch_bend_sensitivity(&self, semitones: u8, cents: u8) -> Result<()> {
        self.output
            .set_pitch_bend_sensitivity_with_delay(
                semitones,
                cents,
                Some(self.master_channel),
                MPE_MESSAGE_DELAY,
            )
            .await
    }

    /// Set the pitch bend range on every member channel, one after another.
    pub async fn set_member_pitch_bend_sensitivity(&self, semitones: u8, cents: u8) -> Result<()> {
        for channel in self.members.clone() {
            self.output
                .set_pitch_bend_sensitivity_with_delay(
                    semitones,
                    cents,
                    Some(channel),
                    MPE_MESSAGE_DELAY,
                )
                .await?;
        }
        Ok(())
    }
}

impl fmt::Debug for MpeOutputZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpeOutputZone")
            .field("master_channel", &self.master_channel)
            .field("members", &self.members)
            .field("active_notes", &self.notes.lock().len())
            .finish()
    }
}

/// MPE sender over a [`MidiOutput`].
#[derive(Debug)]
pub struct MpeOutput {
    output: MidiOutput,
    lower: Option<MpeOutputZone>,
    upper: Option<MpeOutputZone>,
}

impl MpeOutput {
    /// Send the MPE Configuration Message for `sizes` and build the matching
    /// zones. A zone of size 0 is left out.
    pub async fn connect(output: MidiOutput, sizes: MpeZoneSizes) -> Result<Self> {
        output
            .initialize_mpe_with_delay(
                sizes.lower_zone_size,
                sizes.upper_zone_size,
                MPE_MESSAGE_DELAY,
            )
            .await?;

        let lower = (sizes.lower_zone_size > 0).then(|| {
            let last = LOWER_ZONE_MASTER.saturating_add(sizes.lower_zone_size).min(15);
            MpeOutputZone::new(LOWER_ZONE_MASTER, 2..=last, output.clone())
        });
        let upper = (sizes.upper_zone_size > 0).then(|| {
            let first = UPPER_ZONE_MASTER.saturating_sub(sizes.upper_zone_size).max(2);
            MpeOutputZone::new(UPPER_ZONE_MASTER, first..=15, output.clone())
        });

        Ok(Self {
            output,
            lower,
            upper,
        })
    }

    /// Turn MPE off on the receiver and drop both zones.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.output
            .initialize_mpe_with_delay(0, 0, MPE_MESSAGE_DELAY)
            .await?;
        self.lower = None;
        self.upper = None;
        tracing::debug!("MPE output disconnected: {}", self.output.id());
        Ok(())
    }

    pub fn output(&self) -> &MidiOutput {
        &self.output
    }

    pub fn lower_zone(&self) -> Option<&MpeOutputZone> {
        self.lower.as_ref()
    }

    pub fn upper_zone(&self) -> Option<&MpeOutputZone> {
        self.upper.as_ref()
    }
}
