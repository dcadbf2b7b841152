//! MIDI Polyphonic Expression (MPE) zones.
//!
//! A zone is a master channel plus a contiguous range of member channels.
//! The lower zone is mastered on channel 1 and the upper zone on channel 16.
//!
//! - Input: [`MpeInput`] follows MPE Configuration Messages and keeps one
//!   [`MpeInputZone`] per active zone, which splits traffic into master and
//!   member events.
//! - Output: [`MpeOutput`] configures the receiver and hands out
//!   [`MpeOutputZone`]s that allocate member channels to new notes.

mod active_note;
mod input;
mod input_zone;
mod output;

pub use active_note::ActiveNote;
pub use input::{MpeInput, ZoneUpdate, ZoneUpdateKind};
pub use input_zone::{MemberPitchBend, MemberValue, MpeInputZone, MpeZoneEvent, MpeZoneEventKind};
pub use output::{MpeOutput, MpeOutputZone, MPE_MESSAGE_DELAY};

use serde::{Deserialize, Serialize};

/// Master channel of the lower zone.
pub const LOWER_ZONE_MASTER: u8 = 1;
/// Master channel of the upper zone.
pub const UPPER_ZONE_MASTER: u8 = 16;

/// Member counts for both zones. A size of 0 disables the zone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MpeZoneSizes {
    pub lower_zone_size: u8,
    pub upper_zone_size: u8,
}

impl MpeZoneSizes {
    pub fn new(lower_zone_size: u8, upper_zone_size: u8) -> Self {
        Self {
            lower_zone_size,
            upper_zone_size,
        }
    }

    pub fn with_lower_zone(mut self, size: u8) -> Self {
        self.lower_zone_size = size;
        self
    }

    pub fn with_upper_zone(mut self, size: u8) -> Self {
        self.upper_zone_size = size;
        self
    }
}
