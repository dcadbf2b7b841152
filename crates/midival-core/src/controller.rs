//! Control Change controller numbers used by the decoder and encoder.

pub const DATA_ENTRY_MSB: u8 = 6;
pub const DATA_ENTRY_LSB: u8 = 38;
/// Sound Controller 5, the MPE "timbre" (Y axis) dimension.
pub const TIMBRE: u8 = 74;
pub const DATA_INCREMENT: u8 = 96;
pub const DATA_DECREMENT: u8 = 97;
pub const RPN_LSB: u8 = 100;
pub const RPN_MSB: u8 = 101;

// Channel mode messages
pub const ALL_SOUNDS_OFF: u8 = 120;
pub const RESET_ALL_CONTROLLERS: u8 = 121;
pub const LOCAL_CONTROL: u8 = 122;
pub const ALL_NOTES_OFF: u8 = 123;
pub const OMNI_MODE_OFF: u8 = 124;
pub const OMNI_MODE_ON: u8 = 125;
pub const MONO_MODE_ON: u8 = 126;
pub const POLY_MODE_ON: u8 = 127;

/// Controllers 120-127 are reserved for channel mode messages.
#[inline]
pub fn is_channel_mode(control: u8) -> bool {
    control >= ALL_SOUNDS_OFF
}
