//! Pitch bend codec between a normalized fraction and two 7-bit data bytes.
//!
//! Encoding scales by 16383 while decoding divides by 16363. The two
//! formulas are kept as-is for wire compatibility with existing devices and
//! peers, so a round trip is close to, but not exactly, the identity.

use crate::error::{Error, Result};

const ENCODE_MAX: f64 = 16383.0;
const DECODE_DIVISOR: f64 = 16363.0;

/// Convert a fraction in `-1.0..=1.0` into a 14-bit pitch bend value.
pub fn to_bend(fraction: f64) -> Result<u16> {
    if !(-1.0..=1.0).contains(&fraction) {
        return Err(Error::PitchBendOutOfRange(fraction));
    }
    Ok(((fraction + 1.0) * ENCODE_MAX / 2.0).ceil() as u16)
}

/// Convert a fraction into `[lsb, msb]` data bytes, LSB first as on the wire.
pub fn to_bend_bytes(fraction: f64) -> Result<[u8; 2]> {
    to_bend(fraction).map(split_14bit)
}

/// Decode `[lsb, msb]` data bytes into a fraction.
pub fn from_bend(lsb: u8, msb: u8) -> f64 {
    (join_14bit(lsb, msb) as f64 / DECODE_DIVISOR - 0.5) * 2.0
}

#[inline]
pub fn split_14bit(value: u16) -> [u8; 2] {
    [(value & 0x7F) as u8, (value >> 7) as u8]
}

#[inline]
pub fn join_14bit(lsb: u8, msb: u8) -> u16 {
    lsb as u16 + ((msb as u16) << 7)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_encode_endpoints() {
        assert_eq!(to_bend(-1.0).unwrap(), 0);
        assert_eq!(to_bend(1.0).unwrap(), 16383);
        // ceil(16383 / 2) = 8192
        assert_eq!(to_bend(0.0).unwrap(), 8192);

        assert_eq!(to_bend_bytes(1.0).unwrap(), [127, 127]);
        assert_eq!(to_bend_bytes(0.0).unwrap(), [0, 64]);
        assert_eq!(to_bend_bytes(-1.0).unwrap(), [0, 0]);
    }

    #[test]
    fn test_encode_rejects_out_of_range() {
        assert_eq!(to_bend(1.01), Err(Error::PitchBendOutOfRange(1.01)));
        assert!(to_bend(-1.5).is_err());
        assert!(to_bend_bytes(f64::NAN).is_err());
    }

    #[test]
    fn test_decode_formula() {
        assert_eq!(from_bend(0, 0), -1.0);
        assert_eq!(from_bend(0, 64), (8192.0 / 16363.0 - 0.5) * 2.0);
        // The decode divisor lets the top value overshoot 1.0 slightly
        assert_eq!(from_bend(127, 127), (16383.0 / 16363.0 - 0.5) * 2.0);
        assert!(from_bend(127, 127) > 1.0);
    }

    #[test]
    fn test_round_trip_is_close_but_asymmetric() {
        for fraction in [-1.0, -0.5, -0.1, 0.0, 0.25, 0.75, 1.0] {
            let [lsb, msb] = to_bend_bytes(fraction).unwrap();
            let decoded = from_bend(lsb, msb);
            assert_abs_diff_eq!(decoded, fraction, epsilon = 0.003);
        }
        let [lsb, msb] = to_bend_bytes(1.0).unwrap();
        assert_ne!(from_bend(lsb, msb), 1.0);
    }

    #[test]
    fn test_split_and_join() {
        assert_eq!(split_14bit(0x3FFF), [0x7F, 0x7F]);
        assert_eq!(split_14bit(0x2000), [0x00, 0x40]);
        assert_eq!(join_14bit(0x7F, 0x7F), 0x3FFF);
        assert_eq!(join_14bit(0x01, 0x01), 129);
    }
}
