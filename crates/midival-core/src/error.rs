//! Error types for the MIDI protocol layer.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Pitch bend value outside the range: {0}")]
    PitchBendOutOfRange(f64),

    #[error("Unknown registered parameter: [{msb:?}, {lsb:?}]")]
    UnknownRegisteredParameter { msb: Option<u8>, lsb: Option<u8> },
}

pub type Result<T> = std::result::Result<T, Error>;
