//! Error types for the MIDI I/O layer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Protocol(#[from] midival_core::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid MIDI channel: {0} (expected 1-16)")]
    InvalidChannel(u8),

    #[error("MIDI port error: {0}")]
    Port(String),

    #[error("MIDI device error: {0}")]
    Device(String),
}

#[cfg(feature = "midi-io")]
impl From<midir::InitError> for Error {
    fn from(e: midir::InitError) -> Self {
        Error::Device(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::ConnectError<midir::MidiOutput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiOutput>) -> Self {
        Error::Port(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::ConnectError<midir::MidiInput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiInput>) -> Self {
        Error::Port(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
