//! MIDI protocol layer for midival.
//!
//! Pure, I/O-free building blocks:
//!
//! - **Byte decoding**: status/data bytes into typed channel-voice, clock and SysEx messages
//! - **Pitch bend codec**: normalized fraction <-> 14-bit value split into two 7-bit bytes
//! - **Clock tempo**: rolling-window BPM estimation from clock pulse timestamps
//! - **RPN tracking**: selector register and named registered parameters
//!
//! # Example
//!
//! ```
//! use midival_core::{MidiMessage, NoteMessage};
//!
//! if let Some(MidiMessage::ChannelVoice(msg)) = MidiMessage::parse(&[0x90, 60, 100]) {
//!     let note = NoteMessage::from(msg);
//!     assert_eq!((note.channel, note.note, note.velocity), (1, 60, 100));
//! }
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod clock;
pub mod controller;
pub mod message;
pub mod pitch_bend;
pub mod rpn;

pub use clock::{TempoEstimator, PULSES_PER_QUARTER_NOTE, TEMPO_SAMPLES_LIMIT};
pub use message::{
    ChannelVoiceMessage, ClockMessage, ControlChangeMessage, MidiCommand, MidiMessage,
    NoteMessage, PitchBendEvent, ProgramChangeMessage, SYSEX_START,
};
pub use rpn::{RegisteredParameter, RegisteredParameterEvent, RpnSelector};
