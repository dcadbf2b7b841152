//! # midival - MIDI for Rust
//!
//! Typed MIDI over pluggable ports, built from two layers.
//!
//! ## Architecture
//!
//! midival is an umbrella crate over:
//! - **midival-core** - Protocol layer (byte decoding, pitch bend codec, clock tempo, RPN tracking)
//! - **midival-io** - Ports, typed input/output, device context, MPE zones
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use midival::prelude::*;
//!
//! let access = Arc::new(VirtualMidiAccess::new());
//! let keys = access.add_input(VirtualInputPort::new("keys", "Keyboard"));
//!
//! let context = MidiContext::new(access);
//! let input = context.input_from_name("Keyboard", MidiInputOptions::default())?;
//! let _sub = input.on_note_on(60, |note| println!("middle C at {}", note.velocity));
//!
//! keys.inject(0.0, &[0x90, 60, 100]);
//! # Ok::<(), midival::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - `mpe`
//! - `mpe` - MIDI Polyphonic Expression zones
//! - `midi-io` - System MIDI ports through `midir`
//! - `full` - Everything enabled

/// Re-export of midival-core for direct access
pub use midival_core as core;

/// Re-export of midival-io for direct access
pub use midival_io as io;

pub use midival_io::{Error, Result};

// Protocol types
pub use midival_core::{
    controller, ChannelVoiceMessage, ClockMessage, ControlChangeMessage, MidiCommand,
    MidiMessage, NoteMessage, PitchBendEvent, ProgramChangeMessage, RegisteredParameter,
    RegisteredParameterEvent, TempoEstimator,
};

// Ports and typed I/O
pub use midival_io::{
    DeviceFilter, InputEvent, InputEventKind, MidiAccess, MidiContext, MidiInput,
    MidiInputOptions, MidiInputPort, MidiOutput, MidiOutputPort, MidiPacket, MidiPort, Pattern,
    Subscription, VirtualInputPort, VirtualMidiAccess, VirtualOutputPort,
};

#[cfg(feature = "midi-io")]
pub use midival_io::{MidirAccess, MidiDevice};

/// MIDI Polyphonic Expression zones.
#[cfg(feature = "mpe")]
pub mod mpe {
    pub use midival_io::mpe::*;
}

pub mod prelude {
    // Device discovery
    pub use crate::{DeviceFilter, MidiAccess, MidiContext, Pattern};

    // Typed I/O
    pub use crate::{InputEvent, InputEventKind, MidiInput, MidiInputOptions, MidiOutput};

    // In-memory ports
    pub use crate::{VirtualInputPort, VirtualMidiAccess, VirtualOutputPort};

    pub use crate::Subscription;

    // MPE
    #[cfg(feature = "mpe")]
    pub use crate::mpe::{ActiveNote, MpeInput, MpeOutput, MpeZoneSizes};
}
