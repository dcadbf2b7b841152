//! MIDI I/O layer for midival.
//!
//! Wraps host ports in typed objects: [`MidiInput`] decodes and dispatches
//! incoming messages, [`MidiOutput`] encodes outgoing commands, and
//! [`MidiContext`] finds and watches devices through a [`MidiAccess`].
//!
//! Feature gates: `midi-io` (system ports via `midir`), `mpe` (polyphonic
//! expression zones, on by default).

pub mod error;
pub use error::{Error, Result};

pub(crate) mod bus;
pub use bus::{BusEvent, Callback, EventBus, Subscription};

pub(crate) mod port;
pub use port::{
    InputPortCallback, MessageCallback, MidiAccess, MidiInputPort, MidiOutputPort, MidiPacket,
    MidiPort, OutputPortCallback, PortEvent, PortEventKind, VirtualInputPort, VirtualMidiAccess,
    VirtualOutputPort,
};

mod input;
pub use input::{InputEvent, InputEventKind, MidiInput, MidiInputOptions};

mod output;
pub use output::{MidiOutput, DEFAULT_MESSAGE_DELAY};

mod context;
pub use context::{DeviceFilter, MidiContext, Pattern};

#[cfg(feature = "midi-io")]
pub(crate) mod io;

#[cfg(feature = "midi-io")]
pub use io::{list_input_devices, list_output_devices, MidiDevice, MidirAccess, MidirInputPort, MidirOutputPort};

#[cfg(feature = "mpe")]
pub mod mpe;

#[cfg(feature = "mpe")]
pub use mpe::{ActiveNote, MpeInput, MpeInputZone, MpeOutput, MpeOutputZone, MpeZoneSizes};

pub use midival_core as core;
