//! Host port contracts.
//!
//! The library never talks to a MIDI backend directly. Hosts hand it ports
//! implementing these traits: the `midir` adapter behind the `midi-io`
//! feature, the in-memory [`VirtualMidiAccess`], or their own.

mod access;
mod virtual_port;

pub use access::{InputPortCallback, MidiAccess, OutputPortCallback, PortEvent, PortEventKind};
#[cfg_attr(not(feature = "midi-io"), allow(unused_imports))]
pub(crate) use access::{subscribe_input, subscribe_output};
pub use virtual_port::{VirtualInputPort, VirtualMidiAccess, VirtualOutputPort};

use std::sync::Arc;

use crate::bus::{BusEvent, Subscription};
use crate::error::Result;

/// Raw bytes delivered by an input port.
#[derive(Clone, Debug, PartialEq)]
pub struct MidiPacket {
    /// Host timestamp in milliseconds.
    pub received_time: f64,
    pub data: Vec<u8>,
}

impl MidiPacket {
    pub fn new(received_time: f64, data: impl Into<Vec<u8>>) -> Self {
        Self {
            received_time,
            data: data.into(),
        }
    }
}

impl BusEvent for MidiPacket {
    type Kind = ();

    fn kind(&self) {}
}

pub type MessageCallback = Arc<dyn Fn(&MidiPacket) + Send + Sync>;

/// Read-only identity shared by input and output ports.
pub trait MidiPort: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn manufacturer(&self) -> &str;
}

pub trait MidiInputPort: MidiPort {
    /// Start delivering packets to `callback`. The returned handle releases
    /// the listener.
    fn on_message(&self, callback: MessageCallback) -> Result<Subscription>;
}

pub trait MidiOutputPort: MidiPort {
    fn send(&self, data: &[u8]) -> Result<()>;
}
