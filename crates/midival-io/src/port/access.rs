//! Access provider contract: port enumeration, lookup, and hot-plug events.

use std::fmt;
use std::sync::Arc;

use super::{MidiInputPort, MidiOutputPort};
use crate::bus::{BusEvent, EventBus, Subscription};
use crate::error::{Error, Result};

pub type InputPortCallback = Arc<dyn Fn(&Arc<dyn MidiInputPort>) + Send + Sync>;
pub type OutputPortCallback = Arc<dyn Fn(&Arc<dyn MidiOutputPort>) + Send + Sync>;

/// Port connection state change.
#[derive(Clone)]
pub enum PortEvent {
    InputConnected(Arc<dyn MidiInputPort>),
    InputDisconnected(Arc<dyn MidiInputPort>),
    OutputConnected(Arc<dyn MidiOutputPort>),
    OutputDisconnected(Arc<dyn MidiOutputPort>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PortEventKind {
    InputConnected,
    InputDisconnected,
    OutputConnected,
    OutputDisconnected,
}

impl BusEvent for PortEvent {
    type Kind = PortEventKind;

    fn kind(&self) -> PortEventKind {
        match self {
            PortEvent::InputConnected(_) => PortEventKind::InputConnected,
            PortEvent::InputDisconnected(_) => PortEventKind::InputDisconnected,
            PortEvent::OutputConnected(_) => PortEventKind::OutputConnected,
            PortEvent::OutputDisconnected(_) => PortEventKind::OutputDisconnected,
        }
    }
}

impl fmt::Debug for PortEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortEvent::InputConnected(port) | PortEvent::InputDisconnected(port) => {
                write!(f, "{:?}({})", self.kind(), port.id())
            }
            PortEvent::OutputConnected(port) | PortEvent::OutputDisconnected(port) => {
                write!(f, "{:?}({})", self.kind(), port.id())
            }
        }
    }
}

/// Route input connect/disconnect events of `kind` to `callback`.
pub(crate) fn subscribe_input(
    events: &EventBus<PortEvent>,
    kind: PortEventKind,
    callback: InputPortCallback,
) -> Subscription {
    events.on(kind, move |event| match event {
        PortEvent::InputConnected(port) | PortEvent::InputDisconnected(port) => callback(port),
        _ => {}
    })
}

/// Route output connect/disconnect events of `kind` to `callback`.
pub(crate) fn subscribe_output(
    events: &EventBus<PortEvent>,
    kind: PortEventKind,
    callback: OutputPortCallback,
) -> Subscription {
    events.on(kind, move |event| match event {
        PortEvent::OutputConnected(port) | PortEvent::OutputDisconnected(port) => callback(port),
        _ => {}
    })
}

/// Supplies the ports currently known to the host.
///
/// Backends without hot-plug notifications can keep the default
/// connect/disconnect methods, which return inert handles.
pub trait MidiAccess: Send + Sync {
    fn inputs(&self) -> Vec<Arc<dyn MidiInputPort>>;

    fn outputs(&self) -> Vec<Arc<dyn MidiOutputPort>>;

    fn on_input_connected(&self, _callback: InputPortCallback) -> Subscription {
        Subscription::inert()
    }

    fn on_input_disconnected(&self, _callback: InputPortCallback) -> Subscription {
        Subscription::inert()
    }

    fn on_output_connected(&self, _callback: OutputPortCallback) -> Subscription {
        Subscription::inert()
    }

    fn on_output_disconnected(&self, _callback: OutputPortCallback) -> Subscription {
        Subscription::inert()
    }

    fn input_by_id(&self, id: &str) -> Result<Arc<dyn MidiInputPort>> {
        self.inputs()
            .into_iter()
            .find(|port| port.id() == id)
            .ok_or_else(|| Error::NotFound(format!("MIDI input {id}")))
    }

    /// First input whose name matches exactly.
    fn input_by_name(&self, name: &str) -> Result<Arc<dyn MidiInputPort>> {
        self.inputs()
            .into_iter()
            .find(|port| port.name() == name)
            .ok_or_else(|| Error::NotFound(format!("MIDI input '{name}'")))
    }

    fn output_by_id(&self, id: &str) -> Result<Arc<dyn MidiOutputPort>> {
        self.outputs()
            .into_iter()
            .find(|port| port.id() == id)
            .ok_or_else(|| Error::NotFound(format!("MIDI output {id}")))
    }

    /// First output whose name matches exactly.
    fn output_by_name(&self, name: &str) -> Result<Arc<dyn MidiOutputPort>> {
        self.outputs()
            .into_iter()
            .find(|port| port.name() == name)
            .ok_or_else(|| Error::NotFound(format!("MIDI output '{name}'")))
    }
}
