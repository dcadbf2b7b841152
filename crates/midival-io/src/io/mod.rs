//! System MIDI backend over `midir`.
//!
//! Ports are identified by their system name. `midir` has no hot-plug
//! notifications, so [`MidirAccess::refresh`] rescans and fires the
//! connect/disconnect events for whatever changed.

mod input;
mod output;

pub use input::MidirInputPort;
pub use output::MidirOutputPort;

use std::sync::Arc;

use parking_lot::RwLock;

use crate::bus::{EventBus, Subscription};
use crate::error::Result;
use crate::port::{
    subscribe_input, subscribe_output, InputPortCallback, MidiAccess, MidiInputPort,
    MidiOutputPort, MidiPort, OutputPortCallback, PortEvent, PortEventKind,
};

/// Information about an available MIDI device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiDevice {
    pub index: usize,
    pub name: String,
}

pub fn list_input_devices() -> Result<Vec<MidiDevice>> {
    let midi_input = midir::MidiInput::new("midival-device-list")?;
    Ok(midi_input
        .ports()
        .iter()
        .enumerate()
        .map(|(index, port)| MidiDevice {
            index,
            name: midi_input
                .port_name(port)
                .unwrap_or_else(|_| format!("Unknown Device {index}")),
        })
        .collect())
}

pub fn list_output_devices() -> Result<Vec<MidiDevice>> {
    let midi_output = midir::MidiOutput::new("midival-device-list")?;
    Ok(midi_output
        .ports()
        .iter()
        .enumerate()
        .map(|(index, port)| MidiDevice {
            index,
            name: midi_output
                .port_name(port)
                .unwrap_or_else(|_| format!("Unknown Device {index}")),
        })
        .collect())
}

/// Access provider over the system MIDI backend.
pub struct MidirAccess {
    inputs: RwLock<Vec<Arc<MidirInputPort>>>,
    outputs: RwLock<Vec<Arc<MidirOutputPort>>>,
    events: EventBus<PortEvent>,
}

impl MidirAccess {
    pub fn new() -> Result<Self> {
        let access = Self {
            inputs: RwLock::new(Vec::new()),
            outputs: RwLock::new(Vec::new()),
            events: EventBus::new(),
        };
        access.refresh()?;
        Ok(access)
    }

    /// Rescan the system ports, firing connect/disconnect events for the
    /// differences since the last scan.
    pub fn refresh(&self) -> Result<()> {
        let input_names: Vec<String> = list_input_devices()?.into_iter().map(|d| d.name).collect();
        let output_names: Vec<String> =
            list_output_devices()?.into_iter().map(|d| d.name).collect();

        let (removed, added) = {
            let mut inputs = self.inputs.write();
            let (kept, removed): (Vec<_>, Vec<_>) = inputs
                .drain(..)
                .partition(|port| input_names.iter().any(|name| name == port.name()));
            *inputs = kept;
            let mut added = Vec::new();
            for name in &input_names {
                if !inputs.iter().any(|port| port.name() == name) {
                    let port = Arc::new(MidirInputPort::spawn(name.clone())?);
                    inputs.push(Arc::clone(&port));
                    added.push(port);
                }
            }
            (removed, added)
        };
        for port in removed {
            self.events
                .trigger(&PortEvent::InputDisconnected(port as Arc<dyn MidiInputPort>));
        }
        for port in added {
            self.events
                .trigger(&PortEvent::InputConnected(port as Arc<dyn MidiInputPort>));
        }

        let (removed, added) = {
            let mut outputs = self.outputs.write();
            let (kept, removed): (Vec<_>, Vec<_>) = outputs
                .drain(..)
                .partition(|port| output_names.iter().any(|name| name == port.name()));
            *outputs = kept;
            let mut added = Vec::new();
            for name in &output_names {
                if !outputs.iter().any(|port| port.name() == name) {
                    let port = Arc::new(MidirOutputPort::new(name.clone()));
                    outputs.push(Arc::clone(&port));
                    added.push(port);
                }
            }
            (removed, added)
        };
        for port in removed {
            self.events
                .trigger(&PortEvent::OutputDisconnected(port as Arc<dyn MidiOutputPort>));
        }
        for port in added {
            self.events
                .trigger(&PortEvent::OutputConnected(port as Arc<dyn MidiOutputPort>));
        }

        Ok(())
    }
}

impl MidiAccess for MidirAccess {
    fn inputs(&self) -> Vec<Arc<dyn MidiInputPort>> {
        self.inputs
            .read()
            .iter()
            .map(|port| port.clone() as Arc<dyn MidiInputPort>)
            .collect()
    }

    fn outputs(&self) -> Vec<Arc<dyn MidiOutputPort>> {
        self.outputs
            .read()
            .iter()
            .map(|port| port.clone() as Arc<dyn MidiOutputPort>)
            .collect()
    }

    fn on_input_connected(&self, callback: InputPortCallback) -> Subscription {
        subscribe_input(&self.events, PortEventKind::InputConnected, callback)
    }

    fn on_input_disconnected(&self, callback: InputPortCallback) -> Subscription {
        subscribe_input(&self.events, PortEventKind::InputDisconnected, callback)
    }

    fn on_output_connected(&self, callback: OutputPortCallback) -> Subscription {
        subscribe_output(&self.events, PortEventKind::OutputConnected, callback)
    }

    fn on_output_disconnected(&self, callback: OutputPortCallback) -> Subscription {
        subscribe_output(&self.events, PortEventKind::OutputDisconnected, callback)
    }
}
