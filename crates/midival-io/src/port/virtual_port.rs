//! In-memory MIDI ports for loopback routing and tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use super::access::{
    subscribe_input, subscribe_output, InputPortCallback, MidiAccess, OutputPortCallback,
    PortEvent, PortEventKind,
};
use super::{MessageCallback, MidiInputPort, MidiOutputPort, MidiPacket, MidiPort};
use crate::bus::{EventBus, Subscription};
use crate::error::{Error, Result};

/// Input port fed by [`VirtualInputPort::inject`].
pub struct VirtualInputPort {
    id: String,
    name: String,
    manufacturer: String,
    listeners: EventBus<MidiPacket>,
}

impl VirtualInputPort {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            manufacturer: String::new(),
            listeners: EventBus::new(),
        }
    }

    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = manufacturer.into();
        self
    }

    /// Deliver a packet to every listener. Returns the listener count.
    pub fn inject(&self, received_time: f64, data: &[u8]) -> usize {
        self.listeners
            .trigger(&MidiPacket::new(received_time, data.to_vec()))
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.subscriber_count(())
    }
}

impl MidiPort for VirtualInputPort {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn manufacturer(&self) -> &str {
        &self.manufacturer
    }
}

impl MidiInputPort for VirtualInputPort {
    fn on_message(&self, callback: MessageCallback) -> Result<Subscription> {
        tracing::debug!("Listening on virtual MIDI input {}", self.id);
        Ok(self.listeners.on((), move |packet| callback(packet)))
    }
}

/// Output port that records every message and can loop it back into a
/// [`VirtualInputPort`].
pub struct VirtualOutputPort {
    id: String,
    name: String,
    manufacturer: String,
    sent: Mutex<Vec<Vec<u8>>>,
    loopback: Mutex<Option<Arc<VirtualInputPort>>>,
    closed: AtomicBool,
    created: Instant,
}

impl VirtualOutputPort {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            manufacturer: String::new(),
            sent: Mutex::new(Vec::new()),
            loopback: Mutex::new(None),
            closed: AtomicBool::new(false),
            created: Instant::now(),
        }
    }

    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = manufacturer.into();
        self
    }

    /// Forward every sent message into `input`.
    pub fn connect_loopback(&self, input: Arc<VirtualInputPort>) {
        *self.loopback.lock() = Some(input);
    }

    /// A closed port rejects sends with [`Error::Port`].
    pub fn set_closed(&self, closed: bool) {
        self.closed.store(closed, Ordering::Release);
    }

    /// Copy of every message sent so far.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }

    /// Drain the sent-message log.
    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.sent.lock())
    }
}

impl MidiPort for VirtualOutputPort {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn manufacturer(&self) -> &str {
        &self.manufacturer
    }
}

impl MidiOutputPort for VirtualOutputPort {
    fn send(&self, data: &[u8]) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Port(format!("virtual output {} is closed", self.id)));
        }
        self.sent.lock().push(data.to_vec());

        let loopback = self.loopback.lock().clone();
        if let Some(input) = loopback {
            let elapsed_ms = self.created.elapsed().as_secs_f64() * 1000.0;
            input.inject(elapsed_ms, data);
        }
        Ok(())
    }
}

/// Access provider over virtual ports. Adding and removing ports fires the
/// matching connect/disconnect events.
#[derive(Default)]
pub struct VirtualMidiAccess {
    inputs: RwLock<Vec<Arc<VirtualInputPort>>>,
    outputs: RwLock<Vec<Arc<VirtualOutputPort>>>,
    events: EventBus<PortEvent>,
}

impl VirtualMidiAccess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_input(&self, port: VirtualInputPort) -> Arc<VirtualInputPort> {
        let port = Arc::new(port);
        self.inputs.write().push(Arc::clone(&port));
        tracing::debug!("Virtual MIDI input connected: {}", port.id);
        self.events
            .trigger(&PortEvent::InputConnected(port.clone() as Arc<dyn MidiInputPort>));
        port
    }

    pub fn add_output(&self, port: VirtualOutputPort) -> Arc<VirtualOutputPort> {
        let port = Arc::new(port);
        self.outputs.write().push(Arc::clone(&port));
        tracing::debug!("Virtual MIDI output connected: {}", port.id);
        self.events
            .trigger(&PortEvent::OutputConnected(port.clone() as Arc<dyn MidiOutputPort>));
        port
    }

    pub fn remove_input(&self, id: &str) -> Option<Arc<VirtualInputPort>> {
        let removed = {
            let mut inputs = self.inputs.write();
            let index = inputs.iter().position(|port| port.id == id)?;
            inputs.remove(index)
        };
        self.events
            .trigger(&PortEvent::InputDisconnected(removed.clone() as Arc<dyn MidiInputPort>));
        Some(removed)
    }

    pub fn remove_output(&self, id: &str) -> Option<Arc<VirtualOutputPort>> {
        let removed = {
            let mut outputs = self.outputs.write();
            let index = outputs.iter().position(|port| port.id == id)?;
            outputs.remove(index)
        };
        self.events
            .trigger(&PortEvent::OutputDisconnected(removed.clone() as Arc<dyn MidiOutputPort>));
        Some(removed)
    }
}

impl MidiAccess for VirtualMidiAccess {
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
