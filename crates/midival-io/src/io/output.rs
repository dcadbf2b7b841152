//! MIDI output: message sending via a dedicated thread.

use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::port::{MidiOutputPort, MidiPort};

enum OutputCommand {
    SendMessage(Vec<u8>),
    Shutdown,
}

/// A system MIDI output. The device is opened on the first send.
pub struct MidirOutputPort {
    name: String,
    command_sender: Mutex<Option<Sender<OutputCommand>>>,
}

impl MidirOutputPort {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            command_sender: Mutex::new(None),
        }
    }

    fn sender(&self) -> Result<Sender<OutputCommand>> {
        let mut guard = self.command_sender.lock();
        if let Some(sender) = guard.as_ref() {
            return Ok(sender.clone());
        }
        let sender = spawn_output_thread(&self.name)?;
        *guard = Some(sender.clone());
        Ok(sender)
    }
}

/// Open the device on a fresh thread and wait until it is connected.
fn spawn_output_thread(port_name: &str) -> Result<Sender<OutputCommand>> {
    let (command_sender, command_receiver) = bounded(1024);
    let (ready_sender, ready_receiver) = bounded(1);

    let port_name = port_name.to_string();
    thread::Builder::new()
        .name("midival-output".to_string())
        .spawn(move || match connect(&port_name) {
            Ok(connection) => {
                let _ = ready_sender.send(Ok(()));
                output_thread(&port_name, connection, command_receiver);
            }
            Err(e) => {
                let _ = ready_sender.send(Err(e));
            }
        })
        .map_err(|e| Error::Device(format!("failed to spawn MIDI output thread: {e}")))?;

    ready_receiver
        .recv()
        .map_err(|_| Error::Device("MIDI output thread exited".to_string()))??;
    Ok(command_sender)
}

fn output_thread(
    port_name: &str,
    mut connection: midir::MidiOutputConnection,
    command_receiver: Receiver<OutputCommand>,
) {
    debug!("MIDI output opened: {}", port_name);
    while let Ok(command) = command_receiver.recv() {
        match command {
            OutputCommand::SendMessage(bytes) => {
                if let Err(e) = connection.send(&bytes) {
                    tracing::warn!("Failed to send to MIDI output {}: {}", port_name, e);
                }
            }
            OutputCommand::Shutdown => break,
        }
    }
    connection.close();
    debug!("MIDI output closed: {}", port_name);
}

fn connect(port_name: &str) -> Result<midir::MidiOutputConnection> {
    let midi_output = midir::MidiOutput::new("midival-output")?;

    let ports = midi_output.ports();
    let port = ports
        .iter()
        .find(|port| {
            midi_output
                .port_name(port)
                .map(|name| name == port_name)
                .unwrap_or(false)
        })
        .ok_or_else(|| Error::NotFound(format!("MIDI output '{port_name}'")))?;

    Ok(midi_output.connect(port, "midival-output")?)
}

impl MidiPort for MidirOutputPort {
    fn id(&self) -> &str {
        &self.name
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn manufacturer(&self) -> &str {
        ""
    }
}

impl MidiOutputPort for MidirOutputPort {
    fn send(&self, data: &[u8]) -> Result<()> {
        self.sender()?
            .send(OutputCommand::SendMessage(data.to_vec()))
            .map_err(|_| Error::Port("MIDI output thread not running".to_string()))
    }
}

impl Drop for MidirOutputPort {
    fn drop(&mut self) {
        if let Some(sender) = self.command_sender.get_mut().take() {
            let _ = sender.send(OutputCommand::Shutdown);
        }
    }
}
