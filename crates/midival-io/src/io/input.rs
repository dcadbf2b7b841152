//! MIDI input: a midir connection owned by a dedicated thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::debug;

use crate::bus::{EventBus, Subscription};
use crate::error::{Error, Result};
use crate::port::{MessageCallback, MidiInputPort, MidiPacket, MidiPort};

/// Commands sent to the input thread
#[derive(Debug, PartialEq, Eq)]
enum InputCommand {
    Connect,
    Disconnect,
    Shutdown,
}

/// A system MIDI input. The device is opened when the first listener
/// registers and closed when the last one leaves.
pub struct MidirInputPort {
    name: String,
    listeners: EventBus<MidiPacket>,
    command_sender: Sender<InputCommand>,
    is_connected: Arc<AtomicBool>,
    /// Whether the last command queued was Connect. Listener changes and
    /// the commands they queue happen under this lock, so a Disconnect can
    /// never overtake the Connect of a listener registering concurrently.
    open_requested: Arc<Mutex<bool>>,
}

impl MidirInputPort {
    pub(crate) fn spawn(name: String) -> Result<Self> {
        let (command_sender, command_receiver) = bounded(16);
        let listeners = EventBus::new();
        let is_connected = Arc::new(AtomicBool::new(false));

        let port_name = name.clone();
        let listeners_clone = listeners.clone();
        let is_connected_clone = Arc::clone(&is_connected);
        thread::Builder::new()
            .name("midival-input".to_string())
            .spawn(move || {
                input_thread(port_name, command_receiver, listeners_clone, is_connected_clone)
            })
            .map_err(|e| Error::Device(format!("failed to spawn MIDI input thread: {e}")))?;

        Ok(Self {
            name,
            listeners,
            command_sender,
            is_connected,
            open_requested: Arc::new(Mutex::new(false)),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::SeqCst)
    }
}

fn input_thread(
    port_name: String,
    command_receiver: Receiver<InputCommand>,
    listeners: EventBus<MidiPacket>,
    is_connected: Arc<AtomicBool>,
) {
    let mut connection: Option<midir::MidiInputConnection<()>> = None;

    loop {
        match command_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(InputCommand::Connect) => {
                if connection.is_some() {
                    continue;
                }
                match connect(&port_name, listeners.clone()) {
                    Ok(conn) => {
                        debug!("MIDI input opened: {}", port_name);
                        connection = Some(conn);
                        is_connected.store(true, Ordering::SeqCst);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to open MIDI input {}: {}", port_name, e);
                    }
                }
            }
            Ok(InputCommand::Disconnect) => {
                if let Some(conn) = connection.take() {
                    conn.close();
                    is_connected.store(false, Ordering::SeqCst);
                    debug!("MIDI input closed: {}", port_name);
                }
            }
            Ok(InputCommand::Shutdown) => {
                if let Some(conn) = connection.take() {
                    conn.close();
                }
                break;
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }
    is_connected.store(false, Ordering::SeqCst);
}

fn connect(
    port_name: &str,
    listeners: EventBus<MidiPacket>,
) -> Result<midir::MidiInputConnection<()>> {
    let mut midi_input = midir::MidiInput::new("midival-input")?;
    // Clock and SysEx are part of the decoded stream
    midi_input.ignore(midir::Ignore::None);

    let ports = midi_input.ports();
    let port = ports
        .iter()
        .find(|port| {
            midi_input
                .port_name(port)
                .map(|name| name == port_name)
                .unwrap_or(false)
        })
        .ok_or_else(|| Error::NotFound(format!("MIDI input '{port_name}'")))?;

    let connection = midi_input.connect(
        port,
        "midival-input",
        move |timestamp_us, message, _| {
            listeners.trigger(&MidiPacket::new(timestamp_us as f64 / 1000.0, message));
        },
        (),
    )?;
    Ok(connection)
}

impl MidiPort for MidirInputPort {
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

impl MidiInputPort for MidirInputPort {
    fn on_message(&self, callback: MessageCallback) -> Result<Subscription> {
        let listener = {
            let mut open_requested = self.open_requested.lock();
            let listener = self.listeners.on((), move |packet| callback(packet));
            // Connect is idempotent on the thread; resend it after a failed open
            if !*open_requested || !self.is_connected() {
                if self.command_sender.send(InputCommand::Connect).is_err() {
                    listener.unsubscribe();
                    return Err(Error::Port("MIDI input thread not running".to_string()));
                }
                *open_requested = true;
            }
            listener
        };

        let listeners = self.listeners.clone();
        let command_sender = self.command_sender.clone();
        let open_requested = Arc::clone(&self.open_requested);
        Ok(Subscription::new(move || {
            let mut open_requested = open_requested.lock();
            listener.unsubscribe();
            if listeners.subscriber_count(()) == 0 && *open_requested {
                let _ = command_sender.send(InputCommand::Disconnect);
                *open_requested = false;
            }
        }))
    }
}

impl Drop for MidirInputPort {
    fn drop(&mut self) {
        let _ = self.command_sender.send(InputCommand::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A port wired to a local command queue instead of the device thread
    fn detached_port() -> (MidirInputPort, Receiver<InputCommand>) {
        let (command_sender, command_receiver) = bounded(16);
        let port = MidirInputPort {
            name: "test-in".to_string(),
            listeners: EventBus::new(),
            command_sender,
            is_connected: Arc::new(AtomicBool::new(false)),
            open_requested: Arc::new(Mutex::new(false)),
        };
        (port, command_receiver)
    }

    fn ignore() -> MessageCallback {
        Arc::new(|_: &MidiPacket| {})
    }

    #[test]
    fn test_last_listener_closes_and_next_reopens() {
        crate::test_support::init_tracing();
        let (port, commands) = detached_port();

        let a = port.on_message(ignore()).unwrap();
        port.is_connected.store(true, Ordering::SeqCst);
        let b = port.on_message(ignore()).unwrap();
        assert_eq!(commands.try_iter().collect::<Vec<_>>(), vec![InputCommand::Connect]);

        a.unsubscribe();
        assert!(commands.try_recv().is_err());
        b.unsubscribe();
        assert_eq!(commands.try_recv().ok(), Some(InputCommand::Disconnect));

        // The thread has not processed the Disconnect yet
        let _c = port.on_message(ignore()).unwrap();
        assert_eq!(commands.try_recv().ok(), Some(InputCommand::Connect));
        assert_eq!(port.listeners.subscriber_count(()), 1);
    }

    #[test]
    fn test_connect_resent_until_open() {
        let (port, commands) = detached_port();
        let _a = port.on_message(ignore()).unwrap();
        let _b = port.on_message(ignore()).unwrap();
        assert_eq!(
            commands.try_iter().collect::<Vec<_>>(),
            vec![InputCommand::Connect, InputCommand::Connect]
        );
    }
}
