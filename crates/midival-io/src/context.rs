//! Explicit access context.
//!
//! A [`MidiContext`] wraps one [`MidiAccess`] provider and hands out typed
//! inputs and outputs. There is no process-wide default: construct one from
//! any provider, or use [`MidiContext::system`] for the `midir` backend.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::bus::Subscription;
use crate::error::{Error, Result};
use crate::input::{MidiInput, MidiInputOptions};
use crate::output::MidiOutput;
use crate::port::{MidiAccess, MidiInputPort, MidiOutputPort, MidiPort};

/// Match rule for one port identity field.
#[derive(Clone, Debug)]
pub enum Pattern {
    Exact(String),
    Regex(Regex),
}

impl Pattern {
    pub fn exact(value: impl Into<String>) -> Self {
        Pattern::Exact(value.into())
    }

    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Pattern::Regex)
            .map_err(|e| Error::Configuration(format!("invalid device pattern '{pattern}': {e}")))
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Pattern::Exact(expected) => expected == value,
            Pattern::Regex(regex) => regex.is_match(value),
        }
    }
}

impl From<&str> for Pattern {
    fn from(value: &str) -> Self {
        Pattern::Exact(value.to_string())
    }
}

impl From<String> for Pattern {
    fn from(value: String) -> Self {
        Pattern::Exact(value)
    }
}

impl From<Regex> for Pattern {
    fn from(regex: Regex) -> Self {
        Pattern::Regex(regex)
    }
}

/// Port filter. Unset fields match anything; set fields must all match.
#[derive(Clone, Debug, Default)]
pub struct DeviceFilter {
    pub name: Option<Pattern>,
    pub manufacturer: Option<Pattern>,
}

impl DeviceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<Pattern>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_manufacturer(mut self, manufacturer: impl Into<Pattern>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    pub fn matches<P: MidiPort + ?Sized>(&self, port: &P) -> bool {
        let field = |pattern: &Option<Pattern>, value: &str| {
            pattern.as_ref().map_or(true, |p| p.matches(value))
        };
        field(&self.name, port.name()) && field(&self.manufacturer, port.manufacturer())
    }
}

/// Entry point for port lookup and hot-plug subscriptions.
#[derive(Clone)]
pub struct MidiContext {
    access: Arc<dyn MidiAccess>,
}

impl MidiContext {
    pub fn new(access: Arc<dyn MidiAccess>) -> Self {
        Self { access }
    }

    /// Context over the system MIDI backend.
    #[cfg(feature = "midi-io")]
    pub fn system() -> Result<Self> {
        Ok(Self::new(Arc::new(crate::io::MidirAccess::new()?)))
    }

    pub fn access(&self) -> &Arc<dyn MidiAccess> {
        &self.access
    }

    pub fn inputs(&self) -> Vec<Arc<dyn MidiInputPort>> {
        self.access.inputs()
    }

    pub fn outputs(&self) -> Vec<Arc<dyn MidiOutputPort>> {
        self.access.outputs()
    }

    pub fn input_from_id(&self, id: &str, options: MidiInputOptions) -> Result<MidiInput> {
        MidiInput::new(self.access.input_by_id(id)?, options)
    }

    pub fn input_from_name(&self, name: &str, options: MidiInputOptions) -> Result<MidiInput> {
        MidiInput::new(self.access.input_by_name(name)?, options)
    }

    pub fn output_from_id(&self, id: &str) -> Result<MidiOutput> {
        Ok(MidiOutput::new(self.access.output_by_id(id)?))
    }

    pub fn output_from_name(&self, name: &str) -> Result<MidiOutput> {
        Ok(MidiOutput::new(self.access.output_by_name(name)?))
    }

    /// Call `callback` for every input that connects. With
    /// `call_on_already_connected`, current inputs are reported first.
    pub fn on_input_device_connected(
        &self,
        callback: impl Fn(&Arc<dyn MidiInputPort>) + Send + Sync + 'static,
        call_on_already_connected: bool,
    ) -> Subscription {
        let callback = Arc::new(callback);
        if call_on_already_connected {
            self.access.inputs().iter().for_each(|port| callback(port));
        }
        self.access.on_input_connected(callback)
    }

    pub fn on_output_device_connected(
        &self,
        callback: impl Fn(&Arc<dyn MidiOutputPort>) + Send + Sync + 'static,
        call_on_already_connected: bool,
    ) -> Subscription {
        let callback = Arc::new(callback);
        if call_on_already_connected {
            self.access.outputs().iter().for_each(|port| callback(port));
        }
        self.access.on_output_connected(callback)
    }

    pub fn on_input_device_disconnected(
        &self,
        callback: impl Fn(&Arc<dyn MidiInputPort>) + Send + Sync + 'static,
    ) -> Subscription {
        self.access.on_input_disconnected(Arc::new(callback))
    }

    pub fn on_output_device_disconnected(
        &self,
        callback: impl Fn(&Arc<dyn MidiOutputPort>) + Send + Sync + 'static,
    ) -> Subscription {
        self.access.on_output_disconnected(Arc::new(callback))
    }

    /// Like [`MidiContext::on_input_device_connected`], restricted to ports
    /// matching `filter` and already wrapped in a [`MidiInput`].
    pub fn on_input_device_with_config_connected(
        &self,
        filter: DeviceFilter,
        options: MidiInputOptions,
        callback: impl Fn(MidiInput) + Send + Sync + 'static,
        call_on_already_connected: bool,
    ) -> Subscription {
        self.on_input_device_connected(
            move |port| {
                if !filter.matches(&**port) {
                    return;
                }
                match MidiInput::new(Arc::clone(port), options) {
                    Ok(input) => callback(input),
                    Err(e) => tracing::warn!("Failed to open MIDI input {}: {}", port.id(), e),
                }
            },
            call_on_already_connected,
        )
    }

    pub fn on_output_device_with_config_connected(
        &self,
        filter: DeviceFilter,
        callback: impl Fn(MidiOutput) + Send + Sync + 'static,
        call_on_already_connected: bool,
    ) -> Subscription {
        self.on_output_device_connected(
            move |port| {
                if filter.matches(&**port) {
                    callback(MidiOutput::new(Arc::clone(port)));
                }
            },
            call_on_already_connected,
        )
    }
}

impl fmt::Debug for MidiContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MidiContext")
            .field("inputs", &self.access.inputs().len())
            .field("outputs", &self.access.outputs().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{VirtualInputPort, VirtualMidiAccess, VirtualOutputPort};
    use parking_lot::Mutex;

    fn setup() -> (Arc<VirtualMidiAccess>, MidiContext) {
        let access = Arc::new(VirtualMidiAccess::new());
        access.add_input(VirtualInputPort::new("in-1", "Launchkey MK3").with_manufacturer("Novation"));
        access.add_output(VirtualOutputPort::new("out-1", "Seaboard").with_manufacturer("ROLI"));
        let context = MidiContext::new(access.clone());
        (access, context)
    }

    #[test]
    fn test_pattern_matching() {
        assert!(Pattern::exact("Keys").matches("Keys"));
        assert!(!Pattern::exact("Keys").matches("Keys 2"));
        let pattern = Pattern::regex("^Launch(key|pad)").unwrap();
        assert!(pattern.matches("Launchpad X"));
        assert!(!pattern.matches("Keystation"));
        assert!(matches!(Pattern::regex("(unclosed"), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_lookup() {
        let (_access, context) = setup();
        let input = context
            .input_from_name("Launchkey MK3", MidiInputOptions::default())
            .unwrap();
        assert_eq!(input.id(), "in-1");
        assert_eq!(input.manufacturer(), "Novation");
        assert_eq!(context.output_from_id("out-1").unwrap().name(), "Seaboard");

        assert!(matches!(
            context.input_from_id("missing", MidiInputOptions::default()),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            context.output_from_name("Launchkey MK3"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_connected_with_and_without_existing() {
        let (access, context) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = Arc::clone(&seen);
        let _a = context.on_input_device_connected(
            move |port| seen_clone.lock().push(format!("all:{}", port.id())),
            true,
        );
        let seen_clone = Arc::clone(&seen);
        let _b = context.on_input_device_connected(
            move |port| seen_clone.lock().push(format!("new:{}", port.id())),
            false,
        );
        access.add_input(VirtualInputPort::new("in-2", "Keystation"));

        assert_eq!(*seen.lock(), vec!["all:in-1", "all:in-2", "new:in-2"]);
    }

    #[test]
    fn test_config_filter_wraps_matching_ports() {
        let (access, context) = setup();
        let opened = Arc::new(Mutex::new(Vec::new()));
        let opened_clone = Arc::clone(&opened);
        let filter = DeviceFilter::new()
            .with_name(Pattern::regex("^Launch").unwrap())
            .with_manufacturer("Novation");
        let _sub = context.on_input_device_with_config_connected(
            filter,
            MidiInputOptions::default(),
            move |input| opened_clone.lock().push(input.id().to_string()),
            true,
        );

        access.add_input(VirtualInputPort::new("in-2", "Launchpad X").with_manufacturer("Novation"));
        access.add_input(VirtualInputPort::new("in-3", "Launchpad X").with_manufacturer("Other"));
        assert_eq!(*opened.lock(), vec!["in-1", "in-2"]);
    }

    #[test]
    fn test_output_config_and_disconnect() {
        let (access, context) = setup();
        let outputs = Arc::new(Mutex::new(Vec::new()));
        let outputs_clone = Arc::clone(&outputs);
        let _a = context.on_output_device_with_config_connected(
            DeviceFilter::new().with_manufacturer("ROLI"),
            move |output| outputs_clone.lock().push(output.name().to_string()),
            true,
        );
        let gone = Arc::new(Mutex::new(Vec::new()));
        let gone_clone = Arc::clone(&gone);
        let _b = context.on_output_device_disconnected(move |port| {
            gone_clone.lock().push(port.id().to_string())
        });

        access.add_output(VirtualOutputPort::new("out-2", "Lightpad").with_manufacturer("ROLI"));
        access.remove_output("out-1");
        assert_eq!(*outputs.lock(), vec!["Seaboard", "Lightpad"]);
        assert_eq!(*gone.lock(), vec!["out-1"]);
    }
}
