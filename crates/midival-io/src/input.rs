//! Typed MIDI input.
//!
//! A [`MidiInput`] listens on one host port, decodes every packet and feeds
//! the result into its own [`EventBus`]. All `on_*` helpers are filters over
//! that bus: they subscribe to the broad event kind and skip the callback
//! when a field does not match.
//!
//! Two pieces of state ride along with decoding:
//!
//! - the RPN selector, fed by every control change and turned into
//!   [`InputEvent::RegisteredParameter`] events on Data Entry;
//! - the clock tempo window, fed by clock pulses when
//!   [`MidiInputOptions::compute_clock_tempo`] is set.

use std::future::Future;
use std::sync::{Arc, Weak};

use midival_core::{
    controller, ChannelVoiceMessage, ClockMessage, ControlChangeMessage, MidiCommand,
    MidiMessage, NoteMessage, PitchBendEvent, ProgramChangeMessage, RegisteredParameter,
    RegisteredParameterEvent, RpnSelector, TempoEstimator,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::bus::{BusEvent, EventBus, Subscription};
use crate::error::{Error, Result};
use crate::port::{MidiInputPort, MidiPacket};

/// Input construction options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiInputOptions {
    /// Track clock pulse timestamps so [`MidiInput::tempo`] can be read.
    pub compute_clock_tempo: bool,
}

impl MidiInputOptions {
    pub fn with_clock_tempo(mut self, enabled: bool) -> Self {
        self.compute_clock_tempo = enabled;
        self
    }
}

/// Everything a [`MidiInput`] can emit.
#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    NoteOn(NoteMessage),
    NoteOff(NoteMessage),
    /// `note` is the key, `velocity` the pressure.
    PolyKeyPressure(NoteMessage),
    ControlChange(ControlChangeMessage),
    ProgramChange(ProgramChangeMessage),
    ChannelPressure(ChannelVoiceMessage),
    PitchBend(PitchBendEvent),
    Sysex(Vec<u8>),
    /// Clock events carry the packet's received time in milliseconds.
    ClockPulse(f64),
    ClockStart(f64),
    ClockStop(f64),
    ClockContinue(f64),
    RegisteredParameter(RegisteredParameterEvent),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputEventKind {
    NoteOn,
    NoteOff,
    PolyKeyPressure,
    ControlChange,
    ProgramChange,
    ChannelPressure,
    PitchBend,
    Sysex,
    ClockPulse,
    ClockStart,
    ClockStop,
    ClockContinue,
    RegisteredParameter,
}

impl BusEvent for InputEvent {
    type Kind = InputEventKind;

    fn kind(&self) -> InputEventKind {
        match self {
            InputEvent::NoteOn(_) => InputEventKind::NoteOn,
            InputEvent::NoteOff(_) => InputEventKind::NoteOff,
            InputEvent::PolyKeyPressure(_) => InputEventKind::PolyKeyPressure,
            InputEvent::ControlChange(_) => InputEventKind::ControlChange,
            InputEvent::ProgramChange(_) => InputEventKind::ProgramChange,
            InputEvent::ChannelPressure(_) => InputEventKind::ChannelPressure,
            InputEvent::PitchBend(_) => InputEventKind::PitchBend,
            InputEvent::Sysex(_) => InputEventKind::Sysex,
            InputEvent::ClockPulse(_) => InputEventKind::ClockPulse,
            InputEvent::ClockStart(_) => InputEventKind::ClockStart,
            InputEvent::ClockStop(_) => InputEventKind::ClockStop,
            InputEvent::ClockContinue(_) => InputEventKind::ClockContinue,
            InputEvent::RegisteredParameter(_) => InputEventKind::RegisteredParameter,
        }
    }
}

impl InputEvent {
    /// Note On, Note Off and Poly Key Pressure payloads.
    pub fn as_note(&self) -> Option<&NoteMessage> {
        match self {
            InputEvent::NoteOn(msg) | InputEvent::NoteOff(msg) | InputEvent::PolyKeyPressure(msg) => {
                Some(msg)
            }
            _ => None,
        }
    }

    pub fn as_control_change(&self) -> Option<&ControlChangeMessage> {
        match self {
            InputEvent::ControlChange(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn as_program_change(&self) -> Option<&ProgramChangeMessage> {
        match self {
            InputEvent::ProgramChange(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn as_channel_pressure(&self) -> Option<&ChannelVoiceMessage> {
        match self {
            InputEvent::ChannelPressure(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn as_pitch_bend(&self) -> Option<&PitchBendEvent> {
        match self {
            InputEvent::PitchBend(event) => Some(event),
            _ => None,
        }
    }

    pub fn as_sysex(&self) -> Option<&[u8]> {
        match self {
            InputEvent::Sysex(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_registered_parameter(&self) -> Option<&RegisteredParameterEvent> {
        match self {
            InputEvent::RegisteredParameter(event) => Some(event),
            _ => None,
        }
    }

    /// Received time of a clock event.
    pub fn clock_time(&self) -> Option<f64> {
        match self {
            InputEvent::ClockPulse(time)
            | InputEvent::ClockStart(time)
            | InputEvent::ClockStop(time)
            | InputEvent::ClockContinue(time) => Some(*time),
            _ => None,
        }
    }
}

struct InputInner {
    port: Arc<dyn MidiInputPort>,
    options: MidiInputOptions,
    bus: EventBus<InputEvent>,
    tempo: Mutex<TempoEstimator>,
    rpn: Mutex<RpnSelector>,
    listener: Mutex<Option<Subscription>>,
}

impl InputInner {
    fn handle_packet(&self, packet: &MidiPacket) {
        let Some(message) = MidiMessage::parse(&packet.data) else {
            tracing::trace!(data = ?packet.data, "Ignoring unrecognized MIDI bytes");
            return;
        };

        match message {
            MidiMessage::Sysex(data) => {
                self.bus.trigger(&InputEvent::Sysex(data));
            }
            MidiMessage::Clock(clock) => self.handle_clock(clock, packet.received_time),
            MidiMessage::ChannelVoice(msg) => self.handle_channel_voice(msg),
        }
    }

    fn handle_clock(&self, clock: ClockMessage, received_time: f64) {
        let event = match clock {
            ClockMessage::Pulse => {
                if self.options.compute_clock_tempo {
                    self.tempo.lock().record_pulse(received_time);
                }
                InputEvent::ClockPulse(received_time)
            }
            ClockMessage::Start => {
                self.tempo.lock().reset();
                InputEvent::ClockStart(received_time)
            }
            ClockMessage::Continue => {
                self.tempo.lock().reset();
                InputEvent::ClockContinue(received_time)
            }
            ClockMessage::Stop => InputEvent::ClockStop(received_time),
        };
        self.bus.trigger(&event);
    }

    fn handle_channel_voice(&self, msg: ChannelVoiceMessage) {
        match msg.command {
            MidiCommand::NoteOn => {
                self.bus.trigger(&InputEvent::NoteOn(msg.into()));
            }
            MidiCommand::NoteOff => {
                self.bus.trigger(&InputEvent::NoteOff(msg.into()));
            }
            MidiCommand::PolyKeyPressure => {
                self.bus.trigger(&InputEvent::PolyKeyPressure(msg.into()));
            }
            MidiCommand::ControlChange => {
                let cc = ControlChangeMessage::from(msg);
                self.bus.trigger(&InputEvent::ControlChange(cc));
                self.handle_registered_parameter(&cc);
            }
            MidiCommand::ProgramChange => {
                self.bus.trigger(&InputEvent::ProgramChange(msg.into()));
            }
            MidiCommand::ChannelPressure => {
                self.bus.trigger(&InputEvent::ChannelPressure(msg));
            }
            MidiCommand::PitchBend => {
                self.bus
                    .trigger(&InputEvent::PitchBend(PitchBendEvent::from_message(&msg)));
            }
        }
    }

    fn handle_registered_parameter(&self, cc: &ControlChangeMessage) {
        // Lock is released before dispatch so subscribers may read the input.
        let processed = self.rpn.lock().process(cc);
        match processed {
            Ok(Some(event)) => {
                self.bus.trigger(&InputEvent::RegisteredParameter(event));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(channel = cc.channel, "Dropping Data Entry: {}", e);
            }
        }
    }
}

impl Drop for InputInner {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.unsubscribe();
        }
    }
}

/// Typed view over one input port. Clones share the same subscriptions.
#[derive(Clone)]
pub struct MidiInput {
    inner: Arc<InputInner>,
}

impl MidiInput {
    /// Attach to `port` and start decoding.
    pub fn new(port: Arc<dyn MidiInputPort>, options: MidiInputOptions) -> Result<Self> {
        let inner = Arc::new(InputInner {
            port,
            options,
            bus: EventBus::new(),
            tempo: Mutex::new(TempoEstimator::new()),
            rpn: Mutex::new(RpnSelector::new()),
            listener: Mutex::new(None),
        });

        let weak: Weak<InputInner> = Arc::downgrade(&inner);
        let listener = inner.port.on_message(Arc::new(move |packet: &MidiPacket| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_packet(packet);
            }
        }))?;
        *inner.listener.lock() = Some(listener);

        tracing::debug!(
            "MIDI input attached: {} ({})",
            inner.port.name(),
            inner.port.id()
        );
        Ok(Self { inner })
    }

    pub fn id(&self) -> &str {
        self.inner.port.id()
    }

    pub fn name(&self) -> &str {
        self.inner.port.name()
    }

    pub fn manufacturer(&self) -> &str {
        self.inner.port.manufacturer()
    }

    pub fn port(&self) -> &Arc<dyn MidiInputPort> {
        &self.inner.port
    }

    pub fn options(&self) -> MidiInputOptions {
        self.inner.options
    }

    /// Estimated BPM from the recent clock pulses, 0.0 with fewer than two.
    pub fn tempo(&self) -> Result<f64> {
        if !self.inner.options.compute_clock_tempo {
            return Err(Error::Configuration(
                "clock tempo requires MidiInputOptions::compute_clock_tempo".to_string(),
            ));
        }
        Ok(self.inner.tempo.lock().bpm())
    }

    /// Remove every subscription and release the port listener.
    pub fn disconnect(&self) {
        if let Some(listener) = self.inner.listener.lock().take() {
            listener.unsubscribe();
        }
        self.inner.bus.off_all();
        tracing::debug!("MIDI input disconnected: {}", self.inner.port.id());
    }

    // ------------------------------------------------------------------
    // Generic subscriptions
    // ------------------------------------------------------------------

    pub fn on(
        &self,
        kind: InputEventKind,
        callback: impl Fn(&InputEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.bus.on(kind, callback)
    }

    pub fn once(
        &self,
        kind: InputEventKind,
        callback: impl Fn(&InputEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.bus.once(kind, callback)
    }

    /// Resolve with the next event of `kind`. Resolves to `None` if the
    /// input is disconnected first.
    pub fn next_event(
        &self,
        kind: InputEventKind,
    ) -> impl Future<Output = Option<InputEvent>> + Send + 'static {
        self.inner.bus.next(kind)
    }

    /// Trigger an event as if it had been decoded from the port.
    pub fn emit(&self, event: &InputEvent) -> usize {
        self.inner.bus.trigger(event)
    }

    fn subscribe_where<T: ?Sized + 'static>(
        &self,
        kind: InputEventKind,
        project: for<'a> fn(&'a InputEvent) -> Option<&'a T>,
        accept: impl Fn(&T) -> bool + Send + Sync + 'static,
        callback: impl Fn(&T) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.bus.on(kind, move |event| {
            if let Some(payload) = project(event) {
                if accept(payload) {
                    callback(payload);
                }
            }
        })
    }

    // ------------------------------------------------------------------
    // Notes
    // ------------------------------------------------------------------

    pub fn on_all_note_on(
        &self,
        callback: impl Fn(&NoteMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe_where(InputEventKind::NoteOn, InputEvent::as_note, |_| true, callback)
    }

    pub fn on_note_on(
        &self,
        key: u8,
        callback: impl Fn(&NoteMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe_where(
            InputEventKind::NoteOn,
            InputEvent::as_note,
            move |msg| msg.note == key,
            callback,
        )
    }

    pub fn on_all_note_off(
        &self,
        callback: impl Fn(&NoteMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe_where(InputEventKind::NoteOff, InputEvent::as_note, |_| true, callback)
    }

    pub fn on_note_off(
        &self,
        key: u8,
        callback: impl Fn(&NoteMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe_where(
            InputEventKind::NoteOff,
            InputEvent::as_note,
            move |msg| msg.note == key,
            callback,
        )
    }

    pub fn on_all_poly_key_pressure(
        &self,
        callback: impl Fn(&NoteMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe_where(
            InputEventKind::PolyKeyPressure,
            InputEvent::as_note,
            |_| true,
            callback,
        )
    }

    pub fn on_poly_key_pressure(
        &self,
        key: u8,
        callback: impl Fn(&NoteMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe_where(
            InputEventKind::PolyKeyPressure,
            InputEvent::as_note,
            move |msg| msg.data1 == key,
            callback,
        )
    }

    // ------------------------------------------------------------------
    // Channel messages
    // ------------------------------------------------------------------

    pub fn on_pitch_bend(
        &self,
        callback: impl Fn(&PitchBendEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe_where(
            InputEventKind::PitchBend,
            InputEvent::as_pitch_bend,
            |_| true,
            callback,
        )
    }

    pub fn on_channel_pressure(
        &self,
        callback: impl Fn(&ChannelVoiceMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe_where(
            InputEventKind::ChannelPressure,
            InputEvent::as_channel_pressure,
            |_| true,
            callback,
        )
    }

    pub fn on_all_program_change(
        &self,
        callback: impl Fn(&ProgramChangeMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe_where(
            InputEventKind::ProgramChange,
            InputEvent::as_program_change,
            |_| true,
            callback,
        )
    }

    pub fn on_program_change(
        &self,
        program: u8,
        callback: impl Fn(&ProgramChangeMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe_where(
            InputEventKind::ProgramChange,
            InputEvent::as_program_change,
            move |msg| msg.program == program,
            callback,
        )
    }

    pub fn on_sysex(&self, callback: impl Fn(&[u8]) + Send + Sync + 'static) -> Subscription {
        self.subscribe_where(InputEventKind::Sysex, InputEvent::as_sysex, |_| true, callback)
    }

    // ------------------------------------------------------------------
    // Control change
    // ------------------------------------------------------------------

    pub fn on_all_control_change(
        &self,
        callback: impl Fn(&ControlChangeMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe_where(
            InputEventKind::ControlChange,
            InputEvent::as_control_change,
            |_| true,
            callback,
        )
    }

    /// Control changes for one controller number.
    ///
    /// Controllers 120-127 are channel-mode messages; prefer the dedicated
    /// helpers such as [`MidiInput::on_all_notes_off`].
    pub fn on_control_change(
        &self,
        control: u8,
        callback: impl Fn(&ControlChangeMessage) + Send + Sync + 'static,
    ) -> Subscription {
        if controller::is_channel_mode(control) {
            tracing::warn!(
                control,
                "Controller is a channel mode message, use the channel mode helpers instead"
            );
        }
        self.control_change_where(control, callback)
    }

    fn control_change_where(
        &self,
        control: u8,
        callback: impl Fn(&ControlChangeMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe_where(
            InputEventKind::ControlChange,
            InputEvent::as_control_change,
            move |msg| msg.control == control,
            callback,
        )
    }

    pub fn on_all_sounds_off(
        &self,
        callback: impl Fn(&ControlChangeMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.control_change_where(controller::ALL_SOUNDS_OFF, callback)
    }

    pub fn on_reset_all_controllers(
        &self,
        callback: impl Fn(&ControlChangeMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.control_change_where(controller::RESET_ALL_CONTROLLERS, callback)
    }

    /// Local control on/off. The flag is `true` when the value is 127.
    pub fn on_local_control_change(
        &self,
        callback: impl Fn(bool, &ControlChangeMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.control_change_where(controller::LOCAL_CONTROL, move |msg| {
            callback(msg.value == 127, msg)
        })
    }

    pub fn on_all_notes_off(
        &self,
        callback: impl Fn(&ControlChangeMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.control_change_where(controller::ALL_NOTES_OFF, callback)
    }

    pub fn on_omni_mode_off(
        &self,
        callback: impl Fn(&ControlChangeMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.control_change_where(controller::OMNI_MODE_OFF, callback)
    }

    pub fn on_omni_mode_on(
        &self,
        callback: impl Fn(&ControlChangeMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.control_change_where(controller::OMNI_MODE_ON, callback)
    }

    pub fn on_mono_mode_on(
        &self,
        callback: impl Fn(&ControlChangeMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.control_change_where(controller::MONO_MODE_ON, callback)
    }

    pub fn on_poly_mode_on(
        &self,
        callback: impl Fn(&ControlChangeMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.control_change_where(controller::POLY_MODE_ON, callback)
    }

    // ------------------------------------------------------------------
    // Clock
    // ------------------------------------------------------------------

    fn on_clock(
        &self,
        kind: InputEventKind,
        callback: impl Fn(f64) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.bus.on(kind, move |event| {
            if let Some(time) = event.clock_time() {
                callback(time);
            }
        })
    }

    pub fn on_clock_pulse(&self, callback: impl Fn(f64) + Send + Sync + 'static) -> Subscription {
        self.on_clock(InputEventKind::ClockPulse, callback)
    }

    pub fn on_clock_start(&self, callback: impl Fn(f64) + Send + Sync + 'static) -> Subscription {
        self.on_clock(InputEventKind::ClockStart, callback)
    }

    pub fn on_clock_stop(&self, callback: impl Fn(f64) + Send + Sync + 'static) -> Subscription {
        self.on_clock(InputEventKind::ClockStop, callback)
    }

    pub fn on_clock_continue(
        &self,
        callback: impl Fn(f64) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_clock(InputEventKind::ClockContinue, callback)
    }

    // ------------------------------------------------------------------
    // Registered parameters
    // ------------------------------------------------------------------

    /// Every Data Entry byte for a selected registered parameter.
    pub fn on_registered_parameter(
        &self,
        callback: impl Fn(&RegisteredParameterEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe_where(
            InputEventKind::RegisteredParameter,
            InputEvent::as_registered_parameter,
            |_| true,
            callback,
        )
    }

    fn registered_parameter_where(
        &self,
        parameter: RegisteredParameter,
        callback: impl Fn(&RegisteredParameterEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe_where(
            InputEventKind::RegisteredParameter,
            InputEvent::as_registered_parameter,
            move |event| event.parameter == parameter,
            callback,
        )
    }

    pub fn on_mpe_configuration(
        &self,
        callback: impl Fn(&RegisteredParameterEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.registered_parameter_where(RegisteredParameter::MpeConfigurationMessage, callback)
    }

    pub fn on_pitch_bend_sensitivity(
        &self,
        callback: impl Fn(&RegisteredParameterEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.registered_parameter_where(RegisteredParameter::PitchBendSensitivity, callback)
    }

    pub fn on_channel_fine_tuning(
        &self,
        callback: impl Fn(&RegisteredParameterEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.registered_parameter_where(RegisteredParameter::ChannelFineTuning, callback)
    }

    pub fn on_channel_coarse_tuning(
        &self,
        callback: impl Fn(&RegisteredParameterEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.registered_parameter_where(RegisteredParameter::ChannelCoarseTuning, callback)
    }

    pub fn on_tuning_program_change(
        &self,
        callback: impl Fn(&RegisteredParameterEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.registered_parameter_where(RegisteredParameter::TuningProgramChange, callback)
    }

    pub fn on_tuning_bank_change(
        &self,
        callback: impl Fn(&RegisteredParameterEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.registered_parameter_where(RegisteredParameter::TuningBankSelect, callback)
    }

    pub fn on_modulation_depth_change(
        &self,
        callback: impl Fn(&RegisteredParameterEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.registered_parameter_where(RegisteredParameter::ModulationDepthChange, callback)
    }
}

impl std::fmt::Debug for MidiInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiInput")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("options", &self.inner.options)
            .finish()
    }
}
