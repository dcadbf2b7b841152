//! One MPE zone on the receiving side.

use std::fmt;
use std::ops::RangeInclusive;
use std::sync::{Arc, Weak};

use midival_core::{controller, ChannelVoiceMessage, ControlChangeMessage, NoteMessage, PitchBendEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::bus::{BusEvent, EventBus, Subscription};
use crate::input::MidiInput;

/// Member-channel pitch bend with the last master bend seen.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemberPitchBend {
    pub channel: u8,
    pub member: f64,
    pub master: f64,
}

/// Member-channel timbre or pressure with the last master value seen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberValue {
    pub channel: u8,
    pub member: u8,
    pub master: u8,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MpeZoneEvent {
    NoteOn(NoteMessage),
    NoteOff(NoteMessage),
    MasterPitchBend(PitchBendEvent),
    MemberPitchBend(MemberPitchBend),
    /// CC74 on the master channel.
    MasterTimbre(ControlChangeMessage),
    MemberTimbre(MemberValue),
    MasterPressure(ChannelVoiceMessage),
    MemberPressure(MemberValue),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MpeZoneEventKind {
    NoteOn,
    NoteOff,
    MasterPitchBend,
    MemberPitchBend,
    MasterTimbre,
    MemberTimbre,
    MasterPressure,
    MemberPressure,
}

impl BusEvent for MpeZoneEvent {
    type Kind = MpeZoneEventKind;

    fn kind(&self) -> MpeZoneEventKind {
        match self {
            MpeZoneEvent::NoteOn(_) => MpeZoneEventKind::NoteOn,
            MpeZoneEvent::NoteOff(_) => MpeZoneEventKind::NoteOff,
            MpeZoneEvent::MasterPitchBend(_) => MpeZoneEventKind::MasterPitchBend,
            MpeZoneEvent::MemberPitchBend(_) => MpeZoneEventKind::MemberPitchBend,
            MpeZoneEvent::MasterTimbre(_) => MpeZoneEventKind::MasterTimbre,
            MpeZoneEvent::MemberTimbre(_) => MpeZoneEventKind::MemberTimbre,
            MpeZoneEvent::MasterPressure(_) => MpeZoneEventKind::MasterPressure,
            MpeZoneEvent::MemberPressure(_) => MpeZoneEventKind::MemberPressure,
        }
    }
}

/// Last values received on the master channel.
#[derive(Clone, Copy, Debug, Default)]
struct MasterState {
    pitch_bend: f64,
    timbre: u8,
    pressure: u8,
}

/// Re-interprets one input's traffic for a single zone.
///
/// The zone listens while it is alive. [`MpeInputZone::detach`] stops it
/// early, which [`MpeInput`](super::MpeInput) does when it replaces a zone.
pub struct MpeInputZone {
    master_channel: u8,
    members: RangeInclusive<u8>,
    bus: EventBus<MpeZoneEvent>,
    master: Mutex<MasterState>,
    bindings: Mutex<Vec<Subscription>>,
}

impl MpeInputZone {
    pub fn new(master_channel: u8, members: RangeInclusive<u8>, input: &MidiInput) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            master_channel,
            members,
            bus: EventBus::new(),
            master: Mutex::new(MasterState::default()),
            bindings: Mutex::new(Self::bind(weak, input)),
        })
    }

    fn bind(weak: &Weak<Self>, input: &MidiInput) -> Vec<Subscription> {
        let zone = weak.clone();
        let note_on = input.on_all_note_on(move |msg| {
            if let Some(zone) = zone.upgrade() {
                if zone.is_member(msg.channel) {
                    zone.bus.trigger(&MpeZoneEvent::NoteOn(*msg));
                }
            }
        });

        let zone = weak.clone();
        let note_off = input.on_all_note_off(move |msg| {
            if let Some(zone) = zone.upgrade() {
                if zone.is_member(msg.channel) {
                    zone.bus.trigger(&MpeZoneEvent::NoteOff(*msg));
                }
            }
        });

        let zone = weak.clone();
        let pitch_bend = input.on_pitch_bend(move |event| {
            if let Some(zone) = zone.upgrade() {
                zone.handle_pitch_bend(event);
            }
        });

        let zone = weak.clone();
        let pressure = input.on_channel_pressure(move |msg| {
            if let Some(zone) = zone.upgrade() {
                zone.handle_pressure(msg);
            }
        });

        let zone = weak.clone();
        let timbre = input.on_control_change(controller::TIMBRE, move |msg| {
            if let Some(zone) = zone.upgrade() {
                zone.handle_timbre(msg);
            }
        });

        vec![note_on, note_off, pitch_bend, pressure, timbre]
    }

    fn handle_pitch_bend(&self, event: &PitchBendEvent) {
        if event.channel == self.master_channel {
            self.master.lock().pitch_bend = event.value;
            self.bus.trigger(&MpeZoneEvent::MasterPitchBend(*event));
        } else if self.is_member(event.channel) {
            let master = self.master.lock().pitch_bend;
            self.bus.trigger(&MpeZoneEvent::MemberPitchBend(MemberPitchBend {
                channel: event.channel,
                member: event.value,
                master,
            }));
        }
    }

    fn handle_pressure(&self, msg: &ChannelVoiceMessage) {
        if msg.channel == self.master_channel {
            self.master.lock().pressure = msg.data1;
            self.bus.trigger(&MpeZoneEvent::MasterPressure(*msg));
        } else if self.is_member(msg.channel) {
            let master = self.master.lock().pressure;
            self.bus.trigger(&MpeZoneEvent::MemberPressure(MemberValue {
                channel: msg.channel,
                member: msg.data1,
                master,
            }));
        }
    }

    fn handle_timbre(&self, msg: &ControlChangeMessage) {
        if msg.channel == self.master_channel {
            self.master.lock().timbre = msg.value;
            self.bus.trigger(&MpeZoneEvent::MasterTimbre(*msg));
        } else if self.is_member(msg.channel) {
            let master = self.master.lock().timbre;
            self.bus.trigger(&MpeZoneEvent::MemberTimbre(MemberValue {
                channel: msg.channel,
                member: msg.value,
                master,
            }));
        }
    }

    pub fn master_channel(&self) -> u8 {
        self.master_channel
    }

    pub fn member_channels(&self) -> RangeInclusive<u8> {
        self.members.clone()
    }

    #[inline]
    pub fn is_member(&self, channel: u8) -> bool {
        self.members.contains(&channel)
    }

    pub fn master_pitch_bend(&self) -> f64 {
        self.master.lock().pitch_bend
    }

    pub fn master_timbre(&self) -> u8 {
        self.master.lock().timbre
    }

    pub fn master_pressure(&self) -> u8 {
        self.master.lock().pressure
    }

    /// Stop listening to the input. Existing subscribers stay registered but
    /// receive nothing further.
    pub fn detach(&self) {
        for binding in self.bindings.lock().drain(..) {
            binding.unsubscribe();
        }
    }

    pub fn on(
        &self,
        kind: MpeZoneEventKind,
        callback: impl Fn(&MpeZoneEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.bus.on(kind, callback)
    }

    pub fn on_note_on(&self, callback: impl Fn(&NoteMessage) + Send + Sync + 'static) -> Subscription {
        self.bus.on(MpeZoneEventKind::NoteOn, move |event| {
            if let MpeZoneEvent::NoteOn(msg) = event {
                callback(msg);
            }
        })
    }

    pub fn on_note_off(&self, callback: impl Fn(&NoteMessage) + Send + Sync + 'static) -> Subscription {
        self.bus.on(MpeZoneEventKind::NoteOff, move |event| {
            if let MpeZoneEvent::NoteOff(msg) = event {
                callback(msg);
            }
        })
    }

    pub fn on_master_pitch_bend(
        &self,
        callback: impl Fn(&PitchBendEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.bus.on(MpeZoneEventKind::MasterPitchBend, move |event| {
            if let MpeZoneEvent::MasterPitchBend(bend) = event {
                callback(bend);
            }
        })
    }

    pub fn on_member_pitch_bend(
        &self,
        callback: impl Fn(&MemberPitchBend) + Send + Sync + 'static,
    ) -> Subscription {
        self.bus.on(MpeZoneEventKind::MemberPitchBend, move |event| {
            if let MpeZoneEvent::MemberPitchBend(bend) = event {
                callback(bend);
            }
        })
    }

    pub fn on_master_timbre(
        &self,
        callback: impl Fn(&ControlChangeMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.bus.on(MpeZoneEventKind::MasterTimbre, move |event| {
            if let MpeZoneEvent::MasterTimbre(msg) = event {
                callback(msg);
            }
        })
    }

    pub fn on_member_timbre(
        &self,
        callback: impl Fn(&MemberValue) + Send + Sync + 'static,
    ) -> Subscription {
        self.bus.on(MpeZoneEventKind::MemberTimbre, move |event| {
            if let MpeZoneEvent::MemberTimbre(value) = event {
                callback(value);
            }
        })
    }

    pub fn on_master_pressure(
        &self,
        callback: impl Fn(&ChannelVoiceMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.bus.on(MpeZoneEventKind::MasterPressure, move |event| {
            if let MpeZoneEvent::MasterPressure(msg) = event {
                callback(msg);
            }
        })
    }

    pub fn on_member_pressure(
        &self,
        callback: impl Fn(&MemberValue) + Send + Sync + 'static,
    ) -> Subscription {
        self.bus.on(MpeZoneEventKind::MemberPressure, move |event| {
            if let MpeZoneEvent::MemberPressure(value) = event {
                callback(value);
            }
        })
    }
}

impl Drop for MpeInputZone {
    fn drop(&mut self) {
        for binding in self.bindings.get_mut().drain(..) {
            binding.unsubscribe();
        }
    }
}

impl fmt::Debug for MpeInputZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpeInputZone")
            .field("master_channel", &self.master_channel)
            .field("members", &self.members)
            .finish()
    }
}
