//! MPE input manager: zone discovery from MPE Configuration Messages.

use std::fmt;
use std::sync::{Arc, Weak};

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;

use super::input_zone::MpeInputZone;
use super::{MpeZoneSizes, LOWER_ZONE_MASTER, UPPER_ZONE_MASTER};
use crate::bus::{BusEvent, EventBus, Subscription};
use crate::input::MidiInput;

/// A zone was created, replaced or removed (`None`).
#[derive(Clone, Debug)]
pub enum ZoneUpdate {
    Lower(Option<Arc<MpeInputZone>>),
    Upper(Option<Arc<MpeInputZone>>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ZoneUpdateKind {
    Lower,
    Upper,
}

impl BusEvent for ZoneUpdate {
    type Kind = ZoneUpdateKind;

    fn kind(&self) -> ZoneUpdateKind {
        match self {
            ZoneUpdate::Lower(_) => ZoneUpdateKind::Lower,
            ZoneUpdate::Upper(_) => ZoneUpdateKind::Upper,
        }
    }
}

impl ZoneUpdate {
    pub fn zone(&self) -> Option<&Arc<MpeInputZone>> {
        match self {
            ZoneUpdate::Lower(zone) | ZoneUpdate::Upper(zone) => zone.as_ref(),
        }
    }
}

struct MpeInputInner {
    input: MidiInput,
    lower: ArcSwapOption<MpeInputZone>,
    upper: ArcSwapOption<MpeInputZone>,
    updates: EventBus<ZoneUpdate>,
    configuration: Mutex<Option<Subscription>>,
}

impl MpeInputInner {
    fn configure_lower(&self, size: u8) {
        let zone = (size > 0).then(|| {
            let last = LOWER_ZONE_MASTER.saturating_add(size).min(16);
            MpeInputZone::new(LOWER_ZONE_MASTER, 2..=last, &self.input)
        });
        if let Some(previous) = self.lower.swap(zone.clone()) {
            previous.detach();
        }
        tracing::debug!(size, "MPE lower zone configured");
        self.updates.trigger(&ZoneUpdate::Lower(zone));
    }

    fn configure_upper(&self, size: u8) {
        let zone = (size > 0).then(|| {
            let first = 15u8.saturating_sub(size).max(1);
            MpeInputZone::new(UPPER_ZONE_MASTER, first..=15, &self.input)
        });
        if let Some(previous) = self.upper.swap(zone.clone()) {
            previous.detach();
        }
        tracing::debug!(size, "MPE upper zone configured");
        self.updates.trigger(&ZoneUpdate::Upper(zone));
    }
}

impl Drop for MpeInputInner {
    fn drop(&mut self) {
        if let Some(configuration) = self.configuration.get_mut().take() {
            configuration.unsubscribe();
        }
    }
}

/// MPE view over a [`MidiInput`].
///
/// Listens for the MPE Configuration Message: Data Entry MSB on channel 1
/// sets the lower zone size, on channel 16 the upper zone size. A size of 0
/// removes the zone.
#[derive(Clone)]
pub struct MpeInput {
    inner: Arc<MpeInputInner>,
}

impl MpeInput {
    /// Wrap `input`, starting with the zones in `defaults` (0 leaves a zone
    /// off until the sender configures it).
    pub fn new(input: MidiInput, defaults: MpeZoneSizes) -> Self {
        let inner = Arc::new(MpeInputInner {
            input,
            lower: ArcSwapOption::empty(),
            upper: ArcSwapOption::empty(),
            updates: EventBus::new(),
            configuration: Mutex::new(None),
        });

        let weak: Weak<MpeInputInner> = Arc::downgrade(&inner);
        let configuration = inner.input.on_mpe_configuration(move |event| {
            let (Some(inner), Some(size)) = (weak.upgrade(), event.msb) else {
                return;
            };
            match event.channel {
                LOWER_ZONE_MASTER => inner.configure_lower(size),
                UPPER_ZONE_MASTER => inner.configure_upper(size),
                _ => {}
            }
        });
        *inner.configuration.lock() = Some(configuration);

        if defaults.lower_zone_size > 0 {
            inner.configure_lower(defaults.lower_zone_size);
        }
        if defaults.upper_zone_size > 0 {
            inner.configure_upper(defaults.upper_zone_size);
        }
        Self { inner }
    }

    pub fn input(&self) -> &MidiInput {
        &self.inner.input
    }

    pub fn is_mpe_enabled(&self) -> bool {
        self.inner.lower.load().is_some() || self.inner.upper.load().is_some()
    }

    pub fn lower_zone(&self) -> Option<Arc<MpeInputZone>> {
        self.inner.lower.load_full()
    }

    pub fn upper_zone(&self) -> Option<Arc<MpeInputZone>> {
        self.inner.upper.load_full()
    }

    /// Reconfigure the lower zone locally, as if the sender had sent it.
    pub fn configure_lower_zone(&self, size: u8) {
        self.inner.configure_lower(size);
    }

    /// Reconfigure the upper zone locally, as if the sender had sent it.
    pub fn configure_upper_zone(&self, size: u8) {
        self.inner.configure_upper(size);
    }

    /// Called on every lower zone change. An active zone is reported to the
    /// new subscriber right away.
    pub fn on_lower_zone_update(
        &self,
        callback: impl Fn(Option<&Arc<MpeInputZone>>) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_zone_update(ZoneUpdateKind::Lower, self.lower_zone(), callback)
    }

    /// Called on every upper zone change. An active zone is reported to the
    /// new subscriber right away.
    pub fn on_upper_zone_update(
        &self,
        callback: impl Fn(Option<&Arc<MpeInputZone>>) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_zone_update(ZoneUpdateKind::Upper, self.upper_zone(), callback)
    }

    fn on_zone_update(
        &self,
        kind: ZoneUpdateKind,
        current: Option<Arc<MpeInputZone>>,
        callback: impl Fn(Option<&Arc<MpeInputZone>>) + Send + Sync + 'static,
    ) -> Subscription {
        let callback = Arc::new(callback);
        let callback_clone = Arc::clone(&callback);
        let subscription = self
            .inner
            .updates
            .on(kind, move |update| callback_clone(update.zone()));
        if let Some(zone) = current {
            callback(Some(&zone));
        }
        subscription
    }
}

impl fmt::Debug for MpeInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpeInput")
            .field("input", &self.inner.input.id())
            .field("lower_zone", &self.lower_zone())
            .field("upper_zone", &self.upper_zone())
            .finish()
    }
}
