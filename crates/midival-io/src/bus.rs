//! Typed publish/subscribe bus.
//!
//! Events are a closed enum; each variant maps to a kind key, and each kind
//! owns an ordered list of subscribers. Lists are copy-on-write: a trigger
//! dispatches over a snapshot, so callbacks may subscribe or unsubscribe
//! re-entrantly and the change applies from the next trigger on.

use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::oneshot;

/// An event that can travel over an [`EventBus`].
pub trait BusEvent: Send + Sync + 'static {
    type Kind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

pub type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Handle returned by every subscription.
///
/// Dropping the handle keeps the callback registered; call
/// [`Subscription::unsubscribe`] to remove it.
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(detach: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// A handle with nothing to release.
    pub fn inert() -> Self {
        Self { detach: None }
    }

    pub fn unsubscribe(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

struct Subscriber<E> {
    id: u64,
    callback: Callback<E>,
}

impl<E> Clone for Subscriber<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Arc::clone(&self.callback),
        }
    }
}

struct BusInner<E: BusEvent> {
    topics: DashMap<E::Kind, Arc<Vec<Subscriber<E>>>>,
    next_id: AtomicU64,
}

impl<E: BusEvent> BusInner<E> {
    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn insert(&self, kind: E::Kind, id: u64, callback: Callback<E>) {
        let mut topic = self.topics.entry(kind).or_default();
        Arc::make_mut(&mut *topic).push(Subscriber { id, callback });
    }

    fn remove(&self, kind: E::Kind, id: u64) {
        if let Some(mut topic) = self.topics.get_mut(&kind) {
            Arc::make_mut(&mut *topic).retain(|subscriber| subscriber.id != id);
        }
    }

    fn snapshot(&self, kind: E::Kind) -> Option<Arc<Vec<Subscriber<E>>>> {
        self.topics.get(&kind).map(|topic| Arc::clone(topic.value()))
    }
}

/// Multi-map from event kind to its ordered subscribers. Clone is cheap
/// and shares the subscriber lists.
pub struct EventBus<E: BusEvent> {
    inner: Arc<BusInner<E>>,
}

impl<E: BusEvent> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: BusEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: BusEvent> EventBus<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                topics: DashMap::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register `callback` for every event of `kind`.
    pub fn on(
        &self,
        kind: E::Kind,
        callback: impl Fn(&E) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.inner.allocate_id();
        self.inner.insert(kind, id, Arc::new(callback));
        self.detach_handle(kind, id)
    }

    /// Register `callback` for the next event of `kind` only.
    pub fn once(
        &self,
        kind: E::Kind,
        callback: impl Fn(&E) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.inner.allocate_id();
        let weak = Arc::downgrade(&self.inner);
        let fired = AtomicBool::new(false);
        self.inner.insert(
            kind,
            id,
            Arc::new(move |event: &E| {
                if fired.swap(true, Ordering::AcqRel) {
                    return;
                }
                if let Some(inner) = weak.upgrade() {
                    inner.remove(kind, id);
                }
                callback(event);
            }),
        );
        self.detach_handle(kind, id)
    }

    /// Resolve with the next event of `kind`, or `None` if the bus is
    /// cleared first.
    pub fn next(&self, kind: E::Kind) -> impl Future<Output = Option<E>> + Send + 'static
    where
        E: Clone,
    {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let _subscription = self.once(kind, move |event: &E| {
            if let Some(tx) = tx.lock().take() {
                let _ = tx.send(event.clone());
            }
        });
        async move { rx.await.ok() }
    }

    /// Deliver `event` to every subscriber of its kind, in registration
    /// order. A panicking subscriber is logged and skipped; the rest still
    /// run. Returns the number of subscribers invoked.
    pub fn trigger(&self, event: &E) -> usize {
        let kind = event.kind();
        let Some(subscribers) = self.inner.snapshot(kind) else {
            return 0;
        };
        for subscriber in subscribers.iter() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (subscriber.callback)(event)));
            if outcome.is_err() {
                tracing::warn!(?kind, id = subscriber.id, "Bus subscriber panicked");
            }
        }
        subscribers.len()
    }

    /// Drop every subscriber of every kind.
    pub fn off_all(&self) {
        self.inner.topics.clear();
    }

    pub fn subscriber_count(&self, kind: E::Kind) -> usize {
        self.inner
            .snapshot(kind)
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }

    fn detach_handle(&self, kind: E::Kind, id: u64) -> Subscription {
        let weak: Weak<BusInner<E>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.remove(kind, id);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    enum TestEvent {
        Ping(u32),
        Pong,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    enum TestKind {
        Ping,
        Pong,
    }

    impl BusEvent for TestEvent {
        type Kind = TestKind;

        fn kind(&self) -> TestKind {
            match self {
                TestEvent::Ping(_) => TestKind::Ping,
                TestEvent::Pong => TestKind::Pong,
            }
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Callback<TestEvent>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = Arc::clone(&log);
        let make = move |tag: &'static str| -> Callback<TestEvent> {
            let log = Arc::clone(&log_clone);
            Arc::new(move |event: &TestEvent| log.lock().push(format!("{tag}:{event:?}")))
        };
        (log, make)
    }

    #[test]
    fn test_registration_order() {
        let bus = EventBus::<TestEvent>::new();
        let (log, make) = recorder();
        let a = make("a");
        let b = make("b");
        let _sa = bus.on(TestKind::Ping, move |e| a(e));
        let _sb = bus.on(TestKind::Ping, move |e| b(e));

        assert_eq!(bus.trigger(&TestEvent::Ping(1)), 2);
        assert_eq!(bus.trigger(&TestEvent::Pong), 0);
        assert_eq!(*log.lock(), vec!["a:Ping(1)", "b:Ping(1)"]);
    }

    #[test]
    fn test_unsubscribe_by_handle() {
        let bus = EventBus::<TestEvent>::new();
        let (log, make) = recorder();
        let a = make("a");
        let b = make("b");
        let sa = bus.on(TestKind::Ping, move |e| a(e));
        let _sb = bus.on(TestKind::Ping, move |e| b(e));

        sa.unsubscribe();
        bus.trigger(&TestEvent::Ping(2));
        assert_eq!(*log.lock(), vec!["b:Ping(2)"]);
        assert_eq!(bus.subscriber_count(TestKind::Ping), 1);
    }

    #[test]
    fn test_unsubscribe_during_dispatch_applies_to_next_trigger() {
        let bus = EventBus::<TestEvent>::new();
        let (log, make) = recorder();
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let victim_clone = Arc::clone(&victim);
        let _killer = bus.on(TestKind::Ping, move |_| {
            if let Some(sub) = victim_clone.lock().take() {
                sub.unsubscribe();
            }
        });
        let b = make("b");
        *victim.lock() = Some(bus.on(TestKind::Ping, move |e| b(e)));

        bus.trigger(&TestEvent::Ping(1));
        bus.trigger(&TestEvent::Ping(2));
        assert_eq!(*log.lock(), vec!["b:Ping(1)"]);
    }

    #[test]
    fn test_subscribe_during_dispatch() {
        let bus = EventBus::<TestEvent>::new();
        let (log, make) = recorder();
        let bus_clone = bus.clone();
        let late = make("late");
        let _s = bus.once(TestKind::Ping, move |_| {
            let late = Arc::clone(&late);
            let _ = bus_clone.on(TestKind::Ping, move |e| late(e));
        });

        bus.trigger(&TestEvent::Ping(1));
        bus.trigger(&TestEvent::Ping(2));
        assert_eq!(*log.lock(), vec!["late:Ping(2)"]);
    }

    #[test]
    fn test_once_fires_a_single_time() {
        let bus = EventBus::<TestEvent>::new();
        let (log, make) = recorder();
        let a = make("once");
        let _s = bus.once(TestKind::Pong, move |e| a(e));

        bus.trigger(&TestEvent::Pong);
        bus.trigger(&TestEvent::Pong);
        assert_eq!(*log.lock(), vec!["once:Pong"]);
        assert_eq!(bus.subscriber_count(TestKind::Pong), 0);
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        crate::test_support::init_tracing();
        let bus = EventBus::<TestEvent>::new();
        let (log, make) = recorder();
        let _bad = bus.on(TestKind::Ping, |_| panic!("subscriber failure"));
        let b = make("b");
        let _good = bus.on(TestKind::Ping, move |e| b(e));

        assert_eq!(bus.trigger(&TestEvent::Ping(3)), 2);
        assert_eq!(*log.lock(), vec!["b:Ping(3)"]);
    }

    #[test]
    fn test_off_all() {
        let bus = EventBus::<TestEvent>::new();
        let _a = bus.on(TestKind::Ping, |_| {});
        let _b = bus.on(TestKind::Pong, |_| {});
        bus.off_all();
        assert_eq!(bus.subscriber_count(TestKind::Ping), 0);
        assert_eq!(bus.trigger(&TestEvent::Pong), 0);
    }

    #[tokio::test]
    async fn test_next_resolves_with_event() {
        let bus = EventBus::<TestEvent>::new();
        let next = bus.next(TestKind::Ping);
        bus.trigger(&TestEvent::Ping(7));
        assert_eq!(next.await, Some(TestEvent::Ping(7)));
        assert_eq!(bus.subscriber_count(TestKind::Ping), 0);
    }
}
