//! Minimal typed publish/subscribe.
//!
//! `publish` calls every current subscriber synchronously, in subscription
//! order. A subscriber that fails or panics is logged and skipped; the
//! remaining subscribers still receive the event. Nothing is replayed to
//! late subscribers. Subscribers added by a callback first hear the next
//! event; subscribers removed by a callback hear nothing more, not even
//! the rest of the current publish.

use crate::{Error, Result};
use log::warn;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Callback<E> = Arc<dyn Fn(&E) -> Result<()> + Send + Sync>;

/// Identifies one subscription on one bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

struct Registry<E> {
    next_id: u64,
    subscribers: Vec<(SubscriberId, Callback<E>)>,
}

impl<E> Registry<E> {
    fn remove(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }
}

fn lock<E>(registry: &Mutex<Registry<E>>) -> MutexGuard<'_, Registry<E>> {
    // Callbacks never run under the lock, so a poisoned registry is still consistent
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Delivery outcome of one `publish`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Handle returned by [`EventBus::subscribe`]
///
/// Dropping the handle keeps the subscription alive; call
/// [`Subscription::unsubscribe`] to remove it.
pub struct Subscription<E> {
    id: SubscriberId,
    registry: Weak<Mutex<Registry<E>>>,
}

impl<E> Subscription<E> {
    /// Id to pass to [`EventBus::unsubscribe`]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove the subscriber; returns false if it was already gone
    pub fn unsubscribe(self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| lock(&registry).remove(self.id))
    }
}

/// Synchronous fan-out of events to registered callbacks
pub struct EventBus<E> {
    registry: Arc<Mutex<Registry<E>>>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<E> EventBus<E> {
    /// Bus with no subscribers
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Register a callback for every future event
    pub fn subscribe<F>(&self, callback: F) -> Subscription<E>
    where
        F: Fn(&E) -> Result<()> + Send + Sync + 'static,
    {
        let mut registry = lock(&self.registry);
        let id = SubscriberId(registry.next_id);
        registry.next_id += 1;
        registry.subscribers.push((id, Arc::new(callback)));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Remove a subscriber by id; returns false if it was not registered
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        lock(&self.registry).remove(id)
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry).subscribers.len()
    }

    /// Remove every subscriber
    pub fn clear(&self) {
        lock(&self.registry).subscribers.clear();
    }

    fn is_subscribed(&self, id: SubscriberId) -> bool {
        lock(&self.registry).subscribers.iter().any(|(sid, _)| *sid == id)
    }

    /// Deliver `event` to every current subscriber
    pub fn publish(&self, event: &E) -> PublishReport {
        // Snapshot so callbacks may subscribe or unsubscribe without deadlocking
        let subscribers: Vec<(SubscriberId, Callback<E>)> = lock(&self.registry).subscribers.clone();

        let mut report = PublishReport::default();
        for (id, callback) in subscribers {
            if !self.is_subscribed(id) {
                continue;
            }
            let outcome = catch_unwind(AssertUnwindSafe(|| callback(event)))
                .unwrap_or_else(|payload| Err(Error::Subscriber(panic_message(payload.as_ref()))));
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!("Subscriber {id:?} failed: {e}");
                    report.failed += 1;
                }
            }
        }
        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(bus: &EventBus<u32>) -> (Arc<AtomicUsize>, Subscription<u32>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let subscription = bus.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (count, subscription)
    }

    #[test]
    fn test_delivers_in_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let order = Arc::clone(&order);
            bus.subscribe(move |event: &u32| {
                order.lock().unwrap().push((n, *event));
                Ok(())
            });
        }
        let report = bus.publish(&7);
        assert_eq!(report, PublishReport { delivered: 3, failed: 0 });
        assert_eq!(*order.lock().unwrap(), vec![(0, 7), (1, 7), (2, 7)]);
    }

    #[test]
    fn test_unsubscribed_mid_publish_is_skipped() {
        let bus: EventBus<u32> = EventBus::new();
        let target: Arc<Mutex<Option<SubscriberId>>> = Arc::new(Mutex::new(None));

        let handle = bus.clone();
        let victim = Arc::clone(&target);
        bus.subscribe(move |_| {
            if let Some(id) = victim.lock().unwrap().take() {
                handle.unsubscribe(id);
            }
            Ok(())
        });
        let (second, subscription) = counter(&bus);
        *target.lock().unwrap() = Some(subscription.id());

        let late = Arc::new(AtomicUsize::new(0));
        let joiner = bus.clone();
        let seen = Arc::clone(&late);
        let added = Arc::new(Mutex::new(false));
        bus.subscribe(move |_| {
            let mut added = added.lock().unwrap();
            if !*added {
                *added = true;
                let seen = Arc::clone(&seen);
                joiner.subscribe(move |_| {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                });
            }
            Ok(())
        });

        let report = bus.publish(&1);
        assert_eq!(report, PublishReport { delivered: 2, failed: 0 });
        assert_eq!(second.load(Ordering::SeqCst), 0);
        assert_eq!(late.load(Ordering::SeqCst), 0);

        bus.publish(&2);
        assert_eq!(late.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_subscriber_is_isolated() {
        let bus = EventBus::new();
        let (first, _a) = counter(&bus);
        bus.subscribe(|_| Err(Error::Subscriber("rejected".to_string())));
        let (third, _c) = counter(&bus);

        let report = bus.publish(&1);
        assert_eq!(report, PublishReport { delivered: 2, failed: 1 });
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(third.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let bus = EventBus::new();
        let (first, _a) = counter(&bus);
        bus.subscribe(|_| panic!("subscriber bug"));
        let (third, _c) = counter(&bus);

        let report = bus.publish(&1);
        assert_eq!(report.failed, 1);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(third.load(Ordering::SeqCst), 1);

        // The bus stays usable afterwards
        bus.publish(&2);
        assert_eq!(third.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let (count, subscription) = counter(&bus);
        bus.publish(&1);
        assert!(subscription.unsubscribe());
        bus.publish(&2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_unsubscribe_by_id() {
        let bus = EventBus::new();
        let (_, subscription) = counter(&bus);
        let id = subscription.id();
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert!(!subscription.unsubscribe());
    }

    #[test]
    fn test_no_replay_for_late_subscribers() {
        let bus = EventBus::new();
        bus.publish(&1);
        let (count, _s) = counter(&bus);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        bus.publish(&2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscribe_from_callback_does_not_deadlock() {
        let bus: EventBus<u32> = EventBus::new();
        let inner = bus.clone();
        bus.subscribe(move |_| {
            inner.subscribe(|_| Ok(()));
            Ok(())
        });
        bus.publish(&1);
        assert_eq!(bus.subscriber_count(), 2);
    }
}
