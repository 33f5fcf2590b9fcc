//! Fan-out of merged vehicle records to registered observers.
//!
//! Delivery contract: every notification carries the **single changed record**
//! (an owned clone), not the whole table. Consumers needing the full picture
//! query [`MonitorClient::snapshot`](crate::client::MonitorClient::snapshot).

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::error;

use crate::model::VehicleState;

type Callback = Arc<dyn Fn(&VehicleState) + Send + Sync + 'static>;

#[derive(Default)]
struct Registry {
    subscribers: Mutex<HashMap<u64, Callback>>,
    next_id: AtomicU64,
}

/// Observer registry notified after each successful merge.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone, Default)]
pub struct Notifier {
    registry: Arc<Registry>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. The returned handle removes it again; dropping
    /// the handle without calling [`Subscription::unsubscribe`] leaves the
    /// observer registered.
    pub fn subscribe(
        &self,
        callback: impl Fn(&VehicleState) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .subscribers
            .lock()
            .insert(id, Arc::new(callback));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver a merged record to every current observer.
    ///
    /// A panicking observer is isolated and logged; the remaining observers
    /// still run. Callbacks are invoked outside the registry lock, so an
    /// observer may subscribe or unsubscribe from within its callback.
    pub fn notify(&self, state: &VehicleState) {
        let subscribers: Vec<(u64, Callback)> = self
            .registry
            .subscribers
            .lock()
            .iter()
            .map(|(id, cb)| (*id, Arc::clone(cb)))
            .collect();

        for (id, callback) in subscribers {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(state))).is_err() {
                error!(subscriber = id, "observer panicked; continuing fan-out");
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.subscribers.lock().len()
    }
}

/// Handle returned by [`Notifier::subscribe`].
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Remove the observer. A no-op if the notifier is already gone.
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.subscribers.lock().remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn sample() -> VehicleState {
        VehicleState::new("v1")
    }

    #[test]
    fn test_all_subscribers_receive_updates() {
        let notifier = Notifier::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let a = Arc::clone(&first);
        let _sub_a = notifier.subscribe(move |_| {
            a.fetch_add(1, Ordering::SeqCst);
        });
        let b = Arc::clone(&second);
        let _sub_b = notifier.subscribe(move |_| {
            b.fetch_add(1, Ordering::SeqCst);
        });

        notifier.notify(&sample());
        notifier.notify(&sample());

        assert_eq!(first.load(Ordering::SeqCst), 2);
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let notifier = Notifier::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&count);
        let sub = notifier.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        notifier.notify(&sample());
        sub.unsubscribe();
        notifier.notify(&sample());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[test]
    fn test_panicking_subscriber_does_not_block_others() {
        let notifier = Notifier::new();
        let reached = Arc::new(AtomicUsize::new(0));

        let _bad = notifier.subscribe(|_| panic!("observer bug"));
        let r = Arc::clone(&reached);
        let _good = notifier.subscribe(move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        });

        notifier.notify(&sample());
        assert_eq!(reached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_notification_carries_changed_record() {
        let notifier = Notifier::new();
        let seen = Arc::new(Mutex::new(None));

        let s = Arc::clone(&seen);
        let _sub = notifier.subscribe(move |state| {
            *s.lock() = Some(state.id.clone());
        });

        notifier.notify(&sample());
        assert_eq!(seen.lock().as_deref(), Some("v1"));
    }
}
