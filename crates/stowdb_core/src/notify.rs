//! Per-namespace change notifications.
//!
//! Every successful write to a namespace is announced to the listeners and
//! subscribers registered for it, after the write has committed. An event
//! only names the namespace: observers re-read whatever they display.
//!
//! # Usage
//!
//! ```rust
//! use stowdb_core::NotificationHub;
//!
//! let hub = NotificationHub::new();
//! let rx = hub.subscribe("db.users");
//!
//! hub.notify("db.users");
//! assert_eq!(rx.recv().unwrap().namespace, "db.users");
//! ```

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

/// Event delivered when a namespace changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionChanged {
    /// The namespace that was written.
    pub namespace: String,
}

/// Callback invoked on every change of its namespace.
pub type Listener = Arc<dyn Fn(&CollectionChanged) + Send + Sync>;

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

/// Distributes namespace change events to listeners and channel subscribers.
pub struct NotificationHub {
    next_id: AtomicU64,
    listeners: RwLock<BTreeMap<ListenerId, (String, Listener)>>,
    subscribers: RwLock<Vec<(String, Sender<CollectionChanged>)>>,
}

impl NotificationHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: RwLock::new(BTreeMap::new()),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Registers `listener` for `namespace`.
    pub fn listen<F>(&self, namespace: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&CollectionChanged) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .insert(id, (namespace.into(), Arc::new(listener)));
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unlisten(&self, id: ListenerId) -> bool {
        self.listeners.write().remove(&id).is_some()
    }

    /// Returns a channel receiving every change of `namespace`.
    ///
    /// Dropping the receiver unsubscribes it.
    pub fn subscribe(&self, namespace: impl Into<String>) -> Receiver<CollectionChanged> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push((namespace.into(), tx));
        rx
    }

    /// Announces a change of `namespace` and returns how many observers got it.
    ///
    /// A panicking listener is logged and skipped; the remaining listeners
    /// still run. Listeners are called without any hub lock held, so they may
    /// register or remove listeners themselves.
    pub fn notify(&self, namespace: &str) -> usize {
        let event = CollectionChanged {
            namespace: namespace.to_string(),
        };

        let targets: Vec<(ListenerId, Listener)> = self
            .listeners
            .read()
            .iter()
            .filter(|(_, (ns, _))| ns == namespace)
            .map(|(id, (_, listener))| (*id, Arc::clone(listener)))
            .collect();

        let mut delivered = 0;
        for (id, listener) in targets {
            match catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                Ok(()) => delivered += 1,
                Err(_) => tracing::warn!(namespace, listener = ?id, "listener panicked"),
            }
        }

        self.subscribers.write().retain(|(ns, tx)| {
            if ns != namespace {
                return true;
            }
            let alive = tx.send(event.clone()).is_ok();
            if alive {
                delivered += 1;
            }
            alive
        });

        delivered
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Returns the number of channel subscribers, including ones not yet
    /// found to be disconnected.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NotificationHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationHub")
            .field("listeners", &self.listener_count())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn listeners_only_see_their_namespace() {
        let hub = NotificationHub::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        hub.listen("db.a", move |event| {
            assert_eq!(event.namespace, "db.a");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(hub.notify("db.a"), 1);
        assert_eq!(hub.notify("db.b"), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unlisten_stops_delivery() {
        let hub = NotificationHub::new();
        let id = hub.listen("db.a", |_| {});
        assert!(hub.unlisten(id));
        assert!(!hub.unlisten(id));
        assert_eq!(hub.notify("db.a"), 0);
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let hub = NotificationHub::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        hub.listen("db.a", |_| panic!("listener failure"));
        hub.listen("db.a", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(hub.notify("db.a"), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let hub = NotificationHub::new();
        let rx = hub.subscribe("db.a");
        let gone = hub.subscribe("db.a");
        drop(gone);

        assert_eq!(hub.notify("db.a"), 1);
        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(rx.try_recv().unwrap().namespace, "db.a");
    }

    #[test]
    fn listener_may_unregister_itself() {
        let hub = Arc::new(NotificationHub::new());
        let inner = Arc::clone(&hub);
        let slot = Arc::new(parking_lot::Mutex::new(None));
        let own = Arc::clone(&slot);
        let id = hub.listen("db.a", move |_| {
            if let Some(id) = own.lock().take() {
                inner.unlisten(id);
            }
        });
        *slot.lock() = Some(id);

        hub.notify("db.a");
        assert_eq!(hub.listener_count(), 0);
    }
}
