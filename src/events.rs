//! Multicast event bus.
//!
//! # Delivery
//! - Synchronous: `emit` returns after every listener has run
//! - Registration order: listeners run in the order they subscribed
//! - Snapshot: the listener list is copied before delivery, so a listener may
//!   subscribe or unsubscribe (itself or others) without deadlocking; such
//!   changes take effect from the next `emit`

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;

/// Handle returned by `subscribe`.
pub type ListenerId = u64;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub struct EventBus<T> {
    name: &'static str,
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Listener<T>)>>,
}

impl<T> EventBus<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(ListenerId, Listener<T>)>> {
        self.listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    /// Deliver `event` to every listener, in registration order.
    pub fn emit(&self, event: &T) {
        let snapshot: Vec<Listener<T>> = self.lock().iter().map(|(_, l)| l.clone()).collect();
        tracing::trace!(bus = self.name, listeners = snapshot.len(), "Emitting event");
        for listener in snapshot {
            listener(event);
        }
    }
}

impl<T: Clone + Send + 'static> EventBus<T> {
    /// Register a one-shot waiter now; await it later with `wait`.
    pub fn waiter(&self) -> EventWaiter<'_, T> {
        let (tx, rx) = oneshot::channel();
        let slot = Mutex::new(Some(tx));
        let id = self.subscribe(move |event: &T| {
            let sender = slot.lock().unwrap_or_else(|p| p.into_inner()).take();
            if let Some(sender) = sender {
                let _ = sender.send(event.clone());
            }
        });
        EventWaiter { bus: self, id, rx }
    }
}

/// A pending one-shot subscription. Dropping it (or the future of `wait`)
/// removes the listener.
pub struct EventWaiter<'a, T> {
    bus: &'a EventBus<T>,
    id: ListenerId,
    rx: oneshot::Receiver<T>,
}

impl<T> EventWaiter<'_, T> {
    /// Wait for the next event. `None` if the bus is dropped first.
    pub async fn wait(mut self) -> Option<T> {
        (&mut self.rx).await.ok()
    }
}

impl<T> Drop for EventWaiter<'_, T> {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.id);
    }
}

impl<T> std::fmt::Debug for EventBus<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("name", &self.name)
            .field("listeners", &self.listener_count())
            .finish()
    }
}
