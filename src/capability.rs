//! Owned handle for an injected external capability.
//!
//! # States
//! ```text
//! Uninitialized → Loading → Ready(Arc<T>)
//!        ↑__________________________|   (reset)
//! ```
//!
//! Replaces process-wide nullable singletons: each session owns its own
//! handles, and callers can tell "not started" apart from "still loading".

use std::sync::{Arc, Mutex, MutexGuard};

/// Lifecycle state of a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityState {
    Uninitialized,
    Loading,
    Ready,
}

enum Slot<T: ?Sized> {
    Uninitialized,
    Loading,
    Ready(Arc<T>),
}

/// A capability slot with an explicit lifecycle.
pub struct Capability<T: ?Sized> {
    name: &'static str,
    slot: Mutex<Slot<T>>,
}

impl<T: ?Sized> Capability<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: Mutex::new(Slot::Uninitialized),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> CapabilityState {
        match *self.lock() {
            Slot::Uninitialized => CapabilityState::Uninitialized,
            Slot::Loading => CapabilityState::Loading,
            Slot::Ready(_) => CapabilityState::Ready,
        }
    }

    /// Move to `Loading`. Returns `false` if already loading or ready.
    pub fn begin_loading(&self) -> bool {
        let mut slot = self.lock();
        match *slot {
            Slot::Uninitialized => {
                *slot = Slot::Loading;
                tracing::debug!(capability = self.name, "Capability loading");
                true
            }
            _ => false,
        }
    }

    pub fn set_ready(&self, value: Arc<T>) {
        *self.lock() = Slot::Ready(value);
        tracing::debug!(capability = self.name, "Capability ready");
    }

    pub fn reset(&self) {
        *self.lock() = Slot::Uninitialized;
    }

    /// The capability, if ready.
    pub fn get(&self) -> Option<Arc<T>> {
        match &*self.lock() {
            Slot::Ready(value) => Some(value.clone()),
            _ => None,
        }
    }
}

impl<T: ?Sized> std::fmt::Debug for Capability<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}
