//! Real-time listener handles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;
use uuid::Uuid;

use super::remote::Subscription;

const SOURCE: &str = "application::listener";

/// A live real-time subscription feeding the cache.
///
/// Unsubscribing is idempotent and takes effect before the remote
/// cancellation: the gate is checked inside the snapshot callback, so no
/// propagation originates from this listener afterwards, even if the store
/// delivers one more notification. Dropping the handle unsubscribes.
pub struct ListenerHandle {
    active: Arc<AtomicBool>,
    subscription: Subscription,
}

impl ListenerHandle {
    pub(crate) fn new(active: Arc<AtomicBool>, subscription: Subscription) -> Self {
        Self {
            active,
            subscription,
        }
    }

    pub fn id(&self) -> Uuid {
        self.subscription.id()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stop this listener. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            debug!(
                target_module = SOURCE,
                listener_id = %self.subscription.id(),
                "Listener unsubscribed"
            );
        }
        self.subscription.cancel();
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("id", &self.subscription.id())
            .field("active", &self.is_active())
            .finish()
    }
}

/// Take a value out of a shared one-shot slot, recovering from a poisoned
/// lock the same way the cache locks do.
pub(crate) fn take_once<T>(slot: &Mutex<Option<T>>) -> Option<T> {
    match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    }
}
