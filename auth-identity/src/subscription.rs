use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::models::AuthSnapshot;

pub(crate) type Callback = Arc<dyn Fn(&AuthSnapshot) + Send + Sync>;

#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    next_id: AtomicU64,
    callbacks: Mutex<BTreeMap<u64, Callback>>,
}

impl SubscriberRegistry {
    pub(crate) fn register(&self, callback: Callback) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks.lock().insert(id, callback);
        id
    }

    pub(crate) fn unregister(&self, id: u64) -> bool {
        self.callbacks.lock().remove(&id).is_some()
    }

    pub(crate) fn notify(&self, snapshot: &AuthSnapshot) {
        // Callbacks run outside the lock so they may subscribe or cancel
        let callbacks: Vec<Callback> = self.callbacks.lock().values().cloned().collect();
        for callback in callbacks {
            callback(snapshot);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.callbacks.lock().len()
    }
}

/// Handle for an `on_change` registration
///
/// Call [`Subscription::cancel`] on teardown. Dropping an uncancelled handle
/// unregisters it as well, so listeners never accumulate.
#[must_use = "dropping a Subscription unregisters its callback"]
pub struct Subscription {
    id: u64,
    registry: Weak<SubscriberRegistry>,
    active: bool,
}

impl Subscription {
    pub(crate) fn new(id: u64, registry: &Arc<SubscriberRegistry>) -> Self {
        Self {
            id,
            registry: Arc::downgrade(registry),
            active: true,
        }
    }

    pub fn cancel(mut self) {
        self.release();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn release(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}
