// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback storage and dispatch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

/// Unique identifier for a subscription.
///
/// IDs are unique within a registry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Registry of callbacks receiving `&T`.
///
/// Uses `parking_lot::RwLock` for interior mutability. Dispatch clones the
/// callback list before invoking it, so a callback may subscribe or
/// unsubscribe (itself or others) without deadlocking; such changes take
/// effect from the next dispatch.
pub struct CallbackRegistry<T: ?Sized> {
    next_id: AtomicU64,
    callbacks: RwLock<Vec<(SubscriptionId, Callback<T>)>>,
}

impl<T: ?Sized + 'static> CallbackRegistry<T> {
    /// Creates a new empty callback registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a callback and returns its ID.
    pub fn register<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.callbacks.write().push((id, Arc::new(callback)));
        id
    }

    /// Registers a callback and returns a disposer bound to this registry.
    pub fn subscribe<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.register(callback);
        let weak: Weak<dyn Unsubscribe> = Arc::downgrade(self) as Weak<dyn Unsubscribe>;
        Subscription {
            id,
            registry: weak,
        }
    }

    /// Unregisters a callback by its subscription ID.
    ///
    /// Returns `true` if a callback was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.callbacks.write();
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    /// Clears all callbacks.
    pub fn clear(&self) {
        self.callbacks.write().clear();
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Invokes every registered callback in registration order.
    pub fn dispatch(&self, value: &T) {
        let snapshot: Vec<Callback<T>> = self
            .callbacks
            .read()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in snapshot {
            callback(value);
        }
    }

    /// Returns the number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Returns `true` if there are no registered callbacks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }
}

impl<T: ?Sized + 'static> Default for CallbackRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> std::fmt::Debug for CallbackRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("callback_count", &self.callbacks.read().len())
            .finish()
    }
}

trait Unsubscribe: Send + Sync {
    fn remove(&self, id: SubscriptionId) -> bool;
}

impl<T: ?Sized + 'static> Unsubscribe for CallbackRegistry<T> {
    fn remove(&self, id: SubscriptionId) -> bool {
        self.unsubscribe(id)
    }
}

/// Disposer for a registered callback.
///
/// Holds only a weak reference to its registry; unsubscribing after the
/// registry is gone is a no-op that returns `false`.
#[must_use = "dropping a Subscription keeps the callback registered"]
pub struct Subscription {
    id: SubscriptionId,
    registry: Weak<dyn Unsubscribe>,
}

impl Subscription {
    /// Returns the subscription's ID.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Removes the callback from its registry.
    ///
    /// Returns `true` if the callback was still registered.
    pub fn unsubscribe(self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.remove(self.id))
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn subscription_id_display() {
        let registry: CallbackRegistry<()> = CallbackRegistry::new();
        let id = registry.register(|_| {});
        assert_eq!(id.to_string(), "Sub(1)");
        assert_eq!(id.value(), 1);
    }

    #[test]
    fn registry_new_is_empty() {
        let registry: CallbackRegistry<u8> = CallbackRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn dispatch_in_registration_order() {
        let registry: CallbackRegistry<&'static str> = CallbackRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let log = Arc::clone(&log);
            registry.register(move |value: &&'static str| log.lock().push(format!("{tag}:{value}")));
        }

        registry.dispatch(&"x");
        assert_eq!(*log.lock(), vec!["a:x", "b:x", "c:x"]);
    }

    #[test]
    fn subscription_unsubscribes() {
        let registry: Arc<CallbackRegistry<u32>> = Arc::new(CallbackRegistry::new());
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let subscription = registry.subscribe(move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });
        registry.dispatch(&1);
        assert!(subscription.unsubscribe());
        registry.dispatch(&1);

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn unsubscribe_after_registry_dropped() {
        let registry: Arc<CallbackRegistry<u32>> = Arc::new(CallbackRegistry::new());
        let subscription = registry.subscribe(|_| {});
        drop(registry);
        assert!(!subscription.unsubscribe());
    }

    #[test]
    fn unsubscribe_unknown_id() {
        let registry: CallbackRegistry<u32> = CallbackRegistry::new();
        let id = registry.register(|_| {});
        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
    }

    #[test]
    fn callback_may_unsubscribe_during_dispatch() {
        let registry: Arc<CallbackRegistry<u32>> = Arc::new(CallbackRegistry::new());
        let counter = Arc::new(AtomicU32::new(0));

        let weak = Arc::downgrade(&registry);
        let counter_clone = Arc::clone(&counter);
        registry.register(move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            if let Some(registry) = weak.upgrade() {
                registry.clear();
            }
        });

        registry.dispatch(&0);
        registry.dispatch(&0);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn registry_debug() {
        let registry: CallbackRegistry<u32> = CallbackRegistry::new();
        registry.register(|_| {});

        let debug = format!("{registry:?}");
        assert!(debug.contains("CallbackRegistry"));
        assert!(debug.contains("callback_count"));
    }
}
