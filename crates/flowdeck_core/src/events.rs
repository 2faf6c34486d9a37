//! Typed event channels.
//!
//! Each category of change notification (operators, links, positions, ...)
//! gets its own [`EventChannel`]. Consumers register callbacks and receive
//! every event emitted afterwards, synchronously and in emission order.
//! Filtering and merging of streams is ordinary closure composition on the
//! consumer side.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// A unique identifier for a subscription.
pub type SubscriptionId = u64;

/// Callback function type for events of type `T`.
///
/// Callbacks receive a reference to the event and should not block.
pub type EventCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Thread-safe fan-out channel for one event category.
///
/// Callbacks are invoked in subscription order. A callback must not
/// subscribe or unsubscribe on the channel it is being invoked from.
pub struct EventChannel<T> {
    callbacks: RwLock<BTreeMap<SubscriptionId, EventCallback<T>>>,
    next_id: AtomicU64,
}

impl<T> EventChannel<T> {
    /// Create a new channel with no subscribers.
    pub fn new() -> Self {
        Self {
            callbacks: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe to the channel.
    ///
    /// Returns a subscription ID that can be used to unsubscribe later.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut callbacks = self.callbacks.write().unwrap();
        callbacks.insert(id, Arc::new(callback));
        id
    }

    /// Subscribe with a filter: `callback` only sees events matching `predicate`.
    pub fn subscribe_filtered<P, F>(&self, predicate: P, callback: F) -> SubscriptionId
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if predicate(event) {
                callback(event);
            }
        })
    }

    /// Unsubscribe. Returns `true` if the subscription was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.callbacks.write().unwrap();
        callbacks.remove(&id).is_some()
    }

    /// Emit an event to all subscribers.
    ///
    /// The subscriber list is snapshotted first, so callbacks may freely
    /// emit on other channels (or this one) without holding the lock.
    pub fn emit(&self, event: &T) {
        let callbacks: Vec<EventCallback<T>> = {
            let callbacks = self.callbacks.read().unwrap();
            callbacks.values().cloned().collect()
        };
        for callback in callbacks {
            callback(event);
        }
    }

    /// Get the number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.callbacks.read().unwrap().len()
    }

    /// Clear all subscriptions.
    pub fn clear(&self) {
        self.callbacks.write().unwrap().clear();
    }
}

impl<T> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for EventChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("subscriber_count", &self.subscriber_count())
            .field("next_id", &self.next_id.load(Ordering::SeqCst))
            .finish()
    }
}
