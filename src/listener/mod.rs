//! Typed publish/subscribe registry for merge-progress notification.
//!
//! This module decouples the chunk merger from its consumers: the merger
//! publishes events through a [`ListenerManager`] and consumers register
//! callbacks without polling. Delivery is synchronous, in registration
//! order, on the calling thread. There is no buffering and no async
//! dispatch.

use std::cell::Cell;
use std::rc::Rc;

/// Handle returned by [`ListenerManager::add_listener`].
///
/// Cancelling the subscription guarantees zero further invocations of the
/// listener on any later notification pass. The handle holds a shared
/// liveness flag rather than a borrow of the manager, so a listener may
/// cancel its own subscription from inside a notification callback.
#[derive(Debug, Clone)]
pub struct Subscription {
    alive: Rc<Cell<bool>>,
}

impl Subscription {
    /// Deregister the associated listener.
    ///
    /// Cancelling twice, or cancelling a listener the manager has already
    /// purged, is a no-op.
    pub fn cancel(&self) {
        self.alive.set(false);
    }

    /// Check whether the listener is still registered for future events.
    pub fn is_active(&self) -> bool {
        self.alive.get()
    }
}

struct Entry<E: 'static> {
    alive: Rc<Cell<bool>>,
    callback: Box<dyn FnMut(&E)>,
}

/// Ordered registry of event listeners.
///
/// Every listener registered (and still live) before an event is published
/// is invoked exactly once per such event, and at most once per
/// subscription.
pub struct ListenerManager<E: 'static> {
    entries: Vec<Entry<E>>,
}

impl<E: 'static> Default for ListenerManager<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> std::fmt::Debug for ListenerManager<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerManager")
            .field("listeners", &self.len())
            .finish()
    }
}

impl<E: 'static> ListenerManager<E> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register `callback` to be invoked once per published event.
    pub fn add_listener<F>(&mut self, callback: F) -> Subscription
    where
        F: FnMut(&E) + 'static,
    {
        let alive = Rc::new(Cell::new(true));
        self.entries.push(Entry {
            alive: Rc::clone(&alive),
            callback: Box::new(callback),
        });
        Subscription { alive }
    }

    /// Eagerly remove the listener behind `subscription`.
    ///
    /// Removing a listener that was never registered here, or was already
    /// cancelled, is a no-op.
    pub fn remove_listener(&mut self, subscription: &Subscription) {
        subscription.cancel();
        self.entries.retain(|entry| entry.alive.get());
    }

    /// Invoke every live listener with `event`, synchronously and in
    /// registration order.
    ///
    /// A listener that cancels its own subscription during the pass is
    /// skipped on every later pass; entries cancelled mid-pass are purged
    /// once the pass completes.
    pub fn notify_listeners(&mut self, event: &E) {
        for entry in &mut self.entries {
            if entry.alive.get() {
                (entry.callback)(event);
            }
        }
        self.entries.retain(|entry| entry.alive.get());
    }

    /// Number of live listeners.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|entry| entry.alive.get()).count()
    }

    /// Check whether no live listeners remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
