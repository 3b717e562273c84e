//! Status broadcast
//!
//! Fan-out of session snapshots to every view watching an order. Publishing
//! is synchronous and runs callbacks in subscription order; callbacks are
//! invoked outside any lock, so a callback may subscribe or unsubscribe
//! (itself included) while a publish is in progress.

use courier_route::TrackingSession;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Subscriber callback
pub type StatusCallback = Box<dyn Fn(&TrackingSession) + Send + Sync>;

struct Subscriber {
    id: u64,
    active: AtomicBool,
    callback: StatusCallback,
}

#[derive(Default)]
struct Registry {
    subscribers: DashMap<String, Vec<Arc<Subscriber>>>,
    next_id: AtomicU64,
}

impl Registry {
    fn remove(&self, order_id: &str, id: u64) {
        if let Some(mut list) = self.subscribers.get_mut(order_id) {
            list.retain(|s| s.id != id);
        }
        self.subscribers.remove_if(order_id, |_, list| list.is_empty());
    }
}

/// Per-order snapshot publisher
#[derive(Clone, Default)]
pub struct StatusBroadcast {
    registry: Arc<Registry>,
}

impl fmt::Debug for StatusBroadcast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusBroadcast")
            .field("orders", &self.registry.subscribers.len())
            .finish()
    }
}

impl StatusBroadcast {
    /// Create an empty broadcast
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for an order's snapshots
    pub fn subscribe<F>(&self, order_id: &str, callback: F) -> Subscription
    where
        F: Fn(&TrackingSession) + Send + Sync + 'static,
    {
        let subscriber = Arc::new(Subscriber {
            id: self.registry.next_id.fetch_add(1, Ordering::Relaxed),
            active: AtomicBool::new(true),
            callback: Box::new(callback),
        });
        self.registry
            .subscribers
            .entry(order_id.to_string())
            .or_default()
            .push(subscriber.clone());

        Subscription {
            order_id: order_id.to_string(),
            subscriber,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver a snapshot to every active subscriber of the order
    ///
    /// Returns the number of callbacks invoked.
    pub fn publish(&self, order_id: &str, session: &TrackingSession) -> usize {
        let targets: Vec<Arc<Subscriber>> = match self.registry.subscribers.get(order_id) {
            Some(list) => list.clone(),
            None => return 0,
        };

        let mut delivered = 0;
        for subscriber in targets {
            // Unsubscribed earlier in this publish
            if !subscriber.active.load(Ordering::Acquire) {
                continue;
            }
            (subscriber.callback)(session);
            delivered += 1;
        }
        delivered
    }

    /// Number of active subscribers for an order
    pub fn subscriber_count(&self, order_id: &str) -> usize {
        self.registry
            .subscribers
            .get(order_id)
            .map(|list| list.iter().filter(|s| s.active.load(Ordering::Acquire)).count())
            .unwrap_or(0)
    }

    /// Drop every subscriber of an order
    pub fn clear(&self, order_id: &str) {
        if let Some((_, list)) = self.registry.subscribers.remove(order_id) {
            for subscriber in list {
                subscriber.active.store(false, Ordering::Release);
            }
        }
    }
}

/// Handle returned by [`StatusBroadcast::subscribe`]
///
/// Dropping the handle keeps the subscription; call
/// [`unsubscribe`](Self::unsubscribe) to end it.
pub struct Subscription {
    order_id: String,
    subscriber: Arc<Subscriber>,
    registry: Weak<Registry>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("order_id", &self.order_id)
            .field("id", &self.subscriber.id)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Subscription {
    /// Order this subscription watches
    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    /// Check if callbacks are still delivered
    pub fn is_active(&self) -> bool {
        self.subscriber.active.load(Ordering::Acquire)
    }

    /// Stop receiving snapshots; idempotent, effective immediately
    pub fn unsubscribe(&self) {
        if !self.subscriber.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.order_id, self.subscriber.id);
        }
    }
}
