//! Terminal-status notifications
//!
//! The manager hands finished orders to a [`Notifier`] on a spawned task and
//! never waits for the result.

use async_trait::async_trait;
use courier_types::OrderStatus;
use tracing::info;

/// Notification collaborator
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Called once when an order reaches `delivered` or `cancelled`
    async fn order_finished(&self, order_id: &str, status: OrderStatus);
}

/// Notifier that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn order_finished(&self, order_id: &str, status: OrderStatus) {
        info!(order_id, %status, "Order finished");
    }
}
