//! Observability hooks for tracking lifecycle monitoring
//!
//! Hooks observe the same lifecycle as the event stream without consuming
//! from it. Useful for logging, metrics and custom monitoring integrations.
//!
//! # Example
//!
//! ```
//! use courier_ws::hooks::Hooks;
//!
//! let hooks = Hooks::new()
//!     .on_connect(|info| {
//!         println!("Live: {}", info.order_id);
//!     })
//!     .on_fallback(|order_id, reason| {
//!         eprintln!("{} simulated: {}", order_id, reason);
//!     })
//!     .on_reconnect_attempt(|attempt, delay| {
//!         println!("Reconnecting (attempt {}), waiting {:?}", attempt, delay);
//!     });
//! ```

use crate::events::DisconnectReason;
use courier_types::OrderStatus;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Information about a live feed becoming usable
#[derive(Debug, Clone)]
pub struct ConnectInfo {
    /// Order being tracked
    pub order_id: String,
    /// Feed URL
    pub url: String,
    /// Whether this is a reconnection
    pub is_reconnection: bool,
}

/// Status change information
#[derive(Debug, Clone, Copy)]
pub struct StatusChangeInfo<'a> {
    /// Order being tracked
    pub order_id: &'a str,
    /// Previous status
    pub from: OrderStatus,
    /// New status
    pub to: OrderStatus,
}

/// Type alias for hook callbacks
pub type ConnectHook = Arc<dyn Fn(&ConnectInfo) + Send + Sync>;
pub type DisconnectHook = Arc<dyn Fn(&str, &DisconnectReason) + Send + Sync>;
pub type ReconnectAttemptHook = Arc<dyn Fn(u32, Duration) + Send + Sync>;
pub type FallbackHook = Arc<dyn Fn(&str, &str) + Send + Sync>;
pub type MalformedHook = Arc<dyn Fn(&str, &str) + Send + Sync>;
pub type StatusChangeHook = Arc<dyn Fn(&StatusChangeInfo<'_>) + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Observability hooks container
///
/// All hooks are optional and executed synchronously on the manager task.
/// Keep hook callbacks fast to avoid delaying position updates.
#[derive(Clone, Default)]
pub struct Hooks {
    pub(crate) on_connect: Option<ConnectHook>,
    pub(crate) on_disconnect: Option<DisconnectHook>,
    pub(crate) on_reconnect_attempt: Option<ReconnectAttemptHook>,
    pub(crate) on_fallback: Option<FallbackHook>,
    pub(crate) on_malformed: Option<MalformedHook>,
    pub(crate) on_status_change: Option<StatusChangeHook>,
    pub(crate) on_error: Option<ErrorHook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_connect", &self.on_connect.as_ref().map(|_| "..."))
            .field("on_disconnect", &self.on_disconnect.as_ref().map(|_| "..."))
            .field("on_reconnect_attempt", &self.on_reconnect_attempt.as_ref().map(|_| "..."))
            .field("on_fallback", &self.on_fallback.as_ref().map(|_| "..."))
            .field("on_malformed", &self.on_malformed.as_ref().map(|_| "..."))
            .field("on_status_change", &self.on_status_change.as_ref().map(|_| "..."))
            .field("on_error", &self.on_error.as_ref().map(|_| "..."))
            .finish()
    }
}

impl Hooks {
    /// Create a new empty hooks container
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for the feed going live
    ///
    /// Called each time the first valid message arrives on a connection,
    /// including after a fallback.
    pub fn on_connect<F>(mut self, f: F) -> Self
    where
        F: Fn(&ConnectInfo) + Send + Sync + 'static,
    {
        self.on_connect = Some(Arc::new(f));
        self
    }

    /// Register a callback for lost live feeds
    pub fn on_disconnect<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &DisconnectReason) + Send + Sync + 'static,
    {
        self.on_disconnect = Some(Arc::new(f));
        self
    }

    /// Register a callback for reconnection attempts
    ///
    /// Called when a retry is scheduled, with the attempt number (1-indexed)
    /// and the delay before it.
    pub fn on_reconnect_attempt<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, Duration) + Send + Sync + 'static,
    {
        self.on_reconnect_attempt = Some(Arc::new(f));
        self
    }

    /// Register a callback for switching to simulated positions
    pub fn on_fallback<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.on_fallback = Some(Arc::new(f));
        self
    }

    /// Register a callback for dropped malformed messages
    pub fn on_malformed<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.on_malformed = Some(Arc::new(f));
        self
    }

    /// Register a callback for status changes
    pub fn on_status_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&StatusChangeInfo<'_>) + Send + Sync + 'static,
    {
        self.on_status_change = Some(Arc::new(f));
        self
    }

    /// Register a callback for errors
    ///
    /// Called with the error message. Errors here are routine (they never
    /// reach the user), so this is for diagnostics only.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub(crate) fn invoke_connect(&self, info: &ConnectInfo) {
        if let Some(ref hook) = self.on_connect {
            hook(info);
        }
    }

    pub(crate) fn invoke_disconnect(&self, order_id: &str, reason: &DisconnectReason) {
        if let Some(ref hook) = self.on_disconnect {
            hook(order_id, reason);
        }
    }

    pub(crate) fn invoke_reconnect_attempt(&self, attempt: u32, delay: Duration) {
        if let Some(ref hook) = self.on_reconnect_attempt {
            hook(attempt, delay);
        }
    }

    pub(crate) fn invoke_fallback(&self, order_id: &str, reason: &str) {
        if let Some(ref hook) = self.on_fallback {
            hook(order_id, reason);
        }
    }

    pub(crate) fn invoke_malformed(&self, order_id: &str, reason: &str) {
        if let Some(ref hook) = self.on_malformed {
            hook(order_id, reason);
        }
    }

    pub(crate) fn invoke_status_change(&self, info: &StatusChangeInfo<'_>) {
        if let Some(ref hook) = self.on_status_change {
            hook(info);
        }
    }

    pub(crate) fn invoke_error(&self, msg: &str) {
        if let Some(ref hook) = self.on_error {
            hook(msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_hooks_builder() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let hooks = Hooks::new().on_connect(move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        hooks.invoke_connect(&ConnectInfo {
            order_id: "ord-1".into(),
            url: "ws://localhost:8000/ws/tracking/ord-1".into(),
            is_reconnection: false,
        });
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hooks_clone() {
        let hooks = Hooks::new().on_connect(|_| {}).on_fallback(|_, _| {});

        let cloned = hooks.clone();
        assert!(cloned.on_connect.is_some());
        assert!(cloned.on_fallback.is_some());
        assert!(cloned.on_disconnect.is_none());
    }

    #[test]
    fn test_hooks_default() {
        let hooks = Hooks::default();
        // Should not panic when invoking empty hooks
        hooks.invoke_status_change(&StatusChangeInfo {
            order_id: "ord-1",
            from: OrderStatus::Packed,
            to: OrderStatus::OutForDelivery,
        });
        hooks.invoke_error("boom");
    }
}
