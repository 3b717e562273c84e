//! Prometheus metrics for the tracking client
//!
//! # Enabling Metrics
//!
//! Add the `metrics` feature to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! courier-sdk = { version = "0.1", features = ["metrics"] }
//! ```
//!
//! and install the recording hooks when building the client:
//!
//! ```no_run
//! use courier_sdk::{metrics, TrackingClient};
//!
//! let client = TrackingClient::builder("ws://localhost:8000")
//!     .with_hooks(metrics::hooks())
//!     .build();
//! ```
//!
//! # Available Metrics
//!
//! ## Counters
//! - `courier_feed_connections_total` - Live feed connections by kind
//! - `courier_feed_disconnections_total` - Live feed losses by reason
//! - `courier_reconnect_attempts_total` - Scheduled reconnect attempts
//! - `courier_fallbacks_total` - Switches to simulated positions
//! - `courier_malformed_messages_total` - Dropped feed messages
//! - `courier_status_changes_total` - Status changes by target status
//! - `courier_errors_total` - Errors reported through hooks
//!
//! ## Gauges
//! - `courier_tracked_orders` - Orders currently tracked
//!
//! ## Histograms
//! - `courier_reconnect_delay_seconds` - Backoff delay before reconnects

use courier_types::OrderStatus;
use courier_ws::{DisconnectReason, Hooks};
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Encoder, Gauge, Histogram, TextEncoder,
};

lazy_static! {
    /// Live feed connections
    pub static ref FEED_CONNECTIONS: CounterVec = register_counter_vec!(
        "courier_feed_connections_total",
        "Live feed connections",
        &["kind"]
    ).unwrap();

    /// Live feed losses
    pub static ref FEED_DISCONNECTIONS: CounterVec = register_counter_vec!(
        "courier_feed_disconnections_total",
        "Live feed losses",
        &["reason"]
    ).unwrap();

    /// Reconnect attempts scheduled
    pub static ref RECONNECT_ATTEMPTS: Counter = register_counter!(
        "courier_reconnect_attempts_total",
        "Reconnect attempts scheduled"
    ).unwrap();

    /// Switches to simulated positions
    pub static ref FALLBACKS: Counter = register_counter!(
        "courier_fallbacks_total",
        "Switches to simulated positions"
    ).unwrap();

    /// Feed messages dropped as malformed
    pub static ref MALFORMED_MESSAGES: Counter = register_counter!(
        "courier_malformed_messages_total",
        "Feed messages dropped as malformed"
    ).unwrap();

    /// Status changes by target status
    pub static ref STATUS_CHANGES: CounterVec = register_counter_vec!(
        "courier_status_changes_total",
        "Order status changes",
        &["to"]
    ).unwrap();

    /// Errors reported through hooks
    pub static ref ERRORS: Counter = register_counter!(
        "courier_errors_total",
        "Errors reported by tracking managers"
    ).unwrap();

    /// Orders currently tracked
    pub static ref TRACKED_ORDERS: Gauge = register_gauge!(
        "courier_tracked_orders",
        "Orders currently tracked"
    ).unwrap();

    /// Backoff delay before reconnects
    pub static ref RECONNECT_DELAY: Histogram = register_histogram!(
        "courier_reconnect_delay_seconds",
        "Backoff delay before reconnect attempts",
        vec![1.0, 3.0, 6.0, 12.0, 24.0, 30.0]
    ).unwrap();
}

/// Record a live feed connection
pub fn record_connection(is_reconnection: bool) {
    let kind = if is_reconnection { "reconnect" } else { "initial" };
    FEED_CONNECTIONS.with_label_values(&[kind]).inc();
}

/// Record a lost live feed
pub fn record_disconnection(reason: &DisconnectReason) {
    let label = match reason {
        DisconnectReason::ServerClosed => "server_closed",
        DisconnectReason::NetworkError(_) => "network_error",
        DisconnectReason::HeartbeatTimeout => "idle_timeout",
        DisconnectReason::Shutdown => "shutdown",
        DisconnectReason::OrderFinished => "order_finished",
    };
    FEED_DISCONNECTIONS.with_label_values(&[label]).inc();
}

/// Record a scheduled reconnect
pub fn record_reconnect_attempt(delay_secs: f64) {
    RECONNECT_ATTEMPTS.inc();
    RECONNECT_DELAY.observe(delay_secs);
}

/// Record a fallback to simulation
pub fn record_fallback() {
    FALLBACKS.inc();
}

/// Record a dropped feed message
pub fn record_malformed() {
    MALFORMED_MESSAGES.inc();
}

/// Record a status change
pub fn record_status_change(to: OrderStatus) {
    STATUS_CHANGES.with_label_values(&[to.as_str()]).inc();
}

/// Record an error
pub fn record_error() {
    ERRORS.inc();
}

/// Set the number of tracked orders
pub fn set_tracked_orders(count: usize) {
    TRACKED_ORDERS.set(count as f64);
}

/// Hooks that record every lifecycle callback
pub fn hooks() -> Hooks {
    Hooks::new()
        .on_connect(|info| record_connection(info.is_reconnection))
        .on_disconnect(|_, reason| record_disconnection(reason))
        .on_reconnect_attempt(|_, delay| record_reconnect_attempt(delay.as_secs_f64()))
        .on_fallback(|_, _| record_fallback())
        .on_malformed(|_, _| record_malformed())
        .on_status_change(|change| record_status_change(change.to))
        .on_error(|_| record_error())
}

/// Render all registered metrics in the Prometheus text format
pub fn gather_text() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if encoder.encode(&prometheus::gather(), &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording() {
        record_status_change(OrderStatus::Packed);
        record_status_change(OrderStatus::Packed);
        assert!(STATUS_CHANGES.with_label_values(&["packed"]).get() >= 2.0);

        set_tracked_orders(3);
        assert_eq!(TRACKED_ORDERS.get(), 3.0);

        record_disconnection(&DisconnectReason::HeartbeatTimeout);
        let text = gather_text();
        assert!(text.contains("courier_feed_disconnections_total"));
        assert!(text.contains("idle_timeout"));
    }
}
