//! Error types for order tracking

use crate::OrderStatus;
use std::time::Duration;
use thiserror::Error;

/// Main error type for tracking operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackingError {
    // === State machine ===
    /// Requested status change violates the lifecycle
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    // === Connection ===
    /// Tracking feed could not be reached or dropped
    #[error("Connection error: {0}")]
    Connection(String),

    /// No connection or first message within the allotted time
    #[error("Connection timeout after {timeout:?}")]
    ConnectionTimeout { timeout: Duration },

    // === Protocol ===
    /// Inbound message failed shape validation
    #[error("Malformed message: {reason}")]
    MalformedMessage { reason: String, raw: Option<String> },

    // === Session ===
    /// Session has been closed; no further changes are accepted
    #[error("Tracking session closed")]
    SessionClosed,

    /// Destination unknown, so no simulation/ETA is possible
    #[error("Destination coordinates missing for order {order_id}")]
    MissingDestination { order_id: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TrackingError {
    /// Create a malformed-message error keeping the raw text
    pub fn malformed(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::MalformedMessage {
            reason: reason.into(),
            raw: Some(raw.into()),
        }
    }

    /// Create an invalid-transition error
    pub fn invalid_transition(from: OrderStatus, to: OrderStatus) -> Self {
        Self::InvalidTransition { from, to }
    }

    /// Returns true for errors that are part of normal operation and only
    /// get logged (never shown to the user)
    pub fn is_routine(&self) -> bool {
        matches!(
            self,
            Self::Connection(_)
                | Self::ConnectionTimeout { .. }
                | Self::MalformedMessage { .. }
                | Self::InvalidTransition { .. }
        )
    }

    /// Returns true if this error should switch the session to simulation
    pub fn should_fallback(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::ConnectionTimeout { .. })
    }
}

/// Result type alias for tracking operations
pub type TrackingResult<T> = Result<T, TrackingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = TrackingError::Connection("refused".into());
        assert!(err.should_fallback());
        assert!(err.is_routine());

        let err = TrackingError::invalid_transition(OrderStatus::Delivered, OrderStatus::Packed);
        assert!(!err.should_fallback());
        assert!(err.is_routine());
        assert_eq!(err.to_string(), "Invalid status transition: delivered -> packed");

        assert!(!TrackingError::SessionClosed.is_routine());
    }

    #[test]
    fn test_malformed_keeps_raw() {
        let err = TrackingError::malformed("bad", "{}");
        match err {
            TrackingError::MalformedMessage { raw, .. } => assert_eq!(raw.as_deref(), Some("{}")),
            _ => unreachable!(),
        }
    }
}
