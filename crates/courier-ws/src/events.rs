//! Connection and session events
//!
//! Every event names the order it belongs to, so a client tracking several
//! orders can fan them into one stream.

use courier_types::{ConnectionQuality, OrderStatus, UpdateSource};
use std::fmt;
use std::time::Duration;

/// Reason the live feed went away
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Server closed the connection
    ServerClosed,
    /// Network error occurred
    NetworkError(String),
    /// No message received within the idle timeout
    HeartbeatTimeout,
    /// Client requested shutdown
    Shutdown,
    /// Order reached a terminal status
    OrderFinished,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServerClosed => write!(f, "server closed the connection"),
            Self::NetworkError(e) => write!(f, "network error: {}", e),
            Self::HeartbeatTimeout => write!(f, "no message within idle timeout"),
            Self::Shutdown => write!(f, "shutdown"),
            Self::OrderFinished => write!(f, "order finished"),
        }
    }
}

/// Feed lifecycle events
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// First valid message received; the session is live
    Connected {
        /// Order being tracked
        order_id: String,
        /// Whether this followed a fallback or drop
        is_reconnection: bool,
    },
    /// Live feed lost
    Disconnected {
        /// Order being tracked
        order_id: String,
        /// Reason for disconnection
        reason: DisconnectReason,
    },
    /// Reconnect scheduled
    Reconnecting {
        /// Order being tracked
        order_id: String,
        /// Current attempt number (1-indexed)
        attempt: u32,
        /// Delay before this attempt
        delay: Duration,
    },
    /// Simulator took over position production
    FallbackStarted {
        /// Order being tracked
        order_id: String,
        /// Why the feed was not usable
        reason: String,
    },
    /// Tracking ended; no further updates for this order
    Closed {
        /// Order being tracked
        order_id: String,
    },
}

/// Session state events
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Lifecycle status changed
    StatusChanged {
        /// Order being tracked
        order_id: String,
        /// Previous status
        from: OrderStatus,
        /// New status
        to: OrderStatus,
    },
    /// A position update was applied
    PositionUpdated {
        /// Order being tracked
        order_id: String,
        /// Producer of the update
        source: UpdateSource,
        /// Progress after the update
        progress: Option<f64>,
        /// Minutes until arrival after the update
        eta_minutes: Option<u32>,
    },
    /// Connection quality flag changed
    QualityChanged {
        /// Order being tracked
        order_id: String,
        /// New quality
        quality: ConnectionQuality,
    },
    /// Feed requested a status change the lifecycle forbids
    TransitionRejected {
        /// Order being tracked
        order_id: String,
        /// Current status
        from: OrderStatus,
        /// Requested status
        to: OrderStatus,
    },
    /// Feed message failed validation and was dropped
    MalformedMessage {
        /// Order being tracked
        order_id: String,
        /// Validation failure
        reason: String,
    },
}

/// Top-level event type
#[derive(Debug, Clone)]
pub enum Event {
    /// Connection-related event
    Connection(ConnectionEvent),
    /// Session-related event
    Session(SessionEvent),
}

impl Event {
    /// Order this event belongs to
    pub fn order_id(&self) -> &str {
        match self {
            Event::Connection(e) => match e {
                ConnectionEvent::Connected { order_id, .. }
                | ConnectionEvent::Disconnected { order_id, .. }
                | ConnectionEvent::Reconnecting { order_id, .. }
                | ConnectionEvent::FallbackStarted { order_id, .. }
                | ConnectionEvent::Closed { order_id } => order_id,
            },
            Event::Session(e) => match e {
                SessionEvent::StatusChanged { order_id, .. }
                | SessionEvent::PositionUpdated { order_id, .. }
                | SessionEvent::QualityChanged { order_id, .. }
                | SessionEvent::TransitionRejected { order_id, .. }
                | SessionEvent::MalformedMessage { order_id, .. } => order_id,
            },
        }
    }
}

impl From<ConnectionEvent> for Event {
    fn from(event: ConnectionEvent) -> Self {
        Event::Connection(event)
    }
}

impl From<SessionEvent> for Event {
    fn from(event: SessionEvent) -> Self {
        Event::Session(event)
    }
}
