//! Re-exports for convenience
//!
//! Import everything you need with:
//! ```
//! use courier_sdk::prelude::*;
//! ```

// Client
pub use crate::builder::{ConfigError, TrackingClientBuilder};
pub use crate::client::{ClientError, TrackingClient};

// Order backend
pub use crate::api::{ApiError, InMemoryOrderApi, OrderApi};
#[cfg(feature = "rest")]
pub use crate::rest::{RestConfig, RestOrderApi};

// Types from courier-types
pub use courier_types::{
    can_transition, ConnectionQuality, DeliveryAddress, Driver, GeoPoint, Order, OrderFilter,
    OrderItem, OrderStatus, TrackingError, UpdateSource,
};

// Session and estimation
pub use courier_route::{SpeedModel, StatusChange, TrackingSession};

// Tracking runtime types
pub use courier_ws::{
    ConnectionEvent, DisconnectReason, Endpoint, Event, Hooks, ManagerHandle, ManagerState,
    Notifier, ReconnectConfig, SessionEvent, SimulatorConfig, StatusBroadcast, Subscription,
    TracingNotifier, TrackingConfig,
};

// Decimal for prices
pub use rust_decimal::Decimal;
