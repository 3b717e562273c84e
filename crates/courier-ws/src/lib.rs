//! Live order tracking client
//!
//! This crate keeps a [`TrackingSession`](courier_route::TrackingSession)
//! moving whether or not the real-time feed is reachable. Each tracked order
//! gets a [`TrackingConnectionManager`] task that prefers the live feed,
//! falls back to a local position simulator, and keeps retrying the feed
//! with exponential backoff.
//!
//! # Features
//!
//! - Transparent live / simulated switching with a monotonic progress bar
//! - Reconnection with exponential backoff and jitter
//! - Snapshot fan-out through [`StatusBroadcast`]
//! - Event stream and [`Hooks`] for observability
//!
//! # Example
//!
//! ```no_run
//! use courier_route::TrackingSession;
//! use courier_types::{GeoPoint, OrderStatus};
//! use courier_ws::{Endpoint, TrackingConfig, TrackingConnectionManager, WsTransport};
//!
//! #[tokio::main]
//! async fn main() {
//!     let session = TrackingSession::new(
//!         "ord-1",
//!         OrderStatus::OutForDelivery,
//!         Some(GeoPoint::new(19.1136, 72.8697)),
//!     );
//!
//!     let manager = TrackingConnectionManager::new(session, TrackingConfig::default());
//!     let _sub = manager.broadcast().subscribe("ord-1", |s| {
//!         println!("{} {:?}% eta {:?}", s.status, s.progress_percent, s.eta_minutes);
//!     });
//!
//!     let url = Endpoint::default().tracking_url("ord-1");
//!     let handle = manager.start(WsTransport::new(url));
//!     handle.closed().await;
//! }
//! ```

pub mod broadcast;
pub mod endpoint;
pub mod events;
pub mod hooks;
pub mod manager;
pub mod notify;
pub mod reconnect;
pub mod simulator;
pub mod transport;

// Re-export main types
pub use broadcast::{StatusBroadcast, Subscription};
pub use endpoint::Endpoint;
pub use events::{ConnectionEvent, DisconnectReason, Event, SessionEvent};
pub use hooks::Hooks;
pub use manager::{ManagerHandle, ManagerState, TrackingConfig, TrackingConnectionManager, DEFAULT_ORIGIN};
pub use notify::{Notifier, TracingNotifier};
pub use reconnect::ReconnectConfig;
pub use simulator::{PositionSimulator, SimulatorConfig};
pub use transport::{Transport, TransportError, WsTransport};
