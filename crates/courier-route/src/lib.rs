//! Runtime-free order tracking engine
//!
//! This crate holds the pure parts of live tracking: remaining-time
//! estimation, the interpolated route used when no live feed is available,
//! and the per-order [`TrackingSession`] aggregate. Nothing here owns a timer
//! or a socket; the async client in `courier-ws` drives it.
//!
//! # Example
//!
//! ```
//! use courier_route::{PositionUpdate, SpeedModel, TrackingSession};
//! use courier_types::{GeoPoint, OrderStatus};
//!
//! let mut session = TrackingSession::new(
//!     "ord-1",
//!     OrderStatus::OutForDelivery,
//!     Some(GeoPoint::new(19.1136, 72.8697)),
//! );
//! session
//!     .apply_position(
//!         &PositionUpdate::simulated(GeoPoint::new(19.0760, 72.8777), 10.0),
//!         &SpeedModel::default(),
//!     )
//!     .unwrap();
//! assert!(session.eta_minutes.unwrap() > 0);
//! ```

pub mod eta;
pub mod route;
pub mod session;

// Re-export main types
pub use eta::{estimate, EtaEstimate, SpeedModel, DEFAULT_SPEED_KMH};
pub use route::{RouteConfig, SimTick, SimulatedRoute};
pub use session::{PositionUpdate, StatusChange, TrackingSession};
