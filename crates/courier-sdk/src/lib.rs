//! High-level SDK for order lifecycle tracking
//!
//! This crate wraps the per-order connection managers from `courier-ws` in a
//! single client. It tracks any number of orders, fans snapshots out to
//! subscribers, and talks to the order backend for status updates.
//!
//! # Quick Start
//!
//! ```no_run
//! use courier_sdk::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api = RestOrderApi::new(RestConfig::new("http://localhost:8000").with_token("secret"))?;
//!     let mut client = TrackingClient::builder("ws://localhost:8000")
//!         .with_order_api(std::sync::Arc::new(api))
//!         .build()?;
//!
//!     // Track every order that is on its way
//!     for order in client.list_orders(&OrderFilter::status(OrderStatus::OutForDelivery)).await? {
//!         let _sub = client.subscribe(&order.id, |s| {
//!             println!("{}: {} eta {:?}", s.order_id, s.status, s.eta_minutes);
//!         });
//!         client.track(&order);
//!     }
//!
//!     // Process events
//!     let mut events = client.events().unwrap();
//!     while let Some(event) = events.recv().await {
//!         if let Event::Connection(ConnectionEvent::FallbackStarted { order_id, reason }) = event {
//!             println!("{} simulated: {}", order_id, reason);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - **Simple API**: Builder pattern for configuration
//! - **Always moving**: Simulated positions while the live feed is down
//! - **Lifecycle checks**: Invalid status changes never reach the backend
//! - **Event-Driven**: One event stream for all tracked orders
//! - **Metrics**: Optional Prometheus counters (`metrics` feature)

pub mod api;
pub mod builder;
pub mod client;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod prelude;
#[cfg(feature = "rest")]
pub mod rest;

// Re-export main types
pub use api::{ApiError, InMemoryOrderApi, OrderApi};
pub use builder::{ConfigError, TrackingClientBuilder};
pub use client::{ClientError, TrackingClient};
#[cfg(feature = "rest")]
pub use rest::{RestConfig, RestOrderApi};

// Re-export commonly used types from dependencies
pub use courier_route::TrackingSession;
pub use courier_types::{Order, OrderStatus, TrackingError};
pub use courier_ws::{Endpoint, Event, ManagerState, TrackingConfig};
