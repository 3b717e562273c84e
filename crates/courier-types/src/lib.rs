//! Shared types for order lifecycle tracking
//!
//! This crate provides the core type definitions used across the courier
//! workspace. It has minimal dependencies and can be used independently.
//!
//! # Key Types
//!
//! - [`OrderStatus`] - Lifecycle states and [`can_transition`]
//! - [`GeoPoint`] - Coordinates with great-circle distance
//! - [`Order`], [`Driver`] - Backend order projection
//! - [`FeedMessage`] - Parsed tracking feed message
//! - [`ConnectionQuality`] - Live / simulated / disconnected flag
//! - [`TrackingError`] - Error types

pub mod error;
pub mod geo;
pub mod messages;
pub mod order;
pub mod quality;
pub mod status;

pub use error::*;
pub use geo::*;
pub use messages::*;
pub use order::*;
pub use quality::*;
pub use status::*;

// Re-export rust_decimal for users
pub use rust_decimal::Decimal;
