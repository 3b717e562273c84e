//! Per-order tracking aggregate
//!
//! [`TrackingSession`] is the state every dashboard renders: status, driver
//! position, ETA, progress and connection quality. It is mutated by a single
//! owner (the connection manager) and handed to observers as cloned
//! snapshots.
//!
//! Two invariants hold across every mutation:
//!
//! - status only moves along the lifecycle ([`can_transition`]); a rejected
//!   update leaves the session untouched
//! - `progress_percent` never decreases, whatever mix of live and simulated
//!   updates produced it

use crate::eta::{estimate, EtaEstimate, SpeedModel};
use courier_types::{
    can_transition, status_steps, ConnectionQuality, Driver, GeoPoint, LocationUpdate, Order,
    OrderStatus, StatusStep, TrackingError, UpdateSource,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A position report from either producer
#[derive(Debug, Clone, PartialEq)]
pub struct PositionUpdate {
    /// Which producer generated it
    pub source: UpdateSource,
    /// Driver position
    pub position: GeoPoint,
    /// Reported status, if any
    pub status: Option<OrderStatus>,
    /// Reported status line
    pub status_text: Option<String>,
    /// Producer-supplied ETA (overrides the estimator)
    pub eta_minutes: Option<u32>,
    /// Producer-supplied progress (0-100)
    pub progress: Option<f64>,
    /// Driver details
    pub driver: Option<Driver>,
}

impl PositionUpdate {
    /// Adapt a live feed message
    pub fn live(update: &LocationUpdate) -> Self {
        Self {
            source: UpdateSource::Live,
            position: update.location,
            status: update.order_status(),
            status_text: update.status_text.clone(),
            eta_minutes: update.eta_minutes,
            progress: update.progress,
            driver: update.driver.clone(),
        }
    }

    /// Adapt a simulator tick
    pub fn simulated(position: GeoPoint, progress: f64) -> Self {
        Self {
            source: UpdateSource::Simulated,
            position,
            status: None,
            status_text: None,
            eta_minutes: None,
            progress: Some(progress),
            driver: None,
        }
    }
}

/// A successful status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl StatusChange {
    /// Check if the change ended the order
    pub fn is_terminal(&self) -> bool {
        self.to.is_terminal()
    }
}

/// Observable tracking state for one order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingSession {
    /// Order being tracked
    pub order_id: String,
    /// Current lifecycle status
    pub status: OrderStatus,
    /// Last non-cancelled status (for the step indicator)
    pub last_active_status: OrderStatus,
    /// Status line from the feed
    pub status_text: Option<String>,
    /// Driver position
    pub current_position: Option<GeoPoint>,
    /// Delivery coordinates
    pub destination: Option<GeoPoint>,
    /// First known driver position, the reference for geometric progress
    pub route_origin: Option<GeoPoint>,
    /// Minutes until arrival
    pub eta_minutes: Option<u32>,
    /// Remaining distance
    pub distance_km: Option<f64>,
    /// Progress 0-100, `None` while indeterminate
    pub progress_percent: Option<f64>,
    /// Assigned driver
    pub driver: Option<Driver>,
    /// Position producer
    pub connection_quality: ConnectionQuality,
    /// Bumped on every change
    pub revision: u64,
    /// Time of the last change
    pub updated_at: DateTime<Utc>,
}

impl TrackingSession {
    /// Create a session for an order
    pub fn new(order_id: impl Into<String>, status: OrderStatus, destination: Option<GeoPoint>) -> Self {
        Self {
            order_id: order_id.into(),
            status,
            last_active_status: status,
            status_text: None,
            current_position: None,
            destination,
            route_origin: None,
            eta_minutes: None,
            distance_km: None,
            progress_percent: None,
            driver: None,
            connection_quality: ConnectionQuality::Disconnected,
            revision: 0,
            updated_at: Utc::now(),
        }
    }

    /// Create a session from an order projection
    pub fn from_order(order: &Order) -> Self {
        Self::new(order.id.clone(), order.status, order.destination)
    }

    /// Check if the order has finished
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Step indicator for the current status
    pub fn steps(&self) -> Vec<StatusStep> {
        status_steps(self.status, Some(self.last_active_status))
    }

    /// ETA and distance as last computed
    pub fn eta(&self) -> EtaEstimate {
        EtaEstimate {
            eta_minutes: self.eta_minutes,
            distance_km: self.distance_km,
        }
    }

    /// Move to `to` if the lifecycle allows it
    pub fn apply_transition(&mut self, to: OrderStatus) -> Result<StatusChange, TrackingError> {
        let from = self.status;
        if !can_transition(from, to) {
            return Err(TrackingError::invalid_transition(from, to));
        }

        self.status = to;
        if to != OrderStatus::Cancelled {
            self.last_active_status = to;
        }
        if to.is_terminal() {
            self.eta_minutes = None;
        }
        if to == OrderStatus::Delivered {
            self.progress_percent = Some(100.0);
            self.distance_km = Some(0.0);
            if let Some(dest) = self.destination {
                self.current_position = Some(dest);
            }
        }
        self.touch();

        Ok(StatusChange { from, to })
    }

    /// Apply a position report from either producer
    ///
    /// Validation happens before any field changes, so an error leaves the
    /// session exactly as it was. Returns the status change the update
    /// carried, if any.
    pub fn apply_position(
        &mut self,
        update: &PositionUpdate,
        model: &SpeedModel,
    ) -> Result<Option<StatusChange>, TrackingError> {
        if self.is_terminal() {
            return Err(TrackingError::SessionClosed);
        }

        let change = match update.status {
            Some(to) if to != self.status => {
                if !can_transition(self.status, to) {
                    return Err(TrackingError::invalid_transition(self.status, to));
                }
                Some(StatusChange {
                    from: self.status,
                    to,
                })
            }
            _ => None,
        };

        if let Some(change) = change {
            self.apply_transition(change.to)?;
            if change.is_terminal() {
                return Ok(Some(change));
            }
        }

        if self.route_origin.is_none() {
            self.route_origin = Some(update.position);
        }
        self.current_position = Some(update.position);
        self.connection_quality = update.source.into();

        if let Some(text) = &update.status_text {
            self.status_text = Some(text.clone());
        }
        if let Some(driver) = &update.driver {
            self.driver = Some(driver.clone());
        }

        let est = match self.destination {
            Some(dest) => estimate(self.current_position, dest, self.status, model),
            None => EtaEstimate::UNKNOWN,
        };
        self.distance_km = est.distance_km;
        self.eta_minutes = update.eta_minutes.or(est.eta_minutes);

        let candidate = update.progress.or_else(|| self.geometric_progress());
        if let Some(p) = candidate {
            let floor = self.progress_percent.unwrap_or(0.0);
            self.progress_percent = Some(p.clamp(0.0, 100.0).max(floor));
        }

        self.touch();
        Ok(change)
    }

    /// Mark the order delivered after a `delivery_complete` message
    pub fn complete_delivery(&mut self) -> Result<Option<StatusChange>, TrackingError> {
        if self.status == OrderStatus::Delivered {
            return Ok(None);
        }
        self.apply_transition(OrderStatus::Delivered).map(Some)
    }

    /// Set the connection quality flag
    pub fn set_quality(&mut self, quality: ConnectionQuality) -> bool {
        if self.connection_quality == quality {
            return false;
        }
        self.connection_quality = quality;
        self.touch();
        true
    }

    /// Progress from the remaining distance along the route
    fn geometric_progress(&self) -> Option<f64> {
        let (origin, dest, current) = (self.route_origin?, self.destination?, self.current_position?);
        let total = origin.distance_km(&dest);
        if total == 0.0 {
            return Some(100.0);
        }
        let remaining = current.distance_km(&dest);
        Some(((1.0 - remaining / total) * 100.0).clamp(0.0, 100.0))
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.updated_at = Utc::now();
    }
}
