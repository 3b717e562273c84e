//! Remaining-time estimation
//!
//! A pure function of its inputs: great-circle distance divided by an
//! effective speed. The estimator never schedules itself; callers recompute
//! on every position update.

use courier_types::{GeoPoint, OrderStatus};
use serde::{Deserialize, Serialize};

/// Default city speed for two-wheeler deliveries
pub const DEFAULT_SPEED_KMH: f64 = 20.0;

/// Speed and traffic model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedModel {
    /// Free-flow speed in km/h
    pub speed_kmh: f64,
    /// Congestion multiplier applied to travel time (1.0 = free flow)
    pub traffic_factor: f64,
}

impl Default for SpeedModel {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
            traffic_factor: 1.0,
        }
    }
}

impl SpeedModel {
    /// Create a model with the given speed and no congestion
    pub fn new(speed_kmh: f64) -> Self {
        Self {
            speed_kmh,
            ..Default::default()
        }
    }

    /// Set the traffic factor
    pub fn with_traffic(mut self, factor: f64) -> Self {
        self.traffic_factor = factor;
        self
    }

    /// Effective speed after congestion, never below 1 km/h
    pub fn effective_speed_kmh(&self) -> f64 {
        let factor = if self.traffic_factor.is_finite() && self.traffic_factor > 0.0 {
            self.traffic_factor
        } else {
            1.0
        };
        (self.speed_kmh / factor).max(1.0)
    }
}

/// Result of an estimate
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EtaEstimate {
    /// Minutes until arrival
    pub eta_minutes: Option<u32>,
    /// Remaining great-circle distance
    pub distance_km: Option<f64>,
}

impl EtaEstimate {
    /// Estimate with no data
    pub const UNKNOWN: EtaEstimate = EtaEstimate {
        eta_minutes: None,
        distance_km: None,
    };
}

/// Estimate remaining time from `current` to `destination`
///
/// Returns [`EtaEstimate::UNKNOWN`] when `current` is absent or the order is
/// already finished. While `out_for_delivery`, any non-zero distance yields at
/// least one minute.
pub fn estimate(
    current: Option<GeoPoint>,
    destination: GeoPoint,
    status: OrderStatus,
    model: &SpeedModel,
) -> EtaEstimate {
    let Some(current) = current else {
        return EtaEstimate::UNKNOWN;
    };
    if status.is_terminal() {
        return EtaEstimate::UNKNOWN;
    }

    let distance_km = current.distance_km(&destination);
    let mut minutes = (distance_km / model.effective_speed_kmh() * 60.0).round() as u32;
    if distance_km > 0.0 && status == OrderStatus::OutForDelivery {
        minutes = minutes.max(1);
    }

    EtaEstimate {
        eta_minutes: Some(minutes),
        distance_km: Some(distance_km),
    }
}
