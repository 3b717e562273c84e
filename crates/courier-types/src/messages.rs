//! Tracking feed messages
//!
//! The backend pushes JSON objects tagged by `type`:
//!
//! ```json
//! {"type": "location_update", "order_id": "ord-1", "status": "in_transit",
//!  "location": {"lat": 19.08, "lng": 72.88}, "eta_minutes": 12, "progress": 40.0,
//!  "driver": {"name": "...", "phone": "...", "rating": 4.8, "vehicle": "..."}}
//! {"type": "delivery_complete", "order_id": "ord-1"}
//! ```

use crate::{Driver, GeoPoint, OrderStatus, TrackingError};
use serde::{Deserialize, Serialize};

/// Raw `location_update` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdate {
    /// Order the update belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    /// Feed status string (may be a courier sub-status)
    pub status: String,
    /// Human-readable status line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    /// Driver position
    pub location: GeoPoint,
    /// Server-side ETA estimate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_minutes: Option<u32>,
    /// Server-side progress (0-100)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    /// Driver details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<Driver>,
    /// Server timestamp (ISO 8601)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Raw `delivery_complete` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryComplete {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Parsed tracking feed message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage {
    /// Driver moved
    LocationUpdate(LocationUpdate),
    /// Order handed over
    DeliveryComplete(DeliveryComplete),
}

impl FeedMessage {
    /// Parse and validate a feed message
    ///
    /// Fails with [`TrackingError::MalformedMessage`] when the JSON does not
    /// parse, the `type` is unknown, the status is unrecognised, the
    /// coordinates are out of range, or progress lies outside 0-100.
    pub fn parse(json: &str) -> Result<Self, TrackingError> {
        let msg: FeedMessage = serde_json::from_str(json)
            .map_err(|e| TrackingError::malformed(e.to_string(), json))?;

        if let FeedMessage::LocationUpdate(update) = &msg {
            if OrderStatus::from_wire(&update.status).is_none() {
                return Err(TrackingError::malformed(
                    format!("unknown status '{}'", update.status),
                    json,
                ));
            }
            if !update.location.is_valid() {
                return Err(TrackingError::malformed(
                    format!("invalid location {}", update.location),
                    json,
                ));
            }
            if let Some(p) = update.progress {
                if !(0.0..=100.0).contains(&p) {
                    return Err(TrackingError::malformed(
                        format!("progress {} out of range", p),
                        json,
                    ));
                }
            }
        }

        Ok(msg)
    }

    /// Order id carried by the message, if any
    pub fn order_id(&self) -> Option<&str> {
        match self {
            Self::LocationUpdate(u) => u.order_id.as_deref(),
            Self::DeliveryComplete(d) => d.order_id.as_deref(),
        }
    }

    /// Check if this message ends tracking
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::DeliveryComplete(_))
    }
}

impl LocationUpdate {
    /// Create an update at `location` with the given feed status
    pub fn new(status: OrderStatus, location: GeoPoint) -> Self {
        Self {
            order_id: None,
            status: status.as_str().to_string(),
            status_text: None,
            location,
            eta_minutes: None,
            progress: None,
            driver: None,
            timestamp: None,
        }
    }

    /// Parsed status; validated by [`FeedMessage::parse`]
    pub fn order_status(&self) -> Option<OrderStatus> {
        OrderStatus::from_wire(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_location_update() {
        let json = r#"{
            "type": "location_update",
            "order_id": "ord-1",
            "status": "out_for_delivery",
            "location": {"lat": 19.08, "lng": 72.88},
            "eta_minutes": 12,
            "progress": 40,
            "driver": {"name": "Rajesh", "phone": "+91 98", "rating": 4.8, "vehicle": "Pulsar"}
        }"#;

        match FeedMessage::parse(json).unwrap() {
            FeedMessage::LocationUpdate(u) => {
                assert_eq!(u.order_status(), Some(OrderStatus::OutForDelivery));
                assert_eq!(u.location, GeoPoint::new(19.08, 72.88));
                assert_eq!(u.eta_minutes, Some(12));
                assert_eq!(u.progress, Some(40.0));
                assert_eq!(u.driver.unwrap().name, "Rajesh");
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_parse_delivery_complete() {
        let msg = FeedMessage::parse(r#"{"type":"delivery_complete","order_id":"ord-1"}"#).unwrap();
        assert!(msg.is_terminal());
        assert_eq!(msg.order_id(), Some("ord-1"));
    }

    #[test]
    fn test_malformed_messages() {
        let cases = [
            "not json",
            r#"{"type":"teleport"}"#,
            r#"{"type":"location_update","status":"out_for_delivery"}"#,
            r#"{"type":"location_update","status":"flying","location":{"lat":1,"lng":1}}"#,
            r#"{"type":"location_update","status":"packed","location":{"lat":120,"lng":1}}"#,
            r#"{"type":"location_update","status":"packed","location":{"lat":1,"lng":1},"progress":140}"#,
        ];
        for raw in cases {
            let err = FeedMessage::parse(raw).unwrap_err();
            assert!(
                matches!(err, TrackingError::MalformedMessage { .. }),
                "{} gave {:?}",
                raw,
                err
            );
        }
    }
}
