//! Order projection and driver details

use crate::{GeoPoint, OrderStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Delivery partner assigned to an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    /// Display name
    pub name: String,
    /// Contact number
    pub phone: String,
    /// Average rating (0-5)
    #[serde(default)]
    pub rating: f64,
    /// Vehicle descriptor, e.g. model and plate
    #[serde(default)]
    pub vehicle: String,
}

/// One line of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub price: Decimal,
    pub total: Decimal,
}

impl OrderItem {
    /// Create an item, computing the line total
    pub fn new(
        product_id: impl Into<String>,
        product_name: impl Into<String>,
        quantity: u32,
        price: Decimal,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            quantity,
            price,
            total: price * Decimal::from(quantity),
        }
    }
}

/// Delivery address handed to the order API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    /// Free-form address text
    pub line: String,
    /// Coordinates, when the address was geocoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

/// Read-mostly projection of a backend order
///
/// The backend keeps coordinates inside `delivery_address`; those fill
/// `destination` when no top-level value is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "OrderWire")]
pub struct Order {
    /// Order identifier
    pub id: String,
    /// Ordered items
    #[serde(default)]
    pub items: Vec<OrderItem>,
    /// Grand total
    pub total_amount: Decimal,
    /// Current lifecycle status
    #[serde(rename = "order_status")]
    pub status: OrderStatus,
    /// Delivery coordinates, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<GeoPoint>,
    /// Assigned delivery agent reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_driver: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct OrderWire {
    id: String,
    #[serde(default)]
    items: Vec<OrderItem>,
    total_amount: Decimal,
    order_status: OrderStatus,
    #[serde(default)]
    destination: Option<GeoPoint>,
    #[serde(default)]
    delivery_address: Option<AddressWire>,
    #[serde(default)]
    assigned_driver: Option<String>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    created_at: DateTime<Utc>,
}

/// Only the coordinates matter here; the rest of the address is free-form
#[derive(Deserialize)]
struct AddressWire {
    #[serde(default)]
    location: Option<GeoPoint>,
}

impl From<OrderWire> for Order {
    fn from(wire: OrderWire) -> Self {
        let destination = wire
            .destination
            .or_else(|| wire.delivery_address.and_then(|a| a.location));
        Self {
            id: wire.id,
            items: wire.items,
            total_amount: wire.total_amount,
            status: wire.order_status,
            destination,
            assigned_driver: wire.assigned_driver,
            created_at: wire.created_at,
        }
    }
}

impl Order {
    /// Create a freshly placed order
    pub fn new(id: impl Into<String>, items: Vec<OrderItem>) -> Self {
        let total_amount = items.iter().map(|i| i.total).sum();
        Self {
            id: id.into(),
            items,
            total_amount,
            status: OrderStatus::Placed,
            destination: None,
            assigned_driver: None,
            created_at: Utc::now(),
        }
    }

    /// Set the delivery coordinates
    pub fn with_destination(mut self, destination: GeoPoint) -> Self {
        self.destination = Some(destination);
        self
    }

    /// Set the status
    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = status;
        self
    }
}

/// Filter for listing orders
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    /// Only orders in this status
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    /// Filter by status
    pub fn status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
        }
    }

    /// Check whether an order passes the filter
    pub fn matches(&self, order: &Order) -> bool {
        self.status.map(|s| s == order.status).unwrap_or(true)
    }
}

/// Backend timestamps may come without an offset; those are read as UTC
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de, Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_total() {
        let order = Order::new(
            "ord-1",
            vec![
                OrderItem::new("p1", "Rice 5kg", 2, dec!(320.50)),
                OrderItem::new("p2", "Oil 1L", 1, dec!(180)),
            ],
        );
        assert_eq!(order.total_amount, dec!(821.00));
        assert_eq!(order.status, OrderStatus::Placed);
    }

    #[test]
    fn test_order_deserialize_backend_shape() {
        let json = r#"{
            "id": "ord-9",
            "total_amount": "99.50",
            "order_status": "packed",
            "created_at": "2025-01-10T08:30:00Z"
        }"#;
        let order: Order = serde_json::from_str(json).unwrap();
        assert_eq!(order.status, OrderStatus::Packed);
        assert!(order.items.is_empty());
        assert!(order.destination.is_none());
    }

    #[test]
    fn test_order_naive_timestamp() {
        let json = r#"{
            "id": "ord-10",
            "total_amount": 120.0,
            "order_status": "placed",
            "created_at": "2025-01-10T08:30:00.123456"
        }"#;
        let order: Order = serde_json::from_str(json).unwrap();
        assert_eq!(order.created_at.to_rfc3339(), "2025-01-10T08:30:00.123456+00:00");

        let bad = json.replace("2025-01-10T08:30:00.123456", "yesterday");
        assert!(serde_json::from_str::<Order>(&bad).is_err());
    }

    #[test]
    fn test_destination_from_delivery_address() {
        let json = r#"{
            "id": "ord-11",
            "total_amount": 272.0,
            "order_status": "out_for_delivery",
            "created_at": "2025-01-10T08:30:00",
            "delivery_address": {
                "line": "3 Carter Road",
                "pincode": "400050",
                "location": {"lat": 19.1136, "lng": 72.8697}
            }
        }"#;
        let order: Order = serde_json::from_str(json).unwrap();
        assert_eq!(order.destination, Some(GeoPoint::new(19.1136, 72.8697)));

        // A top-level destination wins
        let explicit = json.replace(
            r#""delivery_address""#,
            r#""destination": {"lat": 19.0, "lng": 72.8}, "delivery_address""#,
        );
        let order: Order = serde_json::from_str(&explicit).unwrap();
        assert_eq!(order.destination, Some(GeoPoint::new(19.0, 72.8)));

        // Addresses without coordinates leave it unknown
        let plain = json.replace(r#""location": {"lat": 19.1136, "lng": 72.8697}"#, r#""city": "Mumbai""#);
        let order: Order = serde_json::from_str(&plain).unwrap();
        assert!(order.destination.is_none());
    }

    #[test]
    fn test_filter() {
        let order = Order::new("a", vec![]).with_status(OrderStatus::Packed);
        assert!(OrderFilter::default().matches(&order));
        assert!(OrderFilter::status(OrderStatus::Packed).matches(&order));
        assert!(!OrderFilter::status(OrderStatus::Delivered).matches(&order));
    }
}
