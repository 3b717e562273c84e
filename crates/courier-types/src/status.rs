//! Order lifecycle status and the transition rules every dashboard shares
//!
//! # Lifecycle
//!
//! ```text
//! ┌────────┐   ┌───────────┐   ┌────────┐   ┌──────────────────┐   ┌───────────┐
//! │ Placed │──►│ Confirmed │──►│ Packed │──►│  OutForDelivery  │──►│ Delivered │
//! └───┬────┘   └─────┬─────┘   └───┬────┘   └────────┬─────────┘   └───────────┘
//!     │              │             │                 │
//!     └──────────────┴─────────────┴─────────────────┴──────► Cancelled
//! ```
//!
//! Forward skips are allowed (a courier may report `delivered` straight from
//! `packed`). Moving backward, or leaving a terminal state, is not.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order placed by the customer
    Placed,
    /// Accepted by the retailer
    Confirmed,
    /// Packed and waiting for pickup
    Packed,
    /// Picked up by a driver and on the road
    OutForDelivery,
    /// Handed over to the customer
    Delivered,
    /// Cancelled before delivery
    Cancelled,
}

impl OrderStatus {
    /// All statuses in lifecycle order, cancellation last
    pub const ALL: [OrderStatus; 6] = [
        Self::Placed,
        Self::Confirmed,
        Self::Packed,
        Self::OutForDelivery,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// The linear delivery path shown by step indicators
    pub const DELIVERY_PATH: [OrderStatus; 5] = [
        Self::Placed,
        Self::Confirmed,
        Self::Packed,
        Self::OutForDelivery,
        Self::Delivered,
    ];

    /// Returns the status name as used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Placed => "placed",
            Self::Confirmed => "confirmed",
            Self::Packed => "packed",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Human-readable label for badges
    pub fn label(&self) -> &'static str {
        match self {
            Self::Placed => "Placed",
            Self::Confirmed => "Confirmed",
            Self::Packed => "Packed",
            Self::OutForDelivery => "Out for Delivery",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Position on the delivery path, `None` for `Cancelled`
    pub fn step_index(&self) -> Option<usize> {
        Self::DELIVERY_PATH.iter().position(|s| s == self)
    }

    /// Check if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Check if a driver is on the road for this order
    pub fn is_in_transit(&self) -> bool {
        matches!(self, Self::OutForDelivery)
    }

    /// Parse a feed status string
    ///
    /// Besides the canonical names this accepts the courier sub-statuses the
    /// tracking feed reports while a driver is moving (`picked_up`,
    /// `in_transit`, `arriving`, `dispatched`), all of which mean
    /// [`OrderStatus::OutForDelivery`].
    pub fn from_wire(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "placed" | "pending" => Some(Self::Placed),
            "confirmed" => Some(Self::Confirmed),
            "packed" => Some(Self::Packed),
            "out_for_delivery" | "dispatched" | "picked_up" | "in_transit" | "arriving" => {
                Some(Self::OutForDelivery)
            }
            "delivered" => Some(Self::Delivered),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Check whether `self -> to` is a legal transition
    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        can_transition(*self, to)
    }
}

/// Check whether an order may move from `from` to `to`
///
/// Pure and total: terminal states accept nothing, `Cancelled` is reachable
/// from every non-terminal state, and otherwise the target must lie strictly
/// later on the delivery path.
pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    if from.is_terminal() {
        return false;
    }
    if to == OrderStatus::Cancelled {
        return true;
    }
    match (from.step_index(), to.step_index()) {
        (Some(a), Some(b)) => b > a,
        _ => false,
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a status string is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct StatusParseError(pub String);

impl FromStr for OrderStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wire(s).ok_or_else(|| StatusParseError(s.to_string()))
    }
}

/// One entry of the multi-step progress indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusStep {
    /// Status this step represents
    pub status: OrderStatus,
    /// Step already completed
    pub done: bool,
    /// Step the order is currently in
    pub current: bool,
}

/// Build the step indicator for an order in `status`
///
/// A cancelled order has no current step; only the steps it had already
/// passed are shown as done, and `last_reached` tells which one that was.
pub fn status_steps(status: OrderStatus, last_reached: Option<OrderStatus>) -> Vec<StatusStep> {
    let reached = match status {
        OrderStatus::Cancelled => last_reached.and_then(|s| s.step_index()),
        other => other.step_index(),
    };
    let cancelled = status == OrderStatus::Cancelled;

    OrderStatus::DELIVERY_PATH
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let done = match reached {
                Some(r) if cancelled => i <= r,
                Some(r) => i < r || (i == r && status == OrderStatus::Delivered),
                None => false,
            };
            StatusStep {
                status: *s,
                done,
                current: !cancelled && Some(i) == reached && !done,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_lattice() {
        use OrderStatus::*;

        let allowed = [
            (Placed, Confirmed),
            (Placed, Packed),
            (Placed, OutForDelivery),
            (Placed, Delivered),
            (Placed, Cancelled),
            (Confirmed, Packed),
            (Confirmed, OutForDelivery),
            (Confirmed, Delivered),
            (Confirmed, Cancelled),
            (Packed, OutForDelivery),
            (Packed, Delivered),
            (Packed, Cancelled),
            (OutForDelivery, Delivered),
            (OutForDelivery, Cancelled),
        ];

        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                let expected = allowed.contains(&(from, to));
                assert_eq!(
                    can_transition(from, to),
                    expected,
                    "{} -> {} should be {}",
                    from,
                    to,
                    expected
                );
            }
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::OutForDelivery.is_terminal());
    }

    #[test]
    fn test_wire_parsing() {
        assert_eq!(OrderStatus::from_wire("in_transit"), Some(OrderStatus::OutForDelivery));
        assert_eq!(OrderStatus::from_wire("Picked_Up"), Some(OrderStatus::OutForDelivery));
        assert_eq!(OrderStatus::from_wire("canceled"), Some(OrderStatus::Cancelled));
        assert_eq!(OrderStatus::from_wire("returned"), None);
        assert!("bogus".parse::<OrderStatus>().is_err());
        assert_eq!("packed".parse::<OrderStatus>(), Ok(OrderStatus::Packed));
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&OrderStatus::OutForDelivery).unwrap();
        assert_eq!(json, "\"out_for_delivery\"");
    }

    #[test]
    fn test_status_steps_in_progress() {
        let steps = status_steps(OrderStatus::Packed, None);
        assert_eq!(steps.len(), 5);
        assert!(steps[0].done && steps[1].done);
        assert!(!steps[2].done && steps[2].current);
        assert!(!steps[3].done && !steps[3].current);
    }

    #[test]
    fn test_status_steps_delivered_and_cancelled() {
        let delivered = status_steps(OrderStatus::Delivered, None);
        assert!(delivered.iter().all(|s| s.done && !s.current));

        let cancelled = status_steps(OrderStatus::Cancelled, Some(OrderStatus::Confirmed));
        assert!(cancelled[0].done && cancelled[1].done);
        assert!(!cancelled[2].done);
        assert!(cancelled.iter().all(|s| !s.current));
    }
}
