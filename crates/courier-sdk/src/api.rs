//! Order backend collaborator
//!
//! The tracking client needs a handful of calls from the order backend:
//! placing an order, reading orders and moving an order to a new status.
//! [`OrderApi`] abstracts those so the client can run against the REST
//! backend or an in-process store.

use async_trait::async_trait;
use courier_types::{DeliveryAddress, Order, OrderFilter, OrderItem, OrderStatus};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Errors returned by an [`OrderApi`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Request could not be sent or the connection failed
    #[error("HTTP error: {0}")]
    Http(String),

    /// Backend answered with a non-success status code
    #[error("Backend returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// Response body did not match the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Order does not exist
    #[error("Order not found: {0}")]
    NotFound(String),

    /// Backend refused the request
    #[error("Request rejected: {0}")]
    Rejected(String),
}

impl ApiError {
    /// Whether retrying the same request could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Http(_) => true,
            ApiError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(feature = "rest")]
impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Parse(err.to_string())
        } else {
            ApiError::Http(err.to_string())
        }
    }
}

/// Result type for order API calls
pub type ApiResult<T> = Result<T, ApiError>;

/// Order backend operations used by the tracking client
#[async_trait]
pub trait OrderApi: Send + Sync {
    /// Place a new order
    async fn create_order(
        &self,
        items: Vec<OrderItem>,
        address: DeliveryAddress,
    ) -> ApiResult<Order>;

    /// List orders, newest first
    async fn list_orders(&self, filter: &OrderFilter) -> ApiResult<Vec<Order>>;

    /// Fetch one order
    async fn get_order(&self, order_id: &str) -> ApiResult<Order>;

    /// Move an order to a new status, returning the updated order
    async fn update_order_status(&self, order_id: &str, status: OrderStatus) -> ApiResult<Order>;
}

/// In-process order store
///
/// Useful for demos and tests. Status updates are accepted as-is, the same
/// as the backend; lifecycle rules are enforced by the tracking client.
#[derive(Debug, Default)]
pub struct InMemoryOrderApi {
    orders: DashMap<String, Order>,
    next_id: AtomicU64,
}

impl InMemoryOrderApi {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with an existing order
    pub fn insert(&self, order: Order) {
        self.orders.insert(order.id.clone(), order);
    }

    /// Look up an order by id
    pub fn get(&self, order_id: &str) -> Option<Order> {
        self.orders.get(order_id).map(|o| o.clone())
    }

    /// Number of stored orders
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[async_trait]
impl OrderApi for InMemoryOrderApi {
    async fn create_order(
        &self,
        items: Vec<OrderItem>,
        address: DeliveryAddress,
    ) -> ApiResult<Order> {
        if items.is_empty() {
            return Err(ApiError::Rejected("order has no items".into()));
        }

        let seq = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut order = Order::new(format!("ord-{seq}"), items);
        order.destination = address.location;
        self.insert(order.clone());
        Ok(order)
    }

    async fn list_orders(&self, filter: &OrderFilter) -> ApiResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| filter.matches(o.value()))
            .map(|o| o.value().clone())
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn get_order(&self, order_id: &str) -> ApiResult<Order> {
        self.get(order_id)
            .ok_or_else(|| ApiError::NotFound(order_id.to_string()))
    }

    async fn update_order_status(&self, order_id: &str, status: OrderStatus) -> ApiResult<Order> {
        let mut order = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| ApiError::NotFound(order_id.to_string()))?;
        order.status = status;
        Ok(order.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_types::GeoPoint;
    use rust_decimal_macros::dec;

    fn address() -> DeliveryAddress {
        DeliveryAddress {
            line: "12 Hill Road, Bandra".into(),
            location: Some(GeoPoint::new(19.0544, 72.8402)),
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let api = InMemoryOrderApi::new();
        let order = api
            .create_order(vec![OrderItem::new("p1", "Tea 500g", 3, dec!(150))], address())
            .await
            .unwrap();

        assert_eq!(order.id, "ord-1");
        assert_eq!(order.status, OrderStatus::Placed);
        assert_eq!(order.total_amount, dec!(450));
        assert_eq!(order.destination, Some(GeoPoint::new(19.0544, 72.8402)));

        let all = api.list_orders(&OrderFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        let packed = api
            .list_orders(&OrderFilter::status(OrderStatus::Packed))
            .await
            .unwrap();
        assert!(packed.is_empty());
    }

    #[tokio::test]
    async fn test_empty_order_rejected() {
        let api = InMemoryOrderApi::new();
        let err = api.create_order(vec![], address()).await.unwrap_err();
        assert!(matches!(err, ApiError::Rejected(_)));
        assert!(api.is_empty());
    }

    #[tokio::test]
    async fn test_update_status() {
        let api = InMemoryOrderApi::new();
        api.insert(Order::new("ord-7", vec![]));

        let updated = api
            .update_order_status("ord-7", OrderStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Confirmed);
        assert_eq!(
            api.get_order("ord-7").await.unwrap().status,
            OrderStatus::Confirmed
        );

        let err = api
            .update_order_status("missing", OrderStatus::Packed)
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::NotFound("missing".into()));
    }

    #[test]
    fn test_retryable() {
        assert!(ApiError::Http("reset".into()).is_retryable());
        assert!(ApiError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(!ApiError::Status { status: 404, body: String::new() }.is_retryable());
        assert!(!ApiError::Parse("x".into()).is_retryable());
    }
}
