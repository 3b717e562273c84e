//! REST implementation of [`OrderApi`]
//!
//! Talks to the order backend's `/api/orders` routes with an optional bearer
//! token.

use crate::api::{ApiError, ApiResult, OrderApi};
use async_trait::async_trait;
use courier_types::{DeliveryAddress, Order, OrderFilter, OrderItem, OrderStatus};
use courier_ws::Endpoint;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Default request timeout
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Longest error body kept in [`ApiError::Status`]
const MAX_ERROR_BODY: usize = 512;

/// Settings for [`RestOrderApi`]
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Backend base URL, e.g. `http://localhost:8000`
    pub base_url: String,
    /// Bearer token sent with every request
    pub token: Option<String>,
    /// Payment mode sent when placing orders
    pub payment_mode: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            token: None,
            payment_mode: "cod".into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl RestConfig {
    /// Config for a backend base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    /// HTTP config for the backend serving a tracking endpoint
    pub fn for_endpoint(endpoint: &Endpoint) -> Self {
        let base = endpoint.base();
        let http = if let Some(rest) = base.strip_prefix("wss://") {
            format!("https://{rest}")
        } else if let Some(rest) = base.strip_prefix("ws://") {
            format!("http://{rest}")
        } else {
            base.to_string()
        };
        Self::new(http)
    }

    /// Set the bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the payment mode used for new orders
    pub fn with_payment_mode(mut self, mode: impl Into<String>) -> Self {
        self.payment_mode = mode.into();
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    items: &'a [OrderItem],
    payment_mode: &'a str,
    delivery_address: &'a DeliveryAddress,
}

#[derive(Deserialize)]
struct CreateOrderResponse {
    order: Order,
}

#[derive(Deserialize)]
struct UpdateStatusResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

/// Order API backed by the HTTP backend
#[derive(Debug, Clone)]
pub struct RestOrderApi {
    http_client: Client,
    config: RestConfig,
}

impl RestOrderApi {
    /// Create a client for the given config
    pub fn new(config: RestConfig) -> ApiResult<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("courier-sdk/", env!("CARGO_PKG_VERSION")))
            .build()?;

        info!(base_url = %config.base_url, "Created order REST client");

        Ok(Self {
            http_client,
            config,
        })
    }

    /// Base URL of the backend
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.config.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Turn a non-success response into an error
async fn check(response: Response, order_id: Option<&str>) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        if let Some(id) = order_id {
            return Err(ApiError::NotFound(id.to_string()));
        }
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl OrderApi for RestOrderApi {
    #[instrument(skip(self, items, address), fields(items = items.len()))]
    async fn create_order(
        &self,
        items: Vec<OrderItem>,
        address: DeliveryAddress,
    ) -> ApiResult<Order> {
        let body = CreateOrderRequest {
            items: &items,
            payment_mode: &self.config.payment_mode,
            delivery_address: &address,
        };

        let response = self
            .authorize(self.http_client.post(self.url("/orders")))
            .json(&body)
            .send()
            .await?;
        let created: CreateOrderResponse = check(response, None).await?.json().await?;

        debug!(order_id = %created.order.id, "Order created");
        Ok(created.order)
    }

    #[instrument(skip(self))]
    async fn list_orders(&self, filter: &OrderFilter) -> ApiResult<Vec<Order>> {
        let mut request = self.authorize(self.http_client.get(self.url("/orders")));
        if let Some(status) = filter.status {
            request = request.query(&[("status", status.as_str())]);
        }

        let response = request.send().await?;
        let orders: Vec<Order> = check(response, None).await?.json().await?;

        debug!(count = orders.len(), "Orders listed");
        Ok(orders)
    }

    #[instrument(skip(self))]
    async fn get_order(&self, order_id: &str) -> ApiResult<Order> {
        let path = format!("/orders/{order_id}");
        let response = self
            .authorize(self.http_client.get(self.url(&path)))
            .send()
            .await?;
        Ok(check(response, Some(order_id)).await?.json().await?)
    }

    /// The backend only acknowledges the change, so the order is re-read
    #[instrument(skip(self))]
    async fn update_order_status(&self, order_id: &str, status: OrderStatus) -> ApiResult<Order> {
        let path = format!("/orders/{order_id}/status");
        let response = self
            .authorize(self.http_client.patch(self.url(&path)))
            .query(&[("status", status.as_str())])
            .send()
            .await?;
        let reply: UpdateStatusResponse = check(response, Some(order_id)).await?.json().await?;

        if !reply.success {
            return Err(ApiError::Rejected(
                reply.message.unwrap_or_else(|| "status update refused".into()),
            ));
        }
        debug!(order_id, %status, "Order status updated");
        self.get_order(order_id).await
    }
}
