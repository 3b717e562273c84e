//! Tracking client tests against mock feeds and the in-memory order store

use async_trait::async_trait;
use courier_sdk::prelude::*;
use courier_ws::transport::{MockFeed, MockTransport};
use courier_ws::Transport;
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

const DEST: GeoPoint = GeoPoint::new(19.1136, 72.8697);

type Feeds = Arc<Mutex<HashMap<String, MockFeed>>>;

struct Harness {
    client: TrackingClient,
    api: Arc<InMemoryOrderApi>,
    feeds: Feeds,
    notified: Arc<Mutex<Vec<(String, OrderStatus)>>>,
}

impl Harness {
    fn feed(&self, order_id: &str) -> MockFeed {
        let url = self.client.endpoint().tracking_url(order_id);
        self.feeds.lock().get(&url).cloned().unwrap()
    }
}

struct RecordingNotifier(Arc<Mutex<Vec<(String, OrderStatus)>>>);

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn order_finished(&self, order_id: &str, status: OrderStatus) {
        self.0.lock().push((order_id.to_string(), status));
    }
}

struct FailingApi;

#[async_trait]
impl OrderApi for FailingApi {
    async fn create_order(
        &self,
        _items: Vec<OrderItem>,
        _address: DeliveryAddress,
    ) -> Result<Order, ApiError> {
        Err(ApiError::Http("connection refused".into()))
    }

    async fn list_orders(&self, _filter: &OrderFilter) -> Result<Vec<Order>, ApiError> {
        Err(ApiError::Http("connection refused".into()))
    }

    async fn get_order(&self, id: &str) -> Result<Order, ApiError> {
        Err(ApiError::NotFound(id.to_string()))
    }

    async fn update_order_status(&self, _id: &str, _status: OrderStatus) -> Result<Order, ApiError> {
        Err(ApiError::Status {
            status: 503,
            body: "maintenance".into(),
        })
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn mock_factory(builder: TrackingClientBuilder, reachable: bool, feeds: Feeds) -> TrackingClientBuilder {
    builder.with_transport_factory(move |url: &str| {
        let (transport, feed) = if reachable {
            MockTransport::new(url)
        } else {
            MockTransport::unreachable(url)
        };
        feeds.lock().insert(url.to_string(), feed);
        Box::new(transport) as Box<dyn Transport>
    })
}

fn harness(reachable: bool) -> Harness {
    init_tracing();
    let api = Arc::new(InMemoryOrderApi::new());
    let feeds: Feeds = Arc::default();
    let notified = Arc::new(Mutex::new(Vec::new()));

    let builder = TrackingClient::builder("ws://mock.test")
        .with_reconnect(ReconnectConfig::default().with_jitter(0.0))
        .with_order_api(api.clone())
        .with_notifier(Arc::new(RecordingNotifier(notified.clone())));
    let client = mock_factory(builder, reachable, feeds.clone()).build().unwrap();

    Harness {
        client,
        api,
        feeds,
        notified,
    }
}

fn order(id: &str, status: OrderStatus) -> Order {
    Order::new(id, vec![OrderItem::new("p1", "Atta 10kg", 1, dec!(420))])
        .with_status(status)
        .with_destination(DEST)
}

#[tokio::test(start_paused = true)]
async fn test_track_reuses_running_manager() {
    let h = harness(false);
    let order = order("ord-1", OrderStatus::Packed);

    let first = h.client.track(&order);
    let second = h.client.track(&order);
    first.wait_for_state(ManagerState::SimulatedFallback).await;

    assert_eq!(h.feeds.lock().len(), 1);
    assert_eq!(second.state(), ManagerState::SimulatedFallback);
    assert_eq!(h.client.tracked_orders(), vec!["ord-1".to_string()]);
    assert_eq!(h.client.state("ord-1"), Some(ManagerState::SimulatedFallback));
}

#[tokio::test(start_paused = true)]
async fn test_simulated_snapshots_reach_subscribers() {
    let h = harness(false);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _sub = h.client.subscribe("ord-2", move |s| sink.lock().push(s.clone()));

    h.client.track(&order("ord-2", OrderStatus::OutForDelivery));
    sleep(Duration::from_millis(2100)).await;

    let seen = seen.lock();
    let last = seen.last().unwrap();
    assert_eq!(last.connection_quality, ConnectionQuality::Simulated);
    assert!(last.eta_minutes.unwrap() > 0);
    assert!(last.current_position.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_live_feed_through_client() {
    let h = harness(true);
    let handle = h.client.track(&order("ord-3", OrderStatus::OutForDelivery));

    h.feed("ord-3").push_message(
        serde_json::json!({
            "type": "location_update",
            "status": "out_for_delivery",
            "location": {"lat": 19.08, "lng": 72.88},
            "eta_minutes": 12,
            "progress": 40,
        })
        .to_string(),
    );
    handle.wait_for_state(ManagerState::Live).await;

    let snapshot = h.client.snapshot("ord-3").unwrap();
    assert_eq!(snapshot.connection_quality, ConnectionQuality::Live);
    assert_eq!(snapshot.eta_minutes, Some(12));
    assert_eq!(snapshot.progress_percent, Some(40.0));
}

#[tokio::test(start_paused = true)]
async fn test_update_status_applies_and_persists() {
    let h = harness(false);
    let order = order("ord-4", OrderStatus::Packed);
    h.api.insert(order.clone());

    let statuses = Arc::new(Mutex::new(Vec::new()));
    let sink = statuses.clone();
    let _sub = h.client.subscribe("ord-4", move |s| sink.lock().push(s.status));

    let handle = h.client.track(&order);
    handle.wait_for_state(ManagerState::SimulatedFallback).await;

    let change = h
        .client
        .update_status("ord-4", OrderStatus::OutForDelivery)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(change.from, OrderStatus::Packed);
    assert_eq!(change.to, OrderStatus::OutForDelivery);

    assert_eq!(h.api.get("ord-4").unwrap().status, OrderStatus::OutForDelivery);
    assert_eq!(h.client.snapshot("ord-4").unwrap().status, OrderStatus::OutForDelivery);
    assert_eq!(statuses.lock().last(), Some(&OrderStatus::OutForDelivery));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_transition_never_reaches_backend() {
    let h = harness(false);
    let order = order("ord-5", OrderStatus::Packed);
    h.api.insert(order.clone());
    h.client.track(&order);

    let err = h
        .client
        .update_status("ord-5", OrderStatus::Placed)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Tracking(TrackingError::InvalidTransition {
            from: OrderStatus::Packed,
            to: OrderStatus::Placed,
        })
    ));
    assert_eq!(h.api.get("ord-5").unwrap().status, OrderStatus::Packed);
    assert_eq!(h.client.snapshot("ord-5").unwrap().status, OrderStatus::Packed);
}

#[tokio::test(start_paused = true)]
async fn test_backend_failure_leaves_session_unchanged() {
    init_tracing();
    let feeds: Feeds = Arc::default();
    let builder = TrackingClient::builder("ws://mock.test").with_order_api(Arc::new(FailingApi));
    let client = mock_factory(builder, false, feeds).build().unwrap();

    client.track(&order("ord-6", OrderStatus::Packed));
    let err = client
        .update_status("ord-6", OrderStatus::OutForDelivery)
        .await
        .unwrap_err();

    match err {
        ClientError::Api(api) => assert!(api.is_retryable()),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(client.snapshot("ord-6").unwrap().status, OrderStatus::Packed);
}

#[tokio::test(start_paused = true)]
async fn test_delivery_closes_and_notifies() {
    let h = harness(false);
    let order = order("ord-7", OrderStatus::OutForDelivery);
    h.api.insert(order.clone());
    let handle = h.client.track(&order);
    handle.wait_for_state(ManagerState::SimulatedFallback).await;

    h.client
        .update_status("ord-7", OrderStatus::Delivered)
        .await
        .unwrap();
    handle.closed().await;
    sleep(Duration::from_millis(10)).await;

    assert!(h.client.tracked_orders().is_empty());
    assert_eq!(
        h.notified.lock().as_slice(),
        &[("ord-7".to_string(), OrderStatus::Delivered)]
    );

    // Finished orders refuse further changes
    let err = h
        .client
        .update_status("ord-7", OrderStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Tracking(TrackingError::InvalidTransition { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_untracked_order_updates_backend_only() {
    let h = harness(false);
    h.api.insert(order("ord-8", OrderStatus::Placed));

    let change = h
        .client
        .update_status("ord-8", OrderStatus::Confirmed)
        .await
        .unwrap();
    assert!(change.is_none());
    assert_eq!(h.api.get("ord-8").unwrap().status, OrderStatus::Confirmed);
    assert!(h.client.snapshot("ord-8").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_create_then_track() {
    let h = harness(false);
    let created = h
        .client
        .create_order(
            vec![OrderItem::new("p9", "Milk 1L", 4, dec!(68))],
            DeliveryAddress {
                line: "3 Carter Road".into(),
                location: Some(DEST),
            },
        )
        .await
        .unwrap();
    assert_eq!(created.total_amount, dec!(272));

    let placed = h
        .client
        .list_orders(&OrderFilter::status(OrderStatus::Placed))
        .await
        .unwrap();
    assert_eq!(placed.len(), 1);

    let handle = h.client.track(&created);
    handle.wait_for_state(ManagerState::SimulatedFallback).await;
    assert_eq!(handle.snapshot().destination, Some(DEST));
}

#[tokio::test(start_paused = true)]
async fn test_event_stream_covers_all_orders() {
    let mut h = harness(false);
    let mut events = h.client.events().unwrap();

    h.client.track(&order("ord-a", OrderStatus::Packed));
    h.client.track(&order("ord-b", OrderStatus::Packed));
    sleep(Duration::from_millis(100)).await;

    let mut fallbacks = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let Event::Connection(ConnectionEvent::FallbackStarted { order_id, .. }) = event {
            fallbacks.push(order_id);
        }
    }
    fallbacks.sort();
    assert_eq!(fallbacks, vec!["ord-a".to_string(), "ord-b".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_stop_and_shutdown() {
    let h = harness(false);
    let a = h.client.track(&order("ord-s1", OrderStatus::Packed));
    let b = h.client.track(&order("ord-s2", OrderStatus::Packed));

    assert!(h.client.stop("ord-s1"));
    assert!(a.is_closed());
    assert!(h.client.snapshot("ord-s1").is_none());
    assert!(!b.is_closed());

    h.client.shutdown();
    assert!(b.is_closed());
    assert!(h.client.tracked_orders().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_retrack_after_stop_starts_fresh() {
    let h = harness(false);
    let order = order("ord-r", OrderStatus::Packed);

    let first = h.client.track(&order);
    h.client.stop("ord-r");
    let second = h.client.track(&order);

    assert!(first.is_closed());
    assert!(!second.is_closed());
    second.wait_for_state(ManagerState::SimulatedFallback).await;
}

#[tokio::test(start_paused = true)]
async fn test_finished_orders_are_forgotten() {
    let h = harness(false);
    let mut handles = Vec::new();
    for i in 0..20 {
        let order = order(&format!("ord-f{i}"), OrderStatus::OutForDelivery);
        h.api.insert(order.clone());
        handles.push(h.client.track(&order));
    }
    assert_eq!(h.client.tracked_orders().len(), 20);

    for i in 0..20 {
        h.client
            .update_status(&format!("ord-f{i}"), OrderStatus::Delivered)
            .await
            .unwrap();
    }
    sleep(Duration::from_millis(10)).await;

    assert!(h.client.tracked_orders().is_empty());
    for (i, handle) in handles.iter().enumerate() {
        assert!(h.client.snapshot(&format!("ord-f{i}")).is_none());
        assert_eq!(handle.snapshot().status, OrderStatus::Delivered);
    }

    // A delivered order is still validated through the backend copy
    let err = h
        .client
        .update_status("ord-f0", OrderStatus::Packed)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Tracking(TrackingError::InvalidTransition {
            from: OrderStatus::Delivered,
            ..
        })
    ));
}

/// Order store whose status writes take a while to land
struct SlowApi {
    inner: Arc<InMemoryOrderApi>,
    delay: Duration,
}

#[async_trait]
impl OrderApi for SlowApi {
    async fn create_order(
        &self,
        items: Vec<OrderItem>,
        address: DeliveryAddress,
    ) -> Result<Order, ApiError> {
        self.inner.create_order(items, address).await
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, ApiError> {
        self.inner.list_orders(filter).await
    }

    async fn get_order(&self, id: &str) -> Result<Order, ApiError> {
        self.inner.get_order(id).await
    }

    async fn update_order_status(&self, id: &str, status: OrderStatus) -> Result<Order, ApiError> {
        sleep(self.delay).await;
        self.inner.update_order_status(id, status).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_backend_follows_session_that_moved_on() {
    init_tracing();
    let store = Arc::new(InMemoryOrderApi::new());
    let feeds: Feeds = Arc::default();
    let builder = TrackingClient::builder("ws://mock.test").with_order_api(Arc::new(SlowApi {
        inner: store.clone(),
        delay: Duration::from_secs(1),
    }));
    let client = mock_factory(builder, true, feeds.clone()).build().unwrap();

    let order = order("ord-9", OrderStatus::Confirmed);
    store.insert(order.clone());
    let handle = client.track(&order);
    let url = client.endpoint().tracking_url("ord-9");
    let feed = feeds.lock().get(&url).cloned().unwrap();

    feed.push_message(
        serde_json::json!({
            "type": "location_update",
            "status": "confirmed",
            "location": {"lat": 19.10, "lng": 72.87},
        })
        .to_string(),
    );
    handle.wait_for_state(ManagerState::Live).await;

    // Delivery arrives on the feed while the backend write is in flight
    let (result, _) = tokio::join!(
        client.update_status("ord-9", OrderStatus::Packed),
        async {
            sleep(Duration::from_millis(100)).await;
            feed.push_message(
                serde_json::json!({"type": "delivery_complete"}).to_string(),
            );
        }
    );

    assert!(matches!(
        result,
        Err(ClientError::Tracking(TrackingError::SessionClosed))
    ));
    assert_eq!(handle.snapshot().status, OrderStatus::Delivered);
    assert_eq!(store.get("ord-9").unwrap().status, OrderStatus::Delivered);
}
