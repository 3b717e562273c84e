//! High-level tracking client

use crate::api::{ApiError, OrderApi};
use crate::builder::{ConfigError, TrackingClientBuilder, TransportFactory};
use courier_route::{StatusChange, TrackingSession};
use courier_types::{
    can_transition, DeliveryAddress, Order, OrderFilter, OrderItem, OrderStatus, TrackingError,
};
use courier_ws::{
    Endpoint, Event, Hooks, ManagerHandle, ManagerState, Notifier, StatusBroadcast, Subscription,
    TrackingConfig, TrackingConnectionManager, Transport, WsTransport,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Errors from client operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Lifecycle or session error
    #[error(transparent)]
    Tracking(#[from] TrackingError),

    /// Order backend error
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The call needs an order backend and none was configured
    #[error("no order API configured")]
    NoOrderApi,
}

/// High-level client tracking any number of orders
///
/// Each tracked order runs its own connection manager. All managers share
/// one [`StatusBroadcast`], one set of [`Hooks`] and one event stream.
///
/// # Example
///
/// ```no_run
/// use courier_sdk::TrackingClient;
/// use courier_types::{GeoPoint, Order, OrderStatus};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut client = TrackingClient::builder("ws://localhost:8000").build()?;
///
///     let order = Order::new("ord-1", vec![])
///         .with_status(OrderStatus::OutForDelivery)
///         .with_destination(GeoPoint::new(19.1136, 72.8697));
///
///     let _sub = client.subscribe("ord-1", |s| {
///         println!("{} {:?}% eta {:?}", s.status, s.progress_percent, s.eta_minutes);
///     });
///     let handle = client.track(&order);
///
///     let mut events = client.events().unwrap();
///     tokio::spawn(async move {
///         while let Some(event) = events.recv().await {
///             println!("{:?}", event);
///         }
///     });
///
///     handle.closed().await;
///     Ok(())
/// }
/// ```
pub struct TrackingClient {
    endpoint: Endpoint,
    config: TrackingConfig,
    hooks: Hooks,
    notifier: Arc<dyn Notifier>,
    order_api: Option<Arc<dyn OrderApi>>,
    transport_factory: TransportFactory,
    broadcast: StatusBroadcast,
    trackers: Arc<DashMap<String, ManagerHandle>>,
    event_tx: mpsc::UnboundedSender<Event>,
    /// Event receiver
    event_rx: Option<mpsc::UnboundedReceiver<Event>>,
}

impl TrackingClient {
    /// Create a new client builder
    pub fn builder(endpoint: impl Into<String>) -> TrackingClientBuilder {
        TrackingClientBuilder::new(endpoint)
    }

    /// Tracking endpoint
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Snapshot fan-out shared by all tracked orders
    pub fn broadcast(&self) -> &StatusBroadcast {
        &self.broadcast
    }

    /// Start tracking an order
    ///
    /// Returns the existing handle while that order is already being
    /// tracked. An order whose earlier tracking has closed is started fresh.
    /// Finished orders are dropped from the client once their manager
    /// closes; keep the returned handle to read the final snapshot.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub fn track(&self, order: &Order) -> ManagerHandle {
        self.track_session(TrackingSession::from_order(order))
    }

    /// Start tracking from a prepared session
    pub fn track_session(&self, session: TrackingSession) -> ManagerHandle {
        let handle = match self.trackers.entry(session.order_id.clone()) {
            Entry::Occupied(entry) if !entry.get().is_closed() => {
                debug!("Order {} already tracked", entry.key());
                return entry.get().clone();
            }
            Entry::Occupied(mut entry) => {
                let handle = self.start_manager(session);
                entry.insert(handle.clone());
                handle
            }
            Entry::Vacant(entry) => {
                let handle = self.start_manager(session);
                entry.insert(handle.clone());
                handle
            }
        };

        self.record_tracked();
        handle
    }

    fn start_manager(&self, session: TrackingSession) -> ManagerHandle {
        let url = self.endpoint.tracking_url(&session.order_id);
        let transport = (self.transport_factory)(&url);

        debug!("Starting manager for order {}", session.order_id);

        let handle = TrackingConnectionManager::new(session, self.config.clone())
            .with_broadcast(self.broadcast.clone())
            .with_hooks(self.hooks.clone())
            .with_notifier(self.notifier.clone())
            .with_event_sender(self.event_tx.clone())
            .start(transport);
        self.forget_when_closed(&handle);
        handle
    }

    /// Remove the order's entry once its manager closes
    fn forget_when_closed(&self, handle: &ManagerHandle) {
        let trackers = Arc::downgrade(&self.trackers);
        let order_id = handle.order_id().to_string();
        let closed = handle.on_closed();

        tokio::spawn(async move {
            closed.await;
            let Some(trackers) = trackers.upgrade() else {
                return;
            };
            // A re-tracked order has a fresh, open handle under the same key
            if trackers.remove_if(&order_id, |_, h| h.is_closed()).is_some() {
                debug!("Order {} finished, dropping its session", order_id);
            }
            #[cfg(feature = "metrics")]
            crate::metrics::set_tracked_orders(trackers.len());
        });
    }

    /// Register a snapshot callback for an order
    ///
    /// Works before or after [`track`](Self::track); the subscription lasts
    /// until [`Subscription::unsubscribe`] is called.
    pub fn subscribe<F>(&self, order_id: &str, callback: F) -> Subscription
    where
        F: Fn(&TrackingSession) + Send + Sync + 'static,
    {
        self.broadcast.subscribe(order_id, callback)
    }

    /// Handle for a tracked order
    pub fn handle(&self, order_id: &str) -> Option<ManagerHandle> {
        self.trackers.get(order_id).map(|h| h.clone())
    }

    /// Current session snapshot for a tracked order
    pub fn snapshot(&self, order_id: &str) -> Option<TrackingSession> {
        self.trackers.get(order_id).map(|h| h.snapshot())
    }

    /// Manager state for a tracked order
    pub fn state(&self, order_id: &str) -> Option<ManagerState> {
        self.trackers.get(order_id).map(|h| h.state())
    }

    /// Ids of orders still being tracked
    pub fn tracked_orders(&self) -> Vec<String> {
        self.trackers
            .iter()
            .filter(|h| !h.value().is_closed())
            .map(|h| h.key().clone())
            .collect()
    }

    /// Stop tracking an order
    ///
    /// Returns `false` if the order was not tracked.
    pub fn stop(&self, order_id: &str) -> bool {
        let stopped = match self.trackers.remove(order_id) {
            Some((_, handle)) => {
                handle.stop();
                true
            }
            None => false,
        };
        self.record_tracked();
        stopped
    }

    /// Move an order to a new status
    ///
    /// The change is checked against the lifecycle first, using the tracked
    /// session or, for an untracked order, the backend's copy. The backend
    /// is then updated and the change applied to the session (which
    /// broadcasts it). Returns the applied change, or `None` for an
    /// untracked order updated only on the backend.
    ///
    /// If the session ends or moves on while the backend call is in flight,
    /// the backend is brought up to the session's status and the session's
    /// error is returned.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: &str,
        to: OrderStatus,
    ) -> Result<Option<StatusChange>, ClientError> {
        let handle = self.handle(order_id);
        let api = self.order_api.as_ref();

        let from = match (&handle, api) {
            (Some(handle), _) => handle.snapshot().status,
            (None, Some(api)) => api.get_order(order_id).await?.status,
            (None, None) => return Err(ClientError::NoOrderApi),
        };
        if !can_transition(from, to) {
            warn!("Rejected status change {} -> {} for {}", from, to, order_id);
            return Err(TrackingError::InvalidTransition { from, to }.into());
        }

        if let Some(api) = api {
            let stored = api.update_order_status(order_id, to).await?;
            debug!("Backend has order {} as {}", stored.id, stored.status);
        }

        let Some(handle) = handle else {
            return Ok(None);
        };
        match handle.apply_transition(to).await {
            Ok(change) => Ok(Some(change)),
            Err(err) => {
                if let Some(api) = api {
                    reconcile(&**api, &handle, to).await;
                }
                Err(err.into())
            }
        }
    }

    /// Place an order through the backend
    pub async fn create_order(
        &self,
        items: Vec<OrderItem>,
        address: DeliveryAddress,
    ) -> Result<Order, ClientError> {
        let api = self.order_api.as_ref().ok_or(ClientError::NoOrderApi)?;
        Ok(api.create_order(items, address).await?)
    }

    /// List orders from the backend
    pub async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, ClientError> {
        let api = self.order_api.as_ref().ok_or(ClientError::NoOrderApi)?;
        Ok(api.list_orders(filter).await?)
    }

    /// Take the event receiver (can only be called once)
    ///
    /// Events from every tracked order queue up here until taken.
    /// Returns `None` if `events()` has already been called.
    pub fn events(&mut self) -> Option<mpsc::UnboundedReceiver<Event>> {
        self.event_rx.take()
    }

    /// Stop every tracked order
    #[instrument(skip(self))]
    pub fn shutdown(&self) {
        for entry in self.trackers.iter() {
            entry.value().stop();
        }
        self.trackers.clear();
        self.record_tracked();
        info!("Tracking client shut down");
    }

    fn record_tracked(&self) {
        #[cfg(feature = "metrics")]
        crate::metrics::set_tracked_orders(self.tracked_orders().len());
    }
}

/// Bring the backend back in line with a session that moved on
async fn reconcile(api: &dyn OrderApi, handle: &ManagerHandle, written: OrderStatus) {
    let current = handle.snapshot().status;
    if current == written {
        return;
    }
    warn!(
        "Order {}: backend set to {} but session is {}",
        handle.order_id(),
        written,
        current
    );
    if can_transition(written, current) {
        if let Err(e) = api.update_order_status(handle.order_id(), current).await {
            warn!("Order {}: could not restore backend status: {}", handle.order_id(), e);
        }
    }
}

impl TrackingClientBuilder {
    /// Validate the configuration and create a client
    ///
    /// Must be called inside a Tokio runtime before orders are tracked.
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub fn build(self) -> Result<TrackingClient, ConfigError> {
        self.validate()?;

        let transport_factory = match self.transport_factory {
            Some(factory) => factory,
            None => {
                let timeout = self.tracking.connect_timeout;
                Arc::new(move |url: &str| {
                    Box::new(WsTransport::new(url).with_timeout(timeout)) as Box<dyn Transport>
                })
            }
        };
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        info!("Tracking client created for {}", self.endpoint);

        Ok(TrackingClient {
            endpoint: self.endpoint,
            config: self.tracking,
            hooks: self.hooks,
            notifier: self.notifier,
            order_api: self.order_api,
            transport_factory,
            broadcast: StatusBroadcast::new(),
            trackers: Arc::new(DashMap::new()),
            event_tx,
            event_rx: Some(event_rx),
        })
    }
}
