//! Per-order tracking connection manager
//!
//! One spawned task per tracked order owns the feed transport, the position
//! simulator and the backoff timer, and is the only writer of the order's
//! [`TrackingSession`]. Everything it reacts to (feed frames, simulator
//! ticks, retry deadlines, caller commands) goes through a single
//! `select!`, so live and simulated updates are applied strictly in order.
//!
//! ```text
//!   Connecting ──first valid message──▶ Live
//!       │                                 │ drop / error / idle
//!       ▼ fail / timeout                  ▼
//!   SimulatedFallback ◀──fail── Reconnecting
//!       │      └────backoff elapsed────▲     (success ▶ Live)
//!       ▼
//!   Closed   (terminal status, delivery_complete or stop())
//! ```

use crate::broadcast::StatusBroadcast;
use crate::events::{ConnectionEvent, DisconnectReason, Event, SessionEvent};
use crate::hooks::{ConnectInfo, Hooks, StatusChangeInfo};
use crate::notify::Notifier;
use crate::reconnect::ReconnectConfig;
use crate::simulator::{PositionSimulator, SimulatorConfig};
use crate::transport::{Transport, TransportError};

use courier_route::{PositionUpdate, SpeedModel, StatusChange, TrackingSession};
use courier_types::{ConnectionQuality, FeedMessage, GeoPoint, OrderStatus, TrackingError};
use parking_lot::{RwLock, RwLockWriteGuard};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, info, warn};

/// Warehouse used as the simulation start when no driver position is known
pub const DEFAULT_ORIGIN: GeoPoint = GeoPoint::new(19.0760, 72.8777);

/// Manager lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagerState {
    /// Opening the feed for the first time
    Connecting,
    /// Positions come from the live feed
    Live,
    /// Positions come from the simulator; a retry may be pending
    SimulatedFallback,
    /// Retrying the feed while simulated ticks continue
    Reconnecting,
    /// Tracking has ended
    Closed,
}

impl ManagerState {
    /// Check if tracking has ended
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Check if a feed attempt is in flight
    pub fn is_attempting(&self) -> bool {
        matches!(self, Self::Connecting | Self::Reconnecting)
    }
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Live => "live",
            Self::SimulatedFallback => "simulated",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Configuration for a tracking manager
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    /// Time allowed for the feed to open
    pub connect_timeout: Duration,
    /// Time allowed for the first valid message once open
    pub first_message_timeout: Duration,
    /// Silence in `Live` treated as a dropped feed (None = never)
    pub idle_timeout: Option<Duration>,
    /// Reconnection backoff
    pub reconnect: ReconnectConfig,
    /// Position simulator settings
    pub simulator: SimulatorConfig,
    /// Speed model for ETA estimates
    pub speed: SpeedModel,
    /// Simulation start when the driver position is unknown
    pub default_origin: GeoPoint,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            first_message_timeout: Duration::from_secs(5),
            idle_timeout: Some(Duration::from_secs(15)),
            reconnect: ReconnectConfig::default(),
            simulator: SimulatorConfig::default(),
            speed: SpeedModel::default(),
            default_origin: DEFAULT_ORIGIN,
        }
    }
}

impl TrackingConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set first-message timeout
    pub fn with_first_message_timeout(mut self, timeout: Duration) -> Self {
        self.first_message_timeout = timeout;
        self
    }

    /// Set idle timeout for the live feed
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Never treat a quiet live feed as dropped
    pub fn without_idle_timeout(mut self) -> Self {
        self.idle_timeout = None;
        self
    }

    /// Set reconnection config
    pub fn with_reconnect(mut self, config: ReconnectConfig) -> Self {
        self.reconnect = config;
        self
    }

    /// Disable automatic reconnection
    pub fn without_reconnect(mut self) -> Self {
        self.reconnect = ReconnectConfig::disabled();
        self
    }

    /// Set simulator config
    pub fn with_simulator(mut self, config: SimulatorConfig) -> Self {
        self.simulator = config;
        self
    }

    /// Set the ETA speed model
    pub fn with_speed(mut self, speed: SpeedModel) -> Self {
        self.speed = speed;
        self
    }

    /// Set the default simulation origin
    pub fn with_default_origin(mut self, origin: GeoPoint) -> Self {
        self.default_origin = origin;
        self
    }
}

enum Command {
    Transition {
        to: OrderStatus,
        reply: oneshot::Sender<Result<StatusChange, TrackingError>>,
    },
    Stop,
}

struct Shared {
    order_id: String,
    session: RwLock<TrackingSession>,
    state: watch::Sender<ManagerState>,
    generation: AtomicU64,
}

/// Tracking manager for one order, configured before [`start`](Self::start)
pub struct TrackingConnectionManager {
    config: TrackingConfig,
    session: TrackingSession,
    broadcast: StatusBroadcast,
    hooks: Hooks,
    notifier: Option<Arc<dyn Notifier>>,
    events: Option<mpsc::UnboundedSender<Event>>,
}

impl TrackingConnectionManager {
    /// Create a manager for a session
    pub fn new(session: TrackingSession, config: TrackingConfig) -> Self {
        Self {
            config,
            session,
            broadcast: StatusBroadcast::new(),
            hooks: Hooks::default(),
            notifier: None,
            events: None,
        }
    }

    /// Publish snapshots through a shared broadcast
    pub fn with_broadcast(mut self, broadcast: StatusBroadcast) -> Self {
        self.broadcast = broadcast;
        self
    }

    /// Set lifecycle hooks
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Set the terminal-status notifier
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Send events to a channel
    pub fn with_event_sender(mut self, tx: mpsc::UnboundedSender<Event>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Broadcast used for snapshots
    pub fn broadcast(&self) -> &StatusBroadcast {
        &self.broadcast
    }

    /// Spawn the manager task over `transport`
    ///
    /// A session that is already terminal starts (and stays) `Closed`
    /// without touching the transport.
    pub fn start<T>(self, transport: T) -> ManagerHandle
    where
        T: Transport + 'static,
    {
        let initial = if self.session.is_terminal() {
            ManagerState::Closed
        } else {
            ManagerState::Connecting
        };
        let (state, _) = watch::channel(initial);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            order_id: self.session.order_id.clone(),
            session: RwLock::new(self.session),
            state,
            generation: AtomicU64::new(0),
        });
        let handle = ManagerHandle {
            shared: shared.clone(),
            commands: cmd_tx,
        };

        if initial.is_closed() {
            debug!("Order {} already finished, not tracking", shared.order_id);
            return handle;
        }

        let core = Core {
            shared,
            generation: 0,
            simulator: PositionSimulator::new(self.config.simulator),
            config: self.config,
            commands: cmd_rx,
            broadcast: self.broadcast,
            hooks: self.hooks,
            notifier: self.notifier,
            events: self.events,
            reconnect_attempt: 0,
            retry_at: None,
            simulating: false,
            was_live: false,
            last_message: Instant::now(),
        };
        tokio::spawn(run(core, Box::new(transport)));

        handle
    }
}

/// Cloneable handle to a running manager
#[derive(Clone)]
pub struct ManagerHandle {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
}

impl fmt::Debug for ManagerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerHandle")
            .field("order_id", &self.shared.order_id)
            .field("state", &self.state())
            .finish()
    }
}

impl ManagerHandle {
    /// Order being tracked
    pub fn order_id(&self) -> &str {
        &self.shared.order_id
    }

    /// Current manager state
    pub fn state(&self) -> ManagerState {
        *self.shared.state.borrow()
    }

    /// Check if tracking has ended
    pub fn is_closed(&self) -> bool {
        self.state().is_closed()
    }

    /// Copy of the current session
    pub fn snapshot(&self) -> TrackingSession {
        self.shared.session.read().clone()
    }

    /// Stop tracking
    ///
    /// Takes effect before this returns: the state is `Closed` and the
    /// manager applies no further mutation. Idempotent.
    pub fn stop(&self) {
        {
            // Writers re-check the generation under this lock
            let _session = self.shared.session.write();
            self.shared.generation.fetch_add(1, Ordering::AcqRel);
            self.shared.state.send_replace(ManagerState::Closed);
        }
        let _ = self.commands.send(Command::Stop);
    }

    /// Apply a status change through the manager
    ///
    /// Terminal statuses close the feed and stop the simulator.
    pub async fn apply_transition(&self, to: OrderStatus) -> Result<StatusChange, TrackingError> {
        if self.is_closed() {
            return Err(TrackingError::SessionClosed);
        }
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Transition { to, reply })
            .map_err(|_| TrackingError::SessionClosed)?;
        rx.await.map_err(|_| TrackingError::SessionClosed)?
    }

    /// Wait until the manager enters `state`
    pub async fn wait_for_state(&self, state: ManagerState) {
        let mut rx = self.shared.state.subscribe();
        let _ = rx.wait_for(|s| *s == state).await;
    }

    /// Wait until tracking has ended
    pub async fn closed(&self) {
        self.wait_for_state(ManagerState::Closed).await
    }

    /// Future that resolves once tracking has ended
    ///
    /// Unlike [`closed`](Self::closed) it holds no handle, so it does not
    /// keep the manager running.
    pub fn on_closed(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.shared.state.subscribe();
        async move {
            let _ = rx.wait_for(ManagerState::is_closed).await;
        }
    }
}

struct Core {
    shared: Arc<Shared>,
    generation: u64,
    config: TrackingConfig,
    simulator: PositionSimulator,
    commands: mpsc::UnboundedReceiver<Command>,
    broadcast: StatusBroadcast,
    hooks: Hooks,
    notifier: Option<Arc<dyn Notifier>>,
    events: Option<mpsc::UnboundedSender<Event>>,
    reconnect_attempt: u32,
    retry_at: Option<Instant>,
    simulating: bool,
    was_live: bool,
    last_message: Instant,
}

impl Core {
    fn order_id(&self) -> &str {
        &self.shared.order_id
    }

    fn state(&self) -> ManagerState {
        *self.shared.state.borrow()
    }

    /// Still the current generation and not closed
    fn alive(&self) -> bool {
        self.shared.generation.load(Ordering::Acquire) == self.generation && !self.state().is_closed()
    }

    /// Write access to the session while this generation is current
    fn session_mut(&self) -> Option<RwLockWriteGuard<'_, TrackingSession>> {
        let session = self.shared.session.write();
        self.alive().then_some(session)
    }

    fn set_state(&self, state: ManagerState) {
        if !self.alive() {
            return;
        }
        let prev = self.shared.state.send_replace(state);
        if prev != state {
            debug!("Order {}: {} -> {}", self.order_id(), prev, state);
        }
    }

    fn emit(&self, event: impl Into<Event>) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event.into());
        }
    }

    fn publish(&self) {
        let snapshot = {
            let session = self.shared.session.read();
            if !self.alive() {
                return;
            }
            session.clone()
        };
        self.broadcast.publish(self.order_id(), &snapshot);
    }

    fn idle_deadline(&self) -> Option<Instant> {
        self.config.idle_timeout.map(|idle| self.last_message + idle)
    }

    fn apply_update(&mut self, update: PositionUpdate) {
        let result = {
            let Some(mut session) = self.session_mut() else {
                return;
            };
            let before = session.connection_quality;
            session
                .apply_position(&update, &self.config.speed)
                .map(|change| (change, before, session.connection_quality, session.progress_percent, session.eta_minutes))
        };

        match result {
            Ok((change, before, after, progress, eta_minutes)) => {
                self.emit(SessionEvent::PositionUpdated {
                    order_id: self.order_id().to_string(),
                    source: update.source,
                    progress,
                    eta_minutes,
                });
                if before != after {
                    self.emit(SessionEvent::QualityChanged {
                        order_id: self.order_id().to_string(),
                        quality: after,
                    });
                }
                if let Some(change) = change {
                    self.on_status_changed(change);
                }
                self.publish();
                if change.is_some_and(|c| c.is_terminal()) {
                    self.finish();
                }
            }
            Err(TrackingError::InvalidTransition { from, to }) => {
                warn!("Order {}: ignoring transition {} -> {}", self.order_id(), from, to);
                self.hooks
                    .invoke_error(&TrackingError::invalid_transition(from, to).to_string());
                self.emit(SessionEvent::TransitionRejected {
                    order_id: self.order_id().to_string(),
                    from,
                    to,
                });
            }
            Err(e) => debug!("Order {}: update dropped: {}", self.order_id(), e),
        }
    }

    fn on_status_changed(&self, change: StatusChange) {
        info!("Order {}: {} -> {}", self.order_id(), change.from, change.to);
        self.hooks.invoke_status_change(&StatusChangeInfo {
            order_id: self.order_id(),
            from: change.from,
            to: change.to,
        });
        self.emit(SessionEvent::StatusChanged {
            order_id: self.order_id().to_string(),
            from: change.from,
            to: change.to,
        });

        if change.is_terminal() {
            if let Some(notifier) = self.notifier.clone() {
                let order_id = self.order_id().to_string();
                tokio::spawn(async move {
                    notifier.order_finished(&order_id, change.to).await;
                });
            }
        }
    }

    fn set_quality(&self, quality: ConnectionQuality) {
        let changed = match self.session_mut() {
            Some(mut session) => session.set_quality(quality),
            None => return,
        };
        if changed {
            self.emit(SessionEvent::QualityChanged {
                order_id: self.order_id().to_string(),
                quality,
            });
            self.publish();
        }
    }

    /// Stop producing positions and mark the manager closed
    fn finish(&mut self) {
        self.simulator.stop();
        self.simulating = false;
        self.retry_at = None;
        self.set_state(ManagerState::Closed);
    }

    fn on_command(&mut self, command: Option<Command>) {
        match command {
            Some(Command::Transition { to, reply }) => {
                let result = match self.session_mut() {
                    Some(mut session) => session.apply_transition(to),
                    None => Err(TrackingError::SessionClosed),
                };
                if let Ok(change) = result {
                    self.on_status_changed(change);
                    self.publish();
                    if change.is_terminal() {
                        self.finish();
                    }
                }
                let _ = reply.send(result);
            }
            // Stop already closed the state from the caller's side
            Some(Command::Stop) => self.simulator.stop(),
            None => {
                debug!("Order {}: all handles dropped", self.order_id());
                self.finish();
            }
        }
    }

    fn go_live(&mut self, first: FeedMessage, url: &str) {
        if !self.alive() {
            return;
        }
        self.simulator.stop();
        self.simulating = false;
        self.reconnect_attempt = 0;
        self.retry_at = None;
        self.last_message = Instant::now();
        self.set_state(ManagerState::Live);

        let is_reconnection = self.was_live;
        self.was_live = true;
        info!("Order {}: live feed connected", self.order_id());
        self.hooks.invoke_connect(&ConnectInfo {
            order_id: self.order_id().to_string(),
            url: url.to_string(),
            is_reconnection,
        });
        self.emit(ConnectionEvent::Connected {
            order_id: self.order_id().to_string(),
            is_reconnection,
        });

        self.handle_message(first);
    }

    /// Returns true when the feed has gone away
    fn handle_frame(&mut self, frame: Result<Option<String>, TransportError>) -> bool {
        match frame {
            Ok(Some(text)) => {
                self.last_message = Instant::now();
                match parse_for(self.order_id(), &text) {
                    Ok(msg) => self.handle_message(msg),
                    Err(e) => self.on_malformed(&e),
                }
                false
            }
            Ok(None) => {
                self.on_disconnect(DisconnectReason::ServerClosed);
                true
            }
            Err(e) => {
                self.on_disconnect(DisconnectReason::NetworkError(e.to_string()));
                true
            }
        }
    }

    fn handle_message(&mut self, msg: FeedMessage) {
        match msg {
            FeedMessage::LocationUpdate(update) => self.apply_update(PositionUpdate::live(&update)),
            FeedMessage::DeliveryComplete(_) => {
                let result = match self.session_mut() {
                    Some(mut session) => session.complete_delivery(),
                    None => return,
                };
                match result {
                    Ok(Some(change)) => {
                        self.on_status_changed(change);
                        self.publish();
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Order {}: delivery_complete rejected: {}", self.order_id(), e),
                }
                info!("Order {}: delivery complete", self.order_id());
                self.finish();
            }
        }
    }

    fn on_malformed(&self, err: &TrackingError) {
        warn!("Order {}: dropping message: {}", self.order_id(), err);
        let reason = match err {
            TrackingError::MalformedMessage { reason, .. } => reason.clone(),
            other => other.to_string(),
        };
        self.hooks.invoke_malformed(self.order_id(), &reason);
        self.emit(SessionEvent::MalformedMessage {
            order_id: self.order_id().to_string(),
            reason,
        });
    }

    fn on_disconnect(&mut self, reason: DisconnectReason) {
        if !self.alive() {
            return;
        }
        warn!("Order {}: live feed lost: {}", self.order_id(), reason);
        self.hooks.invoke_disconnect(self.order_id(), &reason);
        self.emit(ConnectionEvent::Disconnected {
            order_id: self.order_id().to_string(),
            reason: reason.clone(),
        });
        self.fall_back(&reason.to_string());
    }

    fn on_attempt_failed(&mut self, err: TrackingError) {
        if !self.alive() {
            return;
        }
        debug!("Order {}: feed attempt failed: {}", self.order_id(), err);
        self.hooks.invoke_error(&err.to_string());
        self.fall_back(&err.to_string());
    }

    /// Switch to simulated positions and schedule the next retry
    fn fall_back(&mut self, reason: &str) {
        self.set_state(ManagerState::SimulatedFallback);

        if !self.simulating {
            self.simulating = true;
            let (origin, destination, base) = {
                let session = self.shared.session.read();
                (
                    session.current_position.unwrap_or(self.config.default_origin),
                    session.destination,
                    session.progress_percent.unwrap_or(0.0),
                )
            };

            match destination {
                Some(destination) => {
                    info!("Order {}: simulating positions ({})", self.order_id(), reason);
                    self.simulator.start(origin, destination, base);
                    self.set_quality(ConnectionQuality::Simulated);
                }
                None => {
                    let err = TrackingError::MissingDestination {
                        order_id: self.order_id().to_string(),
                    };
                    warn!("{}", err);
                    self.hooks.invoke_error(&err.to_string());
                    self.set_quality(ConnectionQuality::Disconnected);
                }
            }

            self.hooks.invoke_fallback(self.order_id(), reason);
            self.emit(ConnectionEvent::FallbackStarted {
                order_id: self.order_id().to_string(),
                reason: reason.to_string(),
            });
        }

        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        self.reconnect_attempt += 1;
        let attempt = self.reconnect_attempt;

        let Some(delay) = self.config.reconnect.next_delay(attempt) else {
            self.retry_at = None;
            warn!(
                "Order {}: reconnection attempts exhausted after {} tries",
                self.order_id(),
                attempt - 1
            );
            return;
        };

        self.retry_at = Some(Instant::now() + delay);
        debug!("Order {}: reconnect attempt {} in {:?}", self.order_id(), attempt, delay);
        self.hooks.invoke_reconnect_attempt(attempt, delay);
        self.emit(ConnectionEvent::Reconnecting {
            order_id: self.order_id().to_string(),
            attempt,
            delay,
        });
    }

    fn begin_reconnect(&mut self) {
        self.retry_at = None;
        self.set_state(ManagerState::Reconnecting);
    }
}

/// Parse a frame and check it belongs to `order_id`
fn parse_for(order_id: &str, text: &str) -> Result<FeedMessage, TrackingError> {
    let msg = FeedMessage::parse(text)?;
    match msg.order_id() {
        Some(id) if id != order_id => Err(TrackingError::malformed(
            format!("message for order {}", id),
            text,
        )),
        _ => Ok(msg),
    }
}

/// Open the feed and wait for its first valid message
///
/// Malformed frames are skipped; they do not end the wait early.
async fn open_feed(
    transport: &mut dyn Transport,
    order_id: &str,
    connect_timeout: Duration,
    first_message_timeout: Duration,
) -> Result<FeedMessage, TrackingError> {
    match timeout(connect_timeout, transport.connect()).await {
        Err(_) => {
            return Err(TrackingError::ConnectionTimeout {
                timeout: connect_timeout,
            })
        }
        Ok(Err(e)) => return Err(TrackingError::Connection(e.to_string())),
        Ok(Ok(())) => {}
    }

    let first = async {
        loop {
            match transport.recv().await {
                Ok(Some(text)) => match parse_for(order_id, &text) {
                    Ok(msg) => return Ok(msg),
                    Err(e) => debug!("Order {}: skipping frame while connecting: {}", order_id, e),
                },
                Ok(None) => {
                    return Err(TrackingError::Connection(
                        "closed before first message".to_string(),
                    ))
                }
                Err(e) => return Err(TrackingError::Connection(e.to_string())),
            }
        }
    };

    timeout(first_message_timeout, first)
        .await
        .map_err(|_| TrackingError::ConnectionTimeout {
            timeout: first_message_timeout,
        })?
}

async fn deadline(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn run(mut core: Core, mut transport: Box<dyn Transport>) {
    let order_id = core.order_id().to_string();
    let url = transport.endpoint().to_string();
    info!("Tracking order {} via {}", order_id, url);
    core.publish();

    loop {
        if !core.alive() {
            break;
        }

        match core.state() {
            ManagerState::Connecting | ManagerState::Reconnecting => {
                let (connect_timeout, first_timeout) =
                    (core.config.connect_timeout, core.config.first_message_timeout);

                let outcome = {
                    let attempt = open_feed(transport.as_mut(), &order_id, connect_timeout, first_timeout);
                    tokio::pin!(attempt);

                    loop {
                        tokio::select! {
                            result = &mut attempt => break Some(result),
                            update = core.simulator.tick() => core.apply_update(update),
                            command = core.commands.recv() => core.on_command(command),
                        }
                        if !core.alive() {
                            break None;
                        }
                    }
                };

                match outcome {
                    Some(Ok(first)) => core.go_live(first, &url),
                    Some(Err(err)) => {
                        let _ = transport.close().await;
                        core.on_attempt_failed(err);
                    }
                    None => break,
                }
            }
            ManagerState::Live => {
                let idle = core.idle_deadline();
                let dropped = tokio::select! {
                    frame = transport.recv() => core.handle_frame(frame),
                    _ = deadline(idle) => {
                        core.on_disconnect(DisconnectReason::HeartbeatTimeout);
                        true
                    }
                    command = core.commands.recv() => {
                        core.on_command(command);
                        false
                    }
                };
                if dropped {
                    let _ = transport.close().await;
                }
            }
            ManagerState::SimulatedFallback => {
                let retry_at = core.retry_at;
                tokio::select! {
                    _ = deadline(retry_at) => core.begin_reconnect(),
                    update = core.simulator.tick() => core.apply_update(update),
                    command = core.commands.recv() => core.on_command(command),
                }
            }
            ManagerState::Closed => break,
        }
    }

    core.simulator.stop();
    if transport.is_connected() {
        let reason = if core.shared.session.read().is_terminal() {
            DisconnectReason::OrderFinished
        } else {
            DisconnectReason::Shutdown
        };
        core.hooks.invoke_disconnect(&order_id, &reason);
        core.emit(ConnectionEvent::Disconnected {
            order_id: order_id.clone(),
            reason,
        });
        let _ = transport.close().await;
    }
    info!("Tracking closed for order {}", order_id);
    core.emit(ConnectionEvent::Closed { order_id });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrackingConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.first_message_timeout, Duration::from_secs(5));
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(15)));
        assert_eq!(config.simulator.interval, Duration::from_secs(2));
        assert_eq!(config.default_origin, DEFAULT_ORIGIN);
    }

    #[test]
    fn test_config_builder() {
        let config = TrackingConfig::new()
            .with_connect_timeout(Duration::from_secs(1))
            .without_idle_timeout()
            .without_reconnect();
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert!(config.idle_timeout.is_none());
        assert!(!config.reconnect.should_reconnect(1));
    }

    #[test]
    fn test_state_helpers() {
        assert!(ManagerState::Closed.is_closed());
        assert!(ManagerState::Reconnecting.is_attempting());
        assert!(!ManagerState::SimulatedFallback.is_attempting());
        assert_eq!(ManagerState::SimulatedFallback.to_string(), "simulated");
    }

    #[test]
    fn test_parse_for_rejects_other_orders() {
        let json = r#"{"type":"delivery_complete","order_id":"ord-2"}"#;
        assert!(parse_for("ord-1", json).is_err());
        assert!(parse_for("ord-2", json).is_ok());

        let anonymous = r#"{"type":"delivery_complete"}"#;
        assert!(parse_for("ord-1", anonymous).is_ok());
    }

    #[tokio::test]
    async fn test_terminal_session_starts_closed() {
        use crate::transport::MockTransport;

        let session = TrackingSession::new("ord-1", OrderStatus::Delivered, None);
        let (transport, feed) = MockTransport::new("ws://mock.test");
        let handle = TrackingConnectionManager::new(session, TrackingConfig::default()).start(transport);

        assert!(handle.is_closed());
        assert!(feed.connect_attempts().is_empty());
        assert_eq!(
            handle.apply_transition(OrderStatus::Cancelled).await,
            Err(TrackingError::SessionClosed)
        );
    }
}
