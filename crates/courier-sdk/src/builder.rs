//! Client Builder Pattern
//!
//! Provides a fluent builder API for configuring the tracking client
//! with sensible defaults and validation.
//!
//! # Example
//!
//! ```
//! use courier_sdk::builder::TrackingClientBuilder;
//! use std::time::Duration;
//!
//! let builder = TrackingClientBuilder::new("wss://api.example.com")
//!     .with_simulator_interval(Duration::from_secs(1))
//!     .with_idle_timeout(Duration::from_secs(20));
//! assert!(builder.validate().is_ok());
//! ```

use crate::api::OrderApi;
use courier_route::SpeedModel;
use courier_types::GeoPoint;
use courier_ws::{
    Endpoint, Hooks, Notifier, ReconnectConfig, TrackingConfig, Transport, TracingNotifier,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Builds the transport used for one order's feed URL
pub type TransportFactory = Arc<dyn Fn(&str) -> Box<dyn Transport> + Send + Sync>;

/// Configuration validation error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Endpoint is not a WebSocket URL
    #[error("invalid endpoint: {url} (expected ws:// or wss://)")]
    InvalidEndpoint { url: String },

    /// Timeout too short
    #[error("connection timeout must be at least 1 second")]
    TimeoutTooShort,

    /// A duration that must be positive is zero
    #[error("{name} must be greater than zero")]
    ZeroDuration { name: &'static str },

    /// Simulated route has no steps
    #[error("simulated route needs at least one step")]
    NoRouteSteps,

    /// Speed model cannot produce an ETA
    #[error("invalid speed model: {speed_kmh} km/h with traffic factor {traffic_factor}")]
    InvalidSpeed { speed_kmh: f64, traffic_factor: f64 },

    /// Backoff parameters out of range
    #[error("invalid reconnect config: {0}")]
    InvalidReconnect(String),
}

/// Builder for configuring a tracking client
///
/// Covers:
/// - Feed endpoint
/// - Manager timeouts, backoff and simulation
/// - Collaborators (order API, notifier, hooks)
#[derive(Clone)]
pub struct TrackingClientBuilder {
    /// Tracking feed endpoint
    pub endpoint: Endpoint,

    /// Per-order manager configuration
    pub tracking: TrackingConfig,

    /// Lifecycle callbacks shared by every manager
    pub hooks: Hooks,

    /// Terminal-status notifier
    pub notifier: Arc<dyn Notifier>,

    /// Order backend (optional)
    pub order_api: Option<Arc<dyn OrderApi>>,

    /// Transport constructor (defaults to WebSocket)
    pub transport_factory: Option<TransportFactory>,
}

impl Default for TrackingClientBuilder {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            tracking: TrackingConfig::default(),
            hooks: Hooks::default(),
            notifier: Arc::new(TracingNotifier),
            order_api: None,
            transport_factory: None,
        }
    }
}

impl fmt::Debug for TrackingClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingClientBuilder")
            .field("endpoint", &self.endpoint)
            .field("tracking", &self.tracking)
            .field("hooks", &self.hooks)
            .field("order_api", &self.order_api.is_some())
            .field("custom_transport", &self.transport_factory.is_some())
            .finish()
    }
}

impl TrackingClientBuilder {
    /// Create a new builder for a backend base URL (`ws://` or `wss://`)
    ///
    /// # Example
    ///
    /// ```
    /// use courier_sdk::builder::TrackingClientBuilder;
    ///
    /// let builder = TrackingClientBuilder::new("ws://localhost:8000/");
    /// assert_eq!(builder.endpoint.base(), "ws://localhost:8000");
    /// ```
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Endpoint::new(endpoint),
            ..Default::default()
        }
    }

    /// Set the tracking endpoint
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Replace the whole manager configuration
    pub fn with_tracking_config(mut self, config: TrackingConfig) -> Self {
        self.tracking = config;
        self
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.tracking.connect_timeout = timeout;
        self
    }

    /// Set the wait for the first feed message
    pub fn with_first_message_timeout(mut self, timeout: Duration) -> Self {
        self.tracking.first_message_timeout = timeout;
        self
    }

    /// Set the live feed idle timeout
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.tracking.idle_timeout = Some(timeout);
        self
    }

    /// Set reconnection config
    pub fn with_reconnect(mut self, config: ReconnectConfig) -> Self {
        self.tracking.reconnect = config;
        self
    }

    /// Disable automatic reconnection
    pub fn without_reconnect(mut self) -> Self {
        self.tracking.reconnect = ReconnectConfig::disabled();
        self
    }

    /// Set the simulator tick interval
    pub fn with_simulator_interval(mut self, interval: Duration) -> Self {
        self.tracking.simulator.interval = interval;
        self
    }

    /// Set the number of simulated steps from origin to destination
    pub fn with_route_steps(mut self, steps: u32) -> Self {
        self.tracking.simulator.route.steps = steps;
        self
    }

    /// Set the ETA speed model
    pub fn with_speed(mut self, speed: SpeedModel) -> Self {
        self.tracking.speed = speed;
        self
    }

    /// Set where simulation starts when the driver position is unknown
    pub fn with_default_origin(mut self, origin: GeoPoint) -> Self {
        self.tracking.default_origin = origin;
        self
    }

    /// Set lifecycle hooks
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Set the terminal-status notifier
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Set the order backend
    pub fn with_order_api(mut self, api: Arc<dyn OrderApi>) -> Self {
        self.order_api = Some(api);
        self
    }

    /// Use a custom transport for each order's feed
    pub fn with_transport_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&str) -> Box<dyn Transport> + Send + Sync + 'static,
    {
        self.transport_factory = Some(Arc::new(factory));
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.endpoint.is_websocket() {
            return Err(ConfigError::InvalidEndpoint {
                url: self.endpoint.base().to_string(),
            });
        }

        let tracking = &self.tracking;
        if tracking.connect_timeout < Duration::from_secs(1) {
            return Err(ConfigError::TimeoutTooShort);
        }
        if tracking.first_message_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration {
                name: "first message timeout",
            });
        }
        if tracking.idle_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::ZeroDuration {
                name: "idle timeout",
            });
        }
        if tracking.simulator.interval.is_zero() {
            return Err(ConfigError::ZeroDuration {
                name: "simulator interval",
            });
        }
        if tracking.simulator.route.steps == 0 {
            return Err(ConfigError::NoRouteSteps);
        }

        let speed = &tracking.speed;
        if !(speed.speed_kmh.is_finite() && speed.speed_kmh > 0.0)
            || !(speed.traffic_factor.is_finite() && speed.traffic_factor > 0.0)
        {
            return Err(ConfigError::InvalidSpeed {
                speed_kmh: speed.speed_kmh,
                traffic_factor: speed.traffic_factor,
            });
        }

        let reconnect = &tracking.reconnect;
        if reconnect.multiplier < 1.0 {
            return Err(ConfigError::InvalidReconnect(format!(
                "multiplier {} is below 1.0",
                reconnect.multiplier
            )));
        }
        if !(0.0..=1.0).contains(&reconnect.jitter) {
            return Err(ConfigError::InvalidReconnect(format!(
                "jitter {} is outside 0.0..=1.0",
                reconnect.jitter
            )));
        }
        if reconnect.initial_delay > reconnect.max_delay {
            return Err(ConfigError::InvalidReconnect(
                "initial delay exceeds max delay".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_fluent_api() {
        let builder = TrackingClientBuilder::new("wss://api.example.com")
            .with_connect_timeout(Duration::from_secs(5))
            .with_first_message_timeout(Duration::from_secs(3))
            .with_simulator_interval(Duration::from_millis(500))
            .with_route_steps(20)
            .with_default_origin(GeoPoint::new(12.97, 77.59));

        assert_eq!(builder.tracking.connect_timeout, Duration::from_secs(5));
        assert_eq!(builder.tracking.simulator.route.steps, 20);
        assert_eq!(builder.tracking.default_origin, GeoPoint::new(12.97, 77.59));
        assert!(builder.endpoint.is_secure());
        assert!(builder.validate().is_ok());
    }

    #[test]
    fn test_builder_validation() {
        // Non-WebSocket scheme
        assert!(matches!(
            TrackingClientBuilder::new("https://api.example.com").validate(),
            Err(ConfigError::InvalidEndpoint { .. })
        ));

        // Connect timeout
        assert_eq!(
            TrackingClientBuilder::default()
                .with_connect_timeout(Duration::from_millis(200))
                .validate(),
            Err(ConfigError::TimeoutTooShort)
        );

        // Zero durations
        assert!(matches!(
            TrackingClientBuilder::default()
                .with_simulator_interval(Duration::ZERO)
                .validate(),
            Err(ConfigError::ZeroDuration { name: "simulator interval" })
        ));
        assert!(matches!(
            TrackingClientBuilder::default()
                .with_idle_timeout(Duration::ZERO)
                .validate(),
            Err(ConfigError::ZeroDuration { name: "idle timeout" })
        ));

        // Route and speed
        assert_eq!(
            TrackingClientBuilder::default().with_route_steps(0).validate(),
            Err(ConfigError::NoRouteSteps)
        );
        assert!(matches!(
            TrackingClientBuilder::default()
                .with_speed(SpeedModel::new(0.0))
                .validate(),
            Err(ConfigError::InvalidSpeed { .. })
        ));

        // Backoff
        assert!(matches!(
            TrackingClientBuilder::default()
                .with_reconnect(ReconnectConfig::default().with_multiplier(0.5))
                .validate(),
            Err(ConfigError::InvalidReconnect(_))
        ));
    }

    #[test]
    fn test_defaults_are_valid() {
        let builder = TrackingClientBuilder::default();
        assert_eq!(builder.endpoint, Endpoint::default());
        assert!(builder.order_api.is_none());
        assert!(builder.validate().is_ok());
        assert!(format!("{:?}", builder).contains("custom_transport: false"));
    }
}
