//! Tracking feed endpoint

use std::fmt;

/// Base URL of the backend's tracking WebSocket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: String,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(Self::LOCAL)
    }
}

impl Endpoint {
    /// Local development backend
    pub const LOCAL: &'static str = "ws://localhost:8000";

    /// Create an endpoint from a base URL (`ws://` or `wss://`)
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// Base URL without trailing slash
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Feed URL for one order
    pub fn tracking_url(&self, order_id: &str) -> String {
        format!("{}/ws/tracking/{}", self.base, order_id)
    }

    /// Check the scheme is a WebSocket one
    pub fn is_websocket(&self) -> bool {
        self.base.starts_with("ws://") || self.base.starts_with("wss://")
    }

    /// Check if the endpoint uses TLS
    pub fn is_secure(&self) -> bool {
        self.base.starts_with("wss://")
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracking_url() {
        let ep = Endpoint::new("wss://api.example.com/");
        assert_eq!(ep.tracking_url("ord-7"), "wss://api.example.com/ws/tracking/ord-7");
        assert!(ep.is_secure());
        assert!(ep.is_websocket());
    }

    #[test]
    fn test_default_is_local() {
        let ep = Endpoint::default();
        assert_eq!(ep.base(), "ws://localhost:8000");
        assert!(!ep.is_secure());
        assert!(!Endpoint::new("http://x").is_websocket());
    }
}
