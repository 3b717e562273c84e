//! Feed transport abstraction
//!
//! The connection manager talks to the tracking feed through [`Transport`],
//! so its fallback and reconnect logic can be tested without a network.
//!
//! # Example
//!
//! ```no_run
//! use courier_ws::transport::{Transport, TransportError, WsTransport};
//!
//! async fn example() -> Result<(), TransportError> {
//!     let mut transport = WsTransport::new("ws://localhost:8000/ws/tracking/ord-1");
//!     transport.connect().await?;
//!     if let Some(message) = transport.recv().await? {
//!         println!("Received: {}", message);
//!     }
//!     transport.close().await
//! }
//! ```

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, instrument};

/// Transport layer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed
    #[error("connection closed")]
    ConnectionClosed,

    /// Receive failed
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Connection timeout
    #[error("connection timeout after {0:?}")]
    Timeout(Duration),

    /// Not connected
    #[error("not connected")]
    NotConnected,

    /// Protocol error
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Push-style feed connection
#[async_trait]
pub trait Transport: Send {
    /// Open (or reopen) the connection
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Receive the next text message
    ///
    /// Returns `None` if the server closed the connection gracefully.
    /// Must be cancel-safe: the manager polls it inside `select!`.
    async fn recv(&mut self) -> Result<Option<String>, TransportError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Check if currently connected
    fn is_connected(&self) -> bool;

    /// Feed URL
    fn endpoint(&self) -> &str;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn connect(&mut self) -> Result<(), TransportError> {
        (**self).connect().await
    }

    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        (**self).recv().await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        (**self).close().await
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn endpoint(&self) -> &str {
        (**self).endpoint()
    }
}

/// WebSocket transport using tokio-tungstenite
pub struct WsTransport {
    url: String,
    stream: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    connect_timeout: Duration,
}

impl WsTransport {
    /// Create a transport for a feed URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stream: None,
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Set connection timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[async_trait]
impl Transport for WsTransport {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn connect(&mut self) -> Result<(), TransportError> {
        debug!("Connecting to tracking feed");
        self.stream = None;

        let (ws_stream, _response) = timeout(self.connect_timeout, connect_async(&self.url))
            .await
            .map_err(|_| TransportError::Timeout(self.connect_timeout))?
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        self.stream = Some(ws_stream);
        debug!("Tracking feed connected");
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;

            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Binary(data))) => {
                    return String::from_utf8(data)
                        .map(Some)
                        .map_err(|e| TransportError::Protocol(e.to_string()));
                }
                Some(Ok(Message::Close(_))) => {
                    self.stream = None;
                    return Ok(None);
                }
                Some(Ok(Message::Ping(data))) => {
                    // Pong is best effort; a broken socket shows up on the next read
                    let _ = stream.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => {
                    self.stream = None;
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
                None => {
                    self.stream = None;
                    return Err(TransportError::ConnectionClosed);
                }
            }
        }
    }

    #[instrument(skip(self))]
    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut stream) = self.stream.take() {
            stream
                .close(None)
                .await
                .map_err(|e| TransportError::Protocol(e.to_string()))?;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{MockFeed, MockTransport};

#[cfg(any(test, feature = "test-utils"))]
mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    enum Frame {
        Text(String),
        Close,
        Error(TransportError),
    }

    #[derive(Default)]
    struct MockState {
        reachable: bool,
        connected: bool,
        attempts: Vec<Instant>,
        closes: u32,
    }

    /// Mock transport for testing
    ///
    /// Driven from the test through its paired [`MockFeed`]: the feed decides
    /// whether connects succeed and pushes frames that `recv()` yields. With
    /// nothing queued, `recv()` stays pending like a quiet socket.
    pub struct MockTransport {
        url: String,
        state: Arc<Mutex<MockState>>,
        frames: mpsc::UnboundedReceiver<Frame>,
    }

    /// Test-side controller for a [`MockTransport`]
    #[derive(Clone)]
    pub struct MockFeed {
        state: Arc<Mutex<MockState>>,
        frames: mpsc::UnboundedSender<Frame>,
    }

    impl MockTransport {
        /// Create a reachable mock transport and its controller
        pub fn new(url: impl Into<String>) -> (Self, MockFeed) {
            let (tx, rx) = mpsc::unbounded_channel();
            let state = Arc::new(Mutex::new(MockState {
                reachable: true,
                ..Default::default()
            }));
            (
                Self {
                    url: url.into(),
                    state: state.clone(),
                    frames: rx,
                },
                MockFeed { state, frames: tx },
            )
        }

        /// Create a mock whose connects fail until made reachable
        pub fn unreachable(url: impl Into<String>) -> (Self, MockFeed) {
            let (transport, feed) = Self::new(url);
            feed.set_reachable(false);
            (transport, feed)
        }
    }

    impl MockFeed {
        /// Allow or refuse connects
        pub fn set_reachable(&self, reachable: bool) {
            self.state.lock().reachable = reachable;
        }

        /// Queue a text frame
        pub fn push_message(&self, msg: impl Into<String>) {
            let _ = self.frames.send(Frame::Text(msg.into()));
        }

        /// Queue a graceful close
        pub fn push_close(&self) {
            let _ = self.frames.send(Frame::Close);
        }

        /// Queue a receive error
        pub fn push_error(&self, error: TransportError) {
            let _ = self.frames.send(Frame::Error(error));
        }

        /// Times at which connects were attempted
        pub fn connect_attempts(&self) -> Vec<Instant> {
            self.state.lock().attempts.clone()
        }

        /// Check if the client currently holds the connection open
        pub fn is_connected(&self) -> bool {
            self.state.lock().connected
        }

        /// Number of client-initiated closes
        pub fn close_count(&self) -> u32 {
            self.state.lock().closes
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn connect(&mut self) -> Result<(), TransportError> {
            let mut state = self.state.lock();
            state.attempts.push(Instant::now());
            if !state.reachable {
                state.connected = false;
                return Err(TransportError::ConnectionFailed("mock connection refused".into()));
            }
            state.connected = true;
            Ok(())
        }

        async fn recv(&mut self) -> Result<Option<String>, TransportError> {
            if !self.state.lock().connected {
                return Err(TransportError::NotConnected);
            }
            match self.frames.recv().await {
                Some(Frame::Text(text)) => Ok(Some(text)),
                Some(Frame::Close) => {
                    self.state.lock().connected = false;
                    Ok(None)
                }
                Some(Frame::Error(e)) => {
                    self.state.lock().connected = false;
                    Err(e)
                }
                None => Err(TransportError::ConnectionClosed),
            }
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            let mut state = self.state.lock();
            if state.connected {
                state.closes += 1;
            }
            state.connected = false;
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.state.lock().connected
        }

        fn endpoint(&self) -> &str {
            &self.url
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_transport_recv() {
        let (mut transport, feed) = MockTransport::new("ws://mock.test");
        feed.push_message(r#"{"type":"delivery_complete"}"#);

        transport.connect().await.unwrap();
        assert!(transport.is_connected());
        assert!(feed.is_connected());

        let msg = transport.recv().await.unwrap();
        assert!(msg.unwrap().contains("delivery_complete"));
    }

    #[tokio::test]
    async fn test_mock_transport_connection_failure() {
        let (mut transport, feed) = MockTransport::unreachable("ws://mock.test");

        assert!(transport.connect().await.is_err());
        assert!(!transport.is_connected());
        assert_eq!(feed.connect_attempts().len(), 1);
        assert_eq!(transport.recv().await, Err(TransportError::NotConnected));
    }

    #[tokio::test]
    async fn test_mock_transport_close_and_error() {
        let (mut transport, feed) = MockTransport::new("ws://mock.test");
        transport.connect().await.unwrap();

        feed.push_close();
        assert_eq!(transport.recv().await, Ok(None));
        assert!(!transport.is_connected());

        transport.connect().await.unwrap();
        feed.push_error(TransportError::ReceiveFailed("reset".into()));
        assert!(transport.recv().await.is_err());

        transport.connect().await.unwrap();
        transport.close().await.unwrap();
        assert_eq!(feed.close_count(), 1);
    }
}
