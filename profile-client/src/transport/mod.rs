//! Transport abstraction for relay connections.
//!
//! This module provides a pluggable transport layer that abstracts
//! the underlying connection mechanism (WebSocket, mock for testing).
//!
//! # Design
//!
//! The transport trait is async and connection-oriented:
//! - `connect()` establishes a connection to a relay URL
//! - `send()` transmits one JSON text frame
//! - `recv()` receives one JSON text frame
//! - `close()` gracefully terminates
//!
//! A transport is used for exactly one relay attempt. The resolver asks a
//! [`TransportFactory`] for a fresh one every time it moves to the next relay.
//!
//! # Example
//!
//! ```ignore
//! let transport = WebSocketTransport::new();
//! transport.connect("wss://relay.damus.io").await?;
//! transport.send(r#"["REQ","sub",{"kinds":[0]}]"#).await?;
//! let frame = transport.recv().await?;
//! ```

mod mock;
mod websocket;

pub use mock::{MockFrame, MockRelay, MockRelayNetwork, MockTransport};
pub use websocket::{WebSocketFactory, WebSocketTransport};

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Connection timeout.
    #[error("connection timeout")]
    Timeout,
}

/// Transport trait for exchanging relay protocol frames.
///
/// Implementations handle the underlying connection mechanism
/// (WebSocket, mock, etc).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to the relay at the given URL.
    async fn connect(&self, address: &str) -> Result<(), TransportError>;

    /// Send one text frame.
    async fn send(&self, text: &str) -> Result<(), TransportError>;

    /// Receive one text frame.
    ///
    /// Waits until a frame is available or the connection closes.
    async fn recv(&self) -> Result<String, TransportError>;

    /// Check if currently connected.
    fn is_connected(&self) -> bool;

    /// Close the connection gracefully.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Produces a fresh, unconnected transport for each relay attempt.
pub trait TransportFactory: Send + Sync + 'static {
    /// Transport type produced.
    type Transport: Transport + 'static;

    /// Create a new transport.
    fn create(&self) -> Self::Transport;
}
