//! WebSocket transport implementation.
//!
//! Accepts TCP connections and upgrades each one to a WebSocket via
//! `tokio-tungstenite`. The transport owns nothing protocol-shaped: it hands
//! upgraded streams to the runtime, which frames text messages in and out of
//! the driver. Permessage-deflate, ping/pong and close handshakes are
//! handled inside the WebSocket library; the protocol core never sees them.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;

use crate::error::ServerError;

/// An upgraded client connection.
pub type WsStream = WebSocketStream<TcpStream>;

/// WebSocket transport listening on one TCP address.
pub struct WsTransport {
    /// Bound TCP listener
    listener: TcpListener,
}

impl WsTransport {
    /// Create and bind a new transport.
    pub async fn bind(address: &str) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address '{address}': {e}")))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Transport(format!("failed to bind {addr}: {e}")))?;

        Ok(Self { listener })
    }

    /// Local address the transport is bound to.
    ///
    /// Useful when binding port 0 to let the OS pick a free port.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(|e| ServerError::Transport(e.to_string()))
    }

    /// Accept and upgrade the next connection.
    pub async fn accept(&self) -> Result<(WsStream, SocketAddr), ServerError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(|e| ServerError::Transport(format!("accept failed: {e}")))?;

        let socket = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| ServerError::Transport(format!("websocket handshake failed: {e}")))?;

        Ok((socket, peer))
    }
}
