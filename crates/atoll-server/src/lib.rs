//! Atoll multiworld coordination server.
//!
//! A room server for cooperative multiplayer randomizers: clients
//! authenticate into player slots over WebSocket, receive item grants as
//! locations are checked, exchange arbitrary keyed data, and relay payloads
//! to filtered subsets of the room.
//!
//! # Architecture
//!
//! The protocol logic follows the Sans-IO pattern. [`ServerDriver`] consumes
//! [`ServerEvent`]s and returns [`ServerAction`]s without performing any
//! I/O; [`Server`] is the production runtime that feeds it from WebSocket
//! connections and executes the actions with Tokio.
//!
//! # Components
//!
//! - [`ServerDriver`]: command dispatcher and room state (pure logic, no I/O)
//! - [`ConnectionRegistry`]: per-session protocol state
//! - [`RoomState`] / [`DataStore`]: shared mutable room data
//! - [`WsTransport`]: WebSocket accept loop via `tokio-tungstenite`
//! - [`Server`]: production runtime that executes driver actions
//!
//! # Concurrency
//!
//! One Tokio task per connection; all tasks share one driver behind an async
//! mutex, so commands are globally serialized with respect to shared-state
//! mutation. Outbound frames go through a per-session channel; a peer that
//! disconnects mid-broadcast is skipped without disturbing delivery to the
//! rest of the room.

mod datastore;
mod driver;
mod error;
mod registry;
mod room;
mod transport;

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use atoll_proto::frame;
pub use datastore::{DataStore, SetOutcome, StoreError};
pub use driver::{LogLevel, ServerAction, ServerDriver, ServerEvent};
pub use error::ServerError;
use futures::{SinkExt, StreamExt};
pub use registry::{ConnectionRegistry, SessionInfo};
pub use room::{PlayerSlot, RoomConfig, RoomState};
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio_tungstenite::tungstenite::{
    Message,
    protocol::{CloseFrame, frame::coding::CloseCode},
};
pub use transport::{WsStream, WsTransport};

/// Shared state for all connections.
///
/// Holds the per-session outbound channels used for sends and broadcasts.
/// All messages to a client go through its single channel, ensuring
/// ordering.
struct SharedState {
    /// Session ID → outbound message channel
    outbound: RwLock<HashMap<u64, mpsc::UnboundedSender<Message>>>,
}

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "127.0.0.1:38281")
    pub bind_address: String,
    /// Room configuration (players, password, seed)
    pub room: RoomConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self { bind_address: "127.0.0.1:38281".to_string(), room: RoomConfig::default() }
    }
}

/// Production Atoll server.
///
/// Wraps [`ServerDriver`] with WebSocket transport and the Tokio runtime.
pub struct Server {
    /// The action-based server driver
    driver: ServerDriver,
    /// WebSocket listener
    transport: WsTransport,
}

impl Server {
    /// Create and bind a new server.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let driver = ServerDriver::new(config.room);
        let transport = WsTransport::bind(&config.bind_address).await?;

        Ok(Self { driver, transport })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        self.transport.local_addr()
    }

    /// Run the server, accepting connections and processing frames.
    ///
    /// This method runs until an accept error or the process is shut down.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("server listening on {}", self.transport.local_addr()?);

        let driver = Arc::new(Mutex::new(self.driver));
        let shared = Arc::new(SharedState { outbound: RwLock::new(HashMap::new()) });
        let next_session = AtomicU64::new(1);

        loop {
            match self.transport.accept().await {
                Ok((socket, peer)) => {
                    let session_id = next_session.fetch_add(1, Ordering::Relaxed);
                    let driver = Arc::clone(&driver);
                    let shared = Arc::clone(&shared);

                    tracing::debug!("accepted {peer} as session {session_id}");
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(socket, session_id, driver, shared).await
                        {
                            tracing::error!("connection error on session {session_id}: {e}");
                        }
                    });
                },
                Err(e) => {
                    tracing::error!("accept error: {e}");
                },
            }
        }
    }
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    socket: WsStream,
    session_id: u64,
    driver: Arc<Mutex<ServerDriver>>,
    shared: Arc<SharedState>,
) -> Result<(), ServerError> {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    // Writer task: drains the outbound channel onto the socket. A close
    // frame ends the stream; so does a dropped channel or a dead peer.
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sink.send(message).await.is_err() || closing {
                break;
            }
        }
        let _ = sink.close().await;
    });

    shared.outbound.write().await.insert(session_id, tx);

    {
        let actions = driver
            .lock()
            .await
            .process_event(ServerEvent::ConnectionAccepted { session_id })?;
        execute_actions(actions, &shared).await;
    }

    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!("read error on session {session_id}: {e}");
                break;
            },
        };

        match message {
            Message::Text(text) => {
                let actions = driver
                    .lock()
                    .await
                    .process_event(ServerEvent::FrameReceived {
                        session_id,
                        text: text.as_str().to_owned(),
                    })?;
                let faulted = actions.iter().any(|action| {
                    matches!(action, ServerAction::CloseConnection { session_id: target, .. }
                        if *target == session_id)
                });
                execute_actions(actions, &shared).await;
                if faulted {
                    break;
                }
            },
            Message::Close(_) => break,
            // Binary frames are not part of the protocol; ping/pong is
            // answered inside tungstenite.
            _ => {},
        }
    }

    shared.outbound.write().await.remove(&session_id);

    {
        let actions = driver.lock().await.process_event(ServerEvent::ConnectionClosed {
            session_id,
            reason: "connection closed".to_string(),
        })?;
        execute_actions(actions, &shared).await;
    }

    let _ = writer.await;

    Ok(())
}

/// Execute driver actions.
async fn execute_actions(actions: Vec<ServerAction>, shared: &SharedState) {
    for action in actions {
        match action {
            ServerAction::SendToSession { session_id, message } => {
                let text = match frame::encode_batch(std::slice::from_ref(&message)) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!("failed to encode frame for session {session_id}: {e}");
                        continue;
                    },
                };

                let outbound = shared.outbound.read().await;
                match outbound.get(&session_id) {
                    Some(tx) => {
                        if tx.send(Message::text(text)).is_err() {
                            tracing::debug!("session {session_id} gone, dropping frame");
                        }
                    },
                    None => tracing::debug!("session {session_id} not connected, dropping frame"),
                }
            },

            ServerAction::CloseConnection { session_id, reason } => {
                tracing::info!("closing session {session_id}: {reason}");
                let mut outbound = shared.outbound.write().await;
                if let Some(tx) = outbound.remove(&session_id) {
                    let close = Message::Close(Some(CloseFrame {
                        code: CloseCode::Policy,
                        reason: reason.into(),
                    }));
                    let _ = tx.send(close);
                }
            },

            ServerAction::Log { level, message } => match level {
                LogLevel::Debug => tracing::debug!("{message}"),
                LogLevel::Info => tracing::info!("{message}"),
                LogLevel::Warn => tracing::warn!("{message}"),
                LogLevel::Error => tracing::error!("{message}"),
            },
        }
    }
}
