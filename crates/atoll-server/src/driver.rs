//! Server driver.
//!
//! Ties together the connection registry (per-session protocol state), the
//! room state (players, item queues, checked locations) and the data store.
//!
//! The driver is Sans-IO: it consumes [`ServerEvent`]s produced by the
//! runtime and returns [`ServerAction`]s for the runtime to execute. Commands
//! inside one frame run strictly in array order; a protocol fault stops the
//! rest of the batch and closes the connection, but never rolls back the
//! commands that already ran.

use std::time::{SystemTime, UNIX_EPOCH};

use atoll_proto::{
    ClientCommand, ServerMessage, frame,
    message::DataPackageData,
    types::{ConnectError, DataOperation, NetworkItem, TextNode, Version},
};
use serde_json::{Map, Value};

use crate::{
    datastore::{DataStore, StoreError},
    error::ServerError,
    registry::ConnectionRegistry,
    room::{RoomConfig, RoomState},
};

/// Events that the server driver processes.
///
/// These are produced by the runtime (WebSocket glue or tests).
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A new connection was accepted.
    ConnectionAccepted {
        /// Unique connection ID assigned by the runtime.
        session_id: u64,
    },

    /// A text frame was received from a connection.
    FrameReceived {
        /// Connection that sent the frame.
        session_id: u64,
        /// Raw frame text; decoded by the driver so that decode failures
        /// fault the offending connection instead of the runtime.
        text: String,
    },

    /// A connection was closed (by peer or error).
    ConnectionClosed {
        /// Connection that was closed.
        session_id: u64,
        /// Reason for closure.
        reason: String,
    },
}

/// Actions that the server driver produces.
///
/// These are executed by the runtime. Broadcast fan-out is resolved inside
/// the driver (it owns the session state the filters need), so the runtime
/// only ever delivers to single sessions.
#[derive(Debug, Clone)]
pub enum ServerAction {
    /// Send one message to a specific session.
    SendToSession {
        /// Target session ID.
        session_id: u64,
        /// Message to send.
        message: ServerMessage,
    },

    /// Close a connection with a structured reason.
    ///
    /// Emitted for protocol faults; the reason travels in the WebSocket
    /// close frame, which is the only error signal this protocol sends.
    CloseConnection {
        /// Session to close.
        session_id: u64,
        /// Reason for closure.
        reason: String,
    },

    /// Log a message (for debugging/monitoring).
    Log {
        /// Log level.
        level: LogLevel,
        /// Message to log.
        message: String,
    },
}

/// Log levels for server actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information.
    Debug,
    /// Informational message.
    Info,
    /// Warning.
    Warn,
    /// Error.
    Error,
}

/// A protocol violation that faults the offending connection.
#[derive(Debug)]
struct CommandFault(String);

impl CommandFault {
    fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

impl From<StoreError> for CommandFault {
    fn from(err: StoreError) -> Self {
        Self(err.to_string())
    }
}

type CommandResult = Result<Vec<ServerAction>, CommandFault>;

/// Action-based server driver.
///
/// Owns all shared room state; the runtime serializes calls to
/// [`ServerDriver::process_event`], which is what gives every command its
/// atomic read-modify-write over the store and queues.
pub struct ServerDriver {
    /// Per-session protocol state.
    registry: ConnectionRegistry,
    /// Players, item queues, checked locations.
    room: RoomState,
    /// Shared key/value store.
    store: DataStore,
}

impl ServerDriver {
    /// Create a new driver for a room.
    pub fn new(config: RoomConfig) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            room: RoomState::new(config),
            store: DataStore::new(),
        }
    }

    /// Session registry, for inspection by the runtime and tests.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Process a server event and return actions to execute.
    ///
    /// This is the main entry point for the server driver.
    pub fn process_event(&mut self, event: ServerEvent) -> Result<Vec<ServerAction>, ServerError> {
        match event {
            ServerEvent::ConnectionAccepted { session_id } => {
                self.handle_connection_accepted(session_id)
            },
            ServerEvent::FrameReceived { session_id, text } => {
                self.handle_frame_received(session_id, &text)
            },
            ServerEvent::ConnectionClosed { session_id, reason } => {
                self.handle_connection_closed(session_id, &reason)
            },
        }
    }

    /// Send a plain-text `Print` to every connection, authenticated or not.
    ///
    /// Operator-facing: not reachable from any client command.
    pub fn print_all(&self, text: &str) -> Vec<ServerAction> {
        self.registry
            .iter()
            .map(|(session_id, _)| ServerAction::SendToSession {
                session_id,
                message: ServerMessage::Print { text: text.to_owned() },
            })
            .collect()
    }

    /// Handle a new connection: register it and greet with `RoomInfo`.
    ///
    /// `RoomInfo` goes out before any authentication, unconditionally.
    fn handle_connection_accepted(
        &mut self,
        session_id: u64,
    ) -> Result<Vec<ServerAction>, ServerError> {
        if !self.registry.register_session(session_id) {
            return Err(ServerError::DuplicateSession(session_id));
        }

        Ok(vec![
            ServerAction::SendToSession { session_id, message: self.room_info() },
            ServerAction::Log {
                level: LogLevel::Debug,
                message: format!("connection {session_id} accepted"),
            },
        ])
    }

    /// Handle a received frame: decode the batch and run it in order.
    fn handle_frame_received(
        &mut self,
        session_id: u64,
        text: &str,
    ) -> Result<Vec<ServerAction>, ServerError> {
        if !self.registry.has_session(session_id) {
            return Err(ServerError::SessionNotFound(session_id));
        }

        let mut actions = Vec::new();

        let elements = match frame::decode_elements(text) {
            Ok(elements) => elements,
            Err(err) => {
                fault(&mut actions, session_id, &err.to_string());
                return Ok(actions);
            },
        };

        for (index, element) in elements.into_iter().enumerate() {
            let command = match frame::command_from_value(index, element) {
                Ok(command) => command,
                Err(err) => {
                    fault(&mut actions, session_id, &err.to_string());
                    break;
                },
            };

            match self.handle_command(session_id, command) {
                Ok(mut command_actions) => actions.append(&mut command_actions),
                Err(CommandFault(reason)) => {
                    fault(&mut actions, session_id, &reason);
                    break;
                },
            }
        }

        Ok(actions)
    }

    /// Handle a connection being closed.
    fn handle_connection_closed(
        &mut self,
        session_id: u64,
        reason: &str,
    ) -> Result<Vec<ServerAction>, ServerError> {
        let mut actions = Vec::new();

        if let Some(info) = self.registry.unregister_session(session_id) {
            let slot = info.slot.map_or_else(|| "unauthenticated".to_owned(), |s| s.to_string());
            actions.push(ServerAction::Log {
                level: LogLevel::Info,
                message: format!("connection {session_id} closed (slot {slot}): {reason}"),
            });
        }

        Ok(actions)
    }

    /// Dispatch one decoded command.
    ///
    /// Only `Connect` and `GetDataPackage` are legal before authentication;
    /// everything else faults the connection.
    fn handle_command(&mut self, session_id: u64, command: ClientCommand) -> CommandResult {
        match command {
            ClientCommand::Connect {
                name,
                password,
                game,
                uuid: _,
                version,
                items_handling,
                tags,
            } => self.handle_connect(session_id, &name, password.as_deref(), game.as_deref(),
                version, items_handling, tags),

            ClientCommand::GetDataPackage { games } => {
                self.handle_get_data_package(session_id, games)
            },

            ClientCommand::ConnectUpdate { items_handling, tags } => {
                self.handle_connect_update(session_id, items_handling, tags)
            },
            ClientCommand::Sync => self.handle_sync(session_id),
            ClientCommand::LocationChecks { locations } => {
                self.handle_location_checks(session_id, &locations)
            },
            ClientCommand::LocationScouts { locations, create_as_hint: _ } => {
                self.handle_location_scouts(session_id, &locations)
            },
            ClientCommand::Get { keys, extra } => self.handle_get(session_id, &keys, extra),
            ClientCommand::Set { key, default, want_reply, operations, extra } => {
                self.handle_set(session_id, &key, default, want_reply, &operations, extra)
            },
            ClientCommand::SetNotify { keys } => self.handle_set_notify(session_id, keys),
            ClientCommand::StatusUpdate { status } => self.handle_status_update(session_id, status),
            ClientCommand::Say { text } => self.handle_say(session_id, &text),
            ClientCommand::Bounce { games, slots, tags, data } => {
                self.handle_bounce(session_id, &games, &slots, &tags, data)
            },
            ClientCommand::UpdateHint { .. } => {
                self.require_auth(session_id)?;
                Ok(vec![self.hint_placeholder(session_id, "*insert hint here*")])
            },
            ClientCommand::CreateHints { locations, player: _, status: _ } => {
                self.require_auth(session_id)?;
                if locations.is_empty() {
                    return Err(CommandFault::new("CreateHints requires at least one location"));
                }
                Ok(vec![self.hint_placeholder(session_id, "*insert hints here*")])
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_connect(
        &mut self,
        session_id: u64,
        name: &str,
        password: Option<&str>,
        game: Option<&str>,
        version: Version,
        items_handling: Option<i64>,
        tags: Option<Vec<String>>,
    ) -> CommandResult {
        let mut errors = Vec::new();

        let slot = self.room.slot_by_name(name);
        if slot.is_none() {
            errors.push(ConnectError::InvalidSlot);
        }
        let locked = self.room.config().password.as_deref();
        if locked.is_some_and(|expected| password != Some(expected)) {
            errors.push(ConnectError::InvalidPassword);
        }
        if game.unwrap_or("").is_empty() {
            errors.push(ConnectError::InvalidGame);
        }

        if !errors.is_empty() {
            return Ok(vec![
                ServerAction::Log {
                    level: LogLevel::Warn,
                    message: format!("connection {session_id} refused: {errors:?}"),
                },
                ServerAction::SendToSession {
                    session_id,
                    message: ServerMessage::ConnectionRefused { errors },
                },
            ]);
        }

        // Validation is exhaustive above, so the lookup cannot fail here.
        let Some(slot) = slot else {
            return Err(CommandFault::new("slot lookup failed after validation"));
        };

        let Some(session) = self.registry.session_mut(session_id) else {
            return Err(CommandFault::new("unknown session"));
        };
        session.slot = Some(slot);
        session.tags = tags.unwrap_or_default();
        session.version = Some(version);
        session.items_handling = items_handling.unwrap_or(0);

        let connected = ServerMessage::Connected {
            team: 0,
            slot,
            players: self.room.players_list(),
            missing_locations: Vec::new(),
            checked_locations: self.room.checked_locations(slot),
            slot_info: self.room.slot_info(),
            hint_points: self.room.config().hint_points,
        };
        let items = ServerMessage::ReceivedItems {
            index: 0,
            items: self.room.items(slot).to_vec(),
        };

        Ok(vec![
            ServerAction::Log {
                level: LogLevel::Info,
                message: format!("connection {session_id} authenticated as slot {slot} ({name})"),
            },
            ServerAction::SendToSession { session_id, message: connected },
            ServerAction::SendToSession { session_id, message: items },
        ])
    }

    fn handle_get_data_package(
        &mut self,
        session_id: u64,
        games: Option<Vec<String>>,
    ) -> CommandResult {
        let games = match games {
            Some(requested) if !requested.is_empty() => requested,
            _ => self.room.games(),
        };

        let data = DataPackageData {
            games: games.into_iter().map(|game| (game, Value::Object(Map::new()))).collect(),
        };

        Ok(vec![ServerAction::SendToSession {
            session_id,
            message: ServerMessage::DataPackage { data },
        }])
    }

    fn handle_connect_update(
        &mut self,
        session_id: u64,
        items_handling: Option<i64>,
        tags: Option<Vec<String>>,
    ) -> CommandResult {
        self.require_auth(session_id)?;

        let Some(session) = self.registry.session_mut(session_id) else {
            return Err(CommandFault::new("unknown session"));
        };
        // Null means "leave unchanged"; both null is a legal no-op.
        if let Some(items_handling) = items_handling {
            session.items_handling = items_handling;
        }
        if let Some(tags) = tags {
            session.tags = tags;
        }

        Ok(Vec::new())
    }

    fn handle_sync(&mut self, session_id: u64) -> CommandResult {
        let slot = self.require_auth(session_id)?;

        Ok(vec![ServerAction::SendToSession {
            session_id,
            message: ServerMessage::ReceivedItems {
                index: 0,
                items: self.room.items(slot).to_vec(),
            },
        }])
    }

    fn handle_location_checks(&mut self, session_id: u64, locations: &[i64]) -> CommandResult {
        let slot = self.require_auth(session_id)?;
        let mut actions = Vec::new();

        for &location in locations {
            // Repeat checks grant nothing; the queue only ever grows.
            if let Some((index, item)) = self.room.check_location(slot, location) {
                actions.push(ServerAction::SendToSession {
                    session_id,
                    message: ServerMessage::ReceivedItems {
                        index: index as i64,
                        items: vec![item],
                    },
                });
            }
        }

        actions.push(ServerAction::SendToSession {
            session_id,
            message: ServerMessage::RoomUpdate {
                checked_locations: Some(locations.to_vec()),
                permissions: None,
            },
        });

        Ok(actions)
    }

    fn handle_location_scouts(&mut self, session_id: u64, locations: &[i64]) -> CommandResult {
        let slot = self.require_auth(session_id)?;
        let mut actions = Vec::new();
        let mut found = Vec::with_capacity(locations.len());

        for &location in locations {
            found.push(NetworkItem { item: location, location, player: slot, flags: 0 });
            actions.push(self.hint_placeholder(session_id, "*insert hint here*"));
        }

        actions.push(ServerAction::SendToSession {
            session_id,
            message: ServerMessage::LocationInfo { locations: found },
        });

        Ok(actions)
    }

    fn handle_get(
        &mut self,
        session_id: u64,
        keys: &[String],
        mut extra: Map<String, Value>,
    ) -> CommandResult {
        self.require_auth(session_id)?;

        let mut values = Map::new();
        for key in keys {
            values.insert(key.clone(), self.store.get(key).cloned().unwrap_or(Value::Null));
        }

        // Reply fields win over caller extras of the same name.
        extra.remove("keys");

        Ok(vec![ServerAction::SendToSession {
            session_id,
            message: ServerMessage::Retrieved { keys: values, extra },
        }])
    }

    fn handle_set(
        &mut self,
        session_id: u64,
        key: &str,
        default: Value,
        want_reply: bool,
        operations: &[DataOperation],
        mut extra: Map<String, Value>,
    ) -> CommandResult {
        let slot = self.require_auth(session_id)?;

        let outcome = self.store.mutate(key, default, operations)?;

        // Reply fields win over caller extras of the same name.
        for reserved in ["key", "value", "original_value", "slot"] {
            extra.remove(reserved);
        }

        let reply = ServerMessage::SetReply {
            key: key.to_owned(),
            value: outcome.value,
            original_value: outcome.original_value,
            slot,
            extra,
        };

        // Every subscribed session hears about the write; the writer gets a
        // copy when it asked for one, never two.
        let mut targets: Vec<u64> = self
            .registry
            .iter()
            .filter(|(_, session)| session.notify_keys.contains(key))
            .map(|(id, _)| id)
            .collect();
        if want_reply && !targets.contains(&session_id) {
            targets.push(session_id);
        }

        Ok(targets
            .into_iter()
            .map(|target| ServerAction::SendToSession {
                session_id: target,
                message: reply.clone(),
            })
            .collect())
    }

    fn handle_set_notify(&mut self, session_id: u64, keys: Vec<String>) -> CommandResult {
        self.require_auth(session_id)?;

        let Some(session) = self.registry.session_mut(session_id) else {
            return Err(CommandFault::new("unknown session"));
        };
        // Wholesale replacement: SetNotify declares the full interest set.
        session.notify_keys = keys.into_iter().collect();

        Ok(Vec::new())
    }

    fn handle_status_update(&mut self, session_id: u64, status: i64) -> CommandResult {
        self.require_auth(session_id)?;

        let Some(session) = self.registry.session_mut(session_id) else {
            return Err(CommandFault::new("unknown session"));
        };
        session.status = status;

        Ok(Vec::new())
    }

    fn handle_say(&mut self, session_id: u64, text: &str) -> CommandResult {
        let slot = self.require_auth(session_id)?;
        let name = self
            .room
            .player(slot)
            .map(|player| player.name.clone())
            .ok_or_else(|| CommandFault::new("authenticated slot has no player"))?;

        let message = ServerMessage::PrintJson {
            data: vec![TextNode::text(format!("{name}: {text}"))],
            extra: Map::new(),
        };

        Ok(self
            .registry
            .authenticated()
            .map(|(target, _)| ServerAction::SendToSession {
                session_id: target,
                message: message.clone(),
            })
            .collect())
    }

    fn handle_bounce(
        &mut self,
        session_id: u64,
        games: &[String],
        slots: &[i32],
        tags: &[String],
        data: Value,
    ) -> CommandResult {
        self.require_auth(session_id)?;

        let message = ServerMessage::Bounced {
            games: games.to_vec(),
            slots: slots.to_vec(),
            tags: tags.to_vec(),
            data,
        };

        // No filters at all means broadcast, not match-nothing.
        let unfiltered = games.is_empty() && slots.is_empty() && tags.is_empty();

        let mut actions = Vec::new();
        for (target, session) in self.registry.iter() {
            let Some(slot) = session.slot else { continue };

            let matches = unfiltered
                || slots.contains(&slot)
                || session.tags.iter().any(|tag| tags.contains(tag))
                || self.room.player(slot).is_some_and(|player| games.contains(&player.game));

            if matches {
                actions.push(ServerAction::SendToSession {
                    session_id: target,
                    message: message.clone(),
                });
            }
        }

        Ok(actions)
    }

    fn require_auth(&self, session_id: u64) -> Result<i32, CommandFault> {
        self.registry
            .session(session_id)
            .and_then(|session| session.slot)
            .ok_or_else(|| CommandFault::new("command requires an authenticated session"))
    }

    fn hint_placeholder(&self, session_id: u64, text: &str) -> ServerAction {
        ServerAction::SendToSession {
            session_id,
            message: ServerMessage::PrintJson {
                data: vec![TextNode::text(text)],
                extra: Map::new(),
            },
        }
    }

    fn room_info(&self) -> ServerMessage {
        let config = self.room.config();
        ServerMessage::RoomInfo {
            seed_name: config.seed_name.clone(),
            time: unix_now(),
            version: config.server_version,
            tags: config.server_tags.clone(),
            hint_cost: config.hint_cost,
            games: self.room.games(),
            permissions: config.permissions,
        }
    }
}

/// Append the fault log + close pair for a protocol violation.
fn fault(actions: &mut Vec<ServerAction>, session_id: u64, reason: &str) {
    actions.push(ServerAction::Log {
        level: LogLevel::Warn,
        message: format!("protocol fault on connection {session_id}: {reason}"),
    });
    actions.push(ServerAction::CloseConnection { session_id, reason: reason.to_owned() });
}

/// Wall-clock time as Unix seconds, as announced in `RoomInfo`.
fn unix_now() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0.0, |elapsed| elapsed.as_secs_f64())
}
