//! Connection registry for per-session protocol state.
//!
//! One [`SessionInfo`] per live connection, keyed by the runtime-assigned
//! session ID. Sessions start unauthenticated; `Connect` fills in the slot
//! and declared client fields. Everything except `slot` is meaningless until
//! the session authenticates.
//!
//! Iteration order is session-ID order (`BTreeMap`), so broadcast fan-out is
//! deterministic.

use std::collections::{BTreeMap, HashSet};

use atoll_proto::types::Version;

/// Protocol state for one registered session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Authenticated player slot; `None` until `Connect` succeeds.
    pub slot: Option<i32>,
    /// Capability tags declared at connect, mutable via `ConnectUpdate`.
    pub tags: Vec<String>,
    /// Client version declared at connect.
    pub version: Option<Version>,
    /// Item-notification bitmask, mutable via `ConnectUpdate`.
    pub items_handling: i64,
    /// Client progress status, mutable via `StatusUpdate`.
    pub status: i64,
    /// Data-store keys whose writes this session wants notified about,
    /// replaced wholesale by `SetNotify`.
    pub notify_keys: HashSet<String>,
}

impl Default for SessionInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionInfo {
    /// Create a new unauthenticated session.
    pub fn new() -> Self {
        Self {
            slot: None,
            tags: Vec::new(),
            version: None,
            items_handling: 0,
            status: 0,
            notify_keys: HashSet::new(),
        }
    }

    /// Whether the session has completed the `Connect` handshake.
    pub fn is_authenticated(&self) -> bool {
        self.slot.is_some()
    }
}

/// Registry of live sessions.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Session ID → session state
    sessions: BTreeMap<u64, SessionInfo>,
}

impl ConnectionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new unauthenticated session.
    ///
    /// Returns `false` if the session ID is already registered.
    pub fn register_session(&mut self, session_id: u64) -> bool {
        if self.sessions.contains_key(&session_id) {
            return false;
        }
        self.sessions.insert(session_id, SessionInfo::new());
        true
    }

    /// Unregister a session, returning its final state if it existed.
    pub fn unregister_session(&mut self, session_id: u64) -> Option<SessionInfo> {
        self.sessions.remove(&session_id)
    }

    /// Session state. `None` if the session doesn't exist.
    pub fn session(&self, session_id: u64) -> Option<&SessionInfo> {
        self.sessions.get(&session_id)
    }

    /// Mutable session state. `None` if the session doesn't exist.
    pub fn session_mut(&mut self, session_id: u64) -> Option<&mut SessionInfo> {
        self.sessions.get_mut(&session_id)
    }

    /// Check if a session is registered.
    pub fn has_session(&self, session_id: u64) -> bool {
        self.sessions.contains_key(&session_id)
    }

    /// All live sessions in session-ID order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &SessionInfo)> {
        self.sessions.iter().map(|(id, info)| (*id, info))
    }

    /// All authenticated sessions in session-ID order.
    pub fn authenticated(&self) -> impl Iterator<Item = (u64, &SessionInfo)> {
        self.iter().filter(|(_, info)| info.is_authenticated())
    }

    /// Total number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
