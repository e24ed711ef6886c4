//! Server error types.

use std::fmt;

/// Errors that can occur in the server.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, inconsistent room setup).
    ///
    /// These are fatal errors that prevent server startup. Fix configuration
    /// and restart.
    Config(String),

    /// Transport/network error (bind failure, handshake failure, I/O error).
    ///
    /// May be transient (network issues) or fatal (bind address in use).
    /// Check error message for details.
    Transport(String),

    /// Protocol error (failed to encode an outbound frame).
    ///
    /// Indicates a bug in message construction rather than client
    /// misbehavior; client protocol violations fault only that connection
    /// and never surface here.
    Protocol(String),

    /// Event referenced a session the driver does not know.
    ///
    /// The runtime registers sessions before feeding frames, so this
    /// indicates a runtime bug. Fatal - report as issue.
    SessionNotFound(u64),

    /// Runtime tried to register a session ID twice.
    ///
    /// Session IDs are allocated from a counter and must be unique.
    /// Fatal - report as issue.
    DuplicateSession(u64),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Self::SessionNotFound(id) => write!(f, "session not found: {id}"),
            Self::DuplicateSession(id) => write!(f, "session already exists: {id}"),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
