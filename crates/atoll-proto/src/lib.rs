//! Atoll wire protocol.
//!
//! JSON message types for the multiworld coordination protocol: client
//! commands, server messages, shared value types, and batch framing.
//!
//! # Wire format
//!
//! Every frame is a JSON array of objects, each discriminated by a `cmd`
//! string field. Inbound frames carry [`ClientCommand`]s, outbound frames
//! carry [`ServerMessage`]s. The same convention applies in both directions,
//! so a frame is always `[{"cmd": "...", ...}, ...]`.
//!
//! # Value representation
//!
//! Opaque payloads (the data store, `Bounce` data, `Get`/`Set` extras) are
//! [`serde_json::Value`]. `Value::Array(vec![])` and an empty
//! `Value::Object` serialize to `[]` and `{}` respectively and never
//! collapse into one another, which is how the protocol's empty-array
//! sentinel round-trips.

mod errors;

pub mod command;
pub mod frame;
pub mod message;
pub mod types;

pub use command::ClientCommand;
pub use errors::{ProtocolError, Result};
pub use message::ServerMessage;
