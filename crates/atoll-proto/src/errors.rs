//! Protocol error types.
//!
//! Decode errors distinguish a malformed frame (the outer JSON array) from a
//! malformed command element inside it: the server executes a batch
//! element-by-element, so the element index identifies how much of the batch
//! ran before the fault.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while encoding or decoding protocol frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The frame is not a JSON array of command objects.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A single command element failed to decode.
    ///
    /// Commands before `index` in the same batch have already been decoded
    /// (and possibly executed); they are not rolled back.
    #[error("invalid command at index {index}: {reason}")]
    InvalidCommand {
        /// Position of the offending element in the batch.
        index: usize,
        /// Decoder diagnostic for the element.
        reason: String,
    },

    /// A message batch could not be serialized.
    #[error("failed to encode batch: {0}")]
    Encode(String),
}
