//! JSON batch framing.
//!
//! A frame on the wire is one JSON array of command/message objects. The
//! decode side is split in two deliberately: [`decode_elements`] validates
//! only the outer array, and [`command_from_value`] decodes one element.
//! The server walks a batch element-by-element so that a malformed command
//! faults the connection without retroactively undoing commands that
//! already executed earlier in the same frame. [`decode_batch`] is the
//! all-or-nothing convenience used by tests and fuzzing.

use serde_json::Value;

use crate::{
    command::ClientCommand,
    errors::{ProtocolError, Result},
    message::ServerMessage,
};

/// Split a frame into its raw command elements.
///
/// # Errors
///
/// [`ProtocolError::MalformedFrame`] when the text is not valid JSON or not
/// a JSON array.
pub fn decode_elements(text: &str) -> Result<Vec<Value>> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedFrame(e.to_string()))?;
    match value {
        Value::Array(elements) => Ok(elements),
        other => Err(ProtocolError::MalformedFrame(format!(
            "expected a JSON array of commands, got {}",
            json_kind(&other)
        ))),
    }
}

/// Decode one batch element into a command.
///
/// `index` is the element's position in its batch; it is carried in the
/// error so the caller knows how much of the batch ran before the fault.
///
/// # Errors
///
/// [`ProtocolError::InvalidCommand`] when the element is not a known,
/// well-typed command object.
pub fn command_from_value(index: usize, value: Value) -> Result<ClientCommand> {
    serde_json::from_value(value)
        .map_err(|e| ProtocolError::InvalidCommand { index, reason: e.to_string() })
}

/// Decode an entire frame, failing on the first bad element.
///
/// # Errors
///
/// Propagates [`decode_elements`] and [`command_from_value`] errors.
pub fn decode_batch(text: &str) -> Result<Vec<ClientCommand>> {
    decode_elements(text)?
        .into_iter()
        .enumerate()
        .map(|(index, value)| command_from_value(index, value))
        .collect()
}

/// Encode a message batch into one outbound frame.
///
/// # Errors
///
/// [`ProtocolError::Encode`] when serialization fails.
pub fn encode_batch(batch: &[ServerMessage]) -> Result<String> {
    serde_json::to_string(batch).map_err(|e| ProtocolError::Encode(e.to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
