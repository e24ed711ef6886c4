//! Shared value types carried inside commands and messages.
//!
//! Field names and shapes match the wire exactly; every type here appears
//! verbatim inside at least one command or message object.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client or server software version.
///
/// Serializes with a `class: "Version"` discriminator; decoding rejects
/// objects that lack it or carry a different class string, so a malformed
/// version is a decode error rather than a silently-zeroed triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Major version component.
    pub major: i32,
    /// Minor version component.
    pub minor: i32,
    /// Build/patch version component.
    pub build: i32,
    #[serde(rename = "class")]
    class: VersionClass,
}

impl Version {
    /// Create a version triple.
    pub fn new(major: i32, minor: i32, build: i32) -> Self {
        Self { major, minor, build, class: VersionClass::Version }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}

/// Wire discriminator for [`Version`]; always the string `"Version"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum VersionClass {
    Version,
}

/// One item-grant record: a unit of progress delivered to a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkItem {
    /// Item identifier.
    pub item: i64,
    /// Location the item was found at.
    pub location: i64,
    /// Slot of the player the record concerns.
    pub player: i32,
    /// Classification bitmask (progression, useful, trap).
    pub flags: i32,
}

/// One player entry in the `Connected.players` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPlayer {
    /// Team index; this server runs a single team 0.
    pub team: i32,
    /// 1-based player slot.
    pub slot: i32,
    /// Display alias; equals `name` unless the player set one.
    pub alias: String,
    /// Canonical slot name used to authenticate.
    pub name: String,
}

/// Per-slot metadata in the `Connected.slot_info` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSlot {
    /// Canonical slot name.
    pub name: String,
    /// Game this slot is playing.
    pub game: String,
    /// Slot type discriminator (1 = player).
    #[serde(rename = "type")]
    pub kind: i32,
    /// Member slots when this slot is an item-link group.
    pub group_members: Vec<i32>,
}

/// Room permission flags announced in `RoomInfo`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    /// Whether players may release their remaining items on goal.
    pub release: i32,
    /// Whether players may collect their items from other worlds on goal.
    pub collect: i32,
    /// Whether players may query remaining item counts.
    pub remaining: i32,
}

/// Error codes accumulated during the `Connect` handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectError {
    /// The requested slot name is not part of this room.
    InvalidSlot,
    /// The room requires a password and the supplied one did not match.
    InvalidPassword,
    /// The `game` field was missing or empty.
    InvalidGame,
}

/// One node of a `PrintJSON` rich-text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextNode {
    /// Literal text content.
    pub text: String,
}

impl TextNode {
    /// Create a plain text node.
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Data-store operation kinds, applied in sequence by `Set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Discard the current value, use the operand.
    Replace,
    /// Keep the current value (which already fell back to the `Set`
    /// default when the key was absent); the operand is ignored.
    Default,
    /// Numeric addition, or list concatenation when both sides are arrays.
    Add,
    /// Numeric multiplication.
    Mul,
    /// Raise the current value to the operand's power.
    Pow,
    /// Remainder of dividing the current value by the operand.
    Mod,
    /// Round the current value down; the operand is ignored.
    Floor,
    /// Round the current value up; the operand is ignored.
    Ceil,
    /// Keep the larger of current value and operand.
    Max,
    /// Keep the smaller of current value and operand.
    Min,
    /// Bitwise AND over integers.
    And,
    /// Bitwise OR over integers.
    Or,
    /// Bitwise XOR over integers.
    Xor,
    /// Shift the current integer left by the operand.
    LeftShift,
    /// Shift the current integer right by the operand.
    RightShift,
    /// Remove the first list element equal to the operand.
    Remove,
    /// Remove a list index or mapping key named by the operand.
    Pop,
    /// Merge the operand mapping into the current mapping.
    Update,
}

impl OperationKind {
    /// Wire name of the operation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Default => "default",
            Self::Add => "add",
            Self::Mul => "mul",
            Self::Pow => "pow",
            Self::Mod => "mod",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Max => "max",
            Self::Min => "min",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::LeftShift => "left_shift",
            Self::RightShift => "right_shift",
            Self::Remove => "remove",
            Self::Pop => "pop",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a `Set` operation chain.
///
/// The wire accepts two encodings: the canonical object form
/// `{"operation": "add", "value": 2}` and the compact pair form
/// `["add", 2]`. Serialization always produces the object form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OperationRepr")]
pub struct DataOperation {
    /// Which operation to apply.
    #[serde(rename = "operation")]
    pub kind: OperationKind,
    /// Operand consumed by the operation; ignored by `default`, `floor`
    /// and `ceil` but required on the wire for every kind.
    pub value: Value,
}

impl DataOperation {
    /// Create an operation step.
    pub fn new(kind: OperationKind, value: Value) -> Self {
        Self { kind, value }
    }
}

/// Accepted wire encodings of a [`DataOperation`].
#[derive(Deserialize)]
#[serde(untagged)]
enum OperationRepr {
    Object {
        operation: OperationKind,
        value: Value,
    },
    Pair(OperationKind, Value),
}

impl From<OperationRepr> for DataOperation {
    fn from(repr: OperationRepr) -> Self {
        match repr {
            OperationRepr::Object { operation, value } | OperationRepr::Pair(operation, value) => {
                Self { kind: operation, value }
            },
        }
    }
}
