//! Client-to-server commands.
//!
//! Every inbound object decodes into one [`ClientCommand`] variant via the
//! `cmd` discriminator. Unknown discriminators and ill-typed fields are
//! decode errors — the server treats both as protocol faults rather than
//! guessing at intent.
//!
//! Optional fields follow the protocol's tri-state convention where it
//! matters: for `ConnectUpdate`, an absent or null field means "leave
//! unchanged", not "reset".

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{DataOperation, Version};

/// A single client command, discriminated by its `cmd` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum ClientCommand {
    /// Authenticate this connection into a player slot.
    Connect {
        /// Slot name to authenticate as.
        name: String,
        /// Room password; null when the room is open.
        password: Option<String>,
        /// Game the client is playing; empty or missing refuses with
        /// `InvalidGame`.
        game: Option<String>,
        /// Opaque client instance identifier.
        uuid: String,
        /// Client software version.
        version: Version,
        /// Item-notification bitmask; defaults to 0 when absent.
        items_handling: Option<i64>,
        /// Capability tags; defaults to empty when absent.
        tags: Option<Vec<String>>,
    },

    /// Update mutable session fields after authentication.
    ConnectUpdate {
        /// New item-notification bitmask, or null to leave unchanged.
        items_handling: Option<i64>,
        /// New capability tags, or null to leave unchanged.
        tags: Option<Vec<String>>,
    },

    /// Re-request the full item queue from index 0.
    Sync,

    /// Report locations newly checked by this player.
    LocationChecks {
        /// Location ids in the order they were checked.
        locations: Vec<i64>,
    },

    /// Ask what the given locations contain without checking them.
    LocationScouts {
        /// Location ids to scout.
        locations: Vec<i64>,
        /// Hint-creation mode; 0 scouts silently in the full protocol.
        #[serde(default)]
        create_as_hint: i64,
    },

    /// Read values from the shared data store.
    Get {
        /// Keys to read.
        keys: Vec<String>,
        /// Caller-supplied correlation fields, echoed back in `Retrieved`.
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    /// Apply an operation chain to one data-store key.
    Set {
        /// Key to mutate.
        key: String,
        /// Value to start from when the key has never been written.
        default: Value,
        /// Request a `SetReply` even without an active subscription.
        want_reply: bool,
        /// Operations applied in sequence, each consuming the prior result.
        operations: Vec<DataOperation>,
        /// Caller-supplied correlation fields, echoed back in `SetReply`.
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    /// Replace this session's set of change-notification keys.
    SetNotify {
        /// Keys whose future writes should produce a `SetReply`.
        keys: Vec<String>,
    },

    /// Report client progress status.
    StatusUpdate {
        /// New status code; stored as-is.
        status: i64,
    },

    /// Send a chat line to the room.
    Say {
        /// Chat text.
        text: String,
    },

    /// Relay an opaque payload to a filtered set of sessions.
    Bounce {
        /// Deliver to sessions whose slot plays one of these games.
        #[serde(default)]
        games: Vec<String>,
        /// Deliver to sessions authenticated into one of these slots.
        #[serde(default)]
        slots: Vec<i32>,
        /// Deliver to sessions carrying one of these tags.
        #[serde(default)]
        tags: Vec<String>,
        /// Opaque payload, echoed verbatim.
        data: Value,
    },

    /// Request per-game metadata packages.
    GetDataPackage {
        /// Games to fetch; absent or empty means every game in the room.
        games: Option<Vec<String>>,
    },

    /// Change the status of an existing hint.
    UpdateHint {
        /// Slot that owns the hint.
        player: i32,
        /// Hinted location id.
        location: i64,
        /// New hint status code.
        status: i64,
    },

    /// Create hints for the given locations.
    CreateHints {
        /// Location ids to hint; must be non-empty.
        locations: Vec<i64>,
        /// Slot the locations belong to; defaults to the caller.
        player: Option<i32>,
        /// Initial hint status code.
        status: Option<i64>,
    },
}
