//! Server-to-client messages.
//!
//! Mirrors [`crate::command`]: every outbound object carries a `cmd`
//! discriminator and decodes into one [`ServerMessage`] variant. Clients
//! decode these; the server only encodes them, but both directions are
//! derived so tests and client bindings share one definition.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{
    ConnectError, NetworkItem, NetworkPlayer, NetworkSlot, Permissions, TextNode, Version,
};

/// Per-game metadata payload of a `DataPackage` message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPackageData {
    /// Game name to metadata object. This server serves empty metadata;
    /// the shape is what clients key their caches on.
    pub games: BTreeMap<String, Value>,
}

/// A single server message, discriminated by its `cmd` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum ServerMessage {
    /// Room description, sent unconditionally when a socket opens.
    RoomInfo {
        /// Seed identifier for the generated multiworld.
        seed_name: String,
        /// Server wall-clock time, Unix seconds.
        time: f64,
        /// Server protocol version.
        version: Version,
        /// Server capability tags.
        tags: Vec<String>,
        /// Hint price as a percentage of a world's total locations.
        hint_cost: i64,
        /// Sorted, deduplicated list of games present in the room.
        games: Vec<String>,
        /// Room permission flags.
        permissions: Permissions,
    },

    /// Successful authentication response.
    Connected {
        /// Team index of the authenticated slot.
        team: i32,
        /// Slot the session authenticated into.
        slot: i32,
        /// All players in the room.
        players: Vec<NetworkPlayer>,
        /// Location ids this slot has not checked yet.
        missing_locations: Vec<i64>,
        /// Location ids this slot has already checked.
        checked_locations: Vec<i64>,
        /// Per-slot metadata keyed by decimal slot number.
        slot_info: BTreeMap<String, NetworkSlot>,
        /// Hint points available to this slot.
        hint_points: i64,
    },

    /// Failed authentication response; the session stays unauthenticated.
    ConnectionRefused {
        /// Every validation error found, in validation order.
        errors: Vec<ConnectError>,
    },

    /// A contiguous run of item-grant records from the slot's queue.
    ReceivedItems {
        /// Queue index of the first record in `items`.
        index: i64,
        /// The records themselves, in queue order.
        items: Vec<NetworkItem>,
    },

    /// Incremental room state change.
    RoomUpdate {
        /// Locations now checked, when a check triggered the update.
        #[serde(skip_serializing_if = "Option::is_none")]
        checked_locations: Option<Vec<i64>>,
        /// New permission flags, when permissions changed.
        #[serde(skip_serializing_if = "Option::is_none")]
        permissions: Option<Permissions>,
    },

    /// Scout results: what the requested locations contain.
    LocationInfo {
        /// One record per scouted location, in request order.
        locations: Vec<NetworkItem>,
    },

    /// Data-store read results.
    Retrieved {
        /// Requested keys mapped to their values; never-written keys
        /// read as null.
        keys: Map<String, Value>,
        /// Correlation fields echoed from the `Get`.
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    /// Data-store change notification.
    SetReply {
        /// Key that changed.
        key: String,
        /// Value after the operation chain.
        value: Value,
        /// Value before the operation chain (post default-resolution).
        original_value: Value,
        /// Slot whose `Set` performed the write.
        slot: i32,
        /// Correlation fields echoed from the `Set`.
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    /// Per-game metadata packages.
    DataPackage {
        /// The package payload.
        data: DataPackageData,
    },

    /// A relayed `Bounce`, delivered to every matching session.
    Bounced {
        /// Game filter the sender supplied.
        games: Vec<String>,
        /// Slot filter the sender supplied.
        slots: Vec<i32>,
        /// Tag filter the sender supplied.
        tags: Vec<String>,
        /// Opaque payload, echoed verbatim.
        data: Value,
    },

    /// Rich-text message (chat, hints).
    #[serde(rename = "PrintJSON")]
    PrintJson {
        /// Text nodes composing the message.
        data: Vec<TextNode>,
        /// Message-kind specific fields (type, receiving player, item).
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    /// Legacy plain-text message.
    Print {
        /// Message text.
        text: String,
    },
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn print_json_uses_uppercase_wire_tag() {
        let msg = ServerMessage::PrintJson {
            data: vec![TextNode::text("hello")],
            extra: Map::new(),
        };
        let encoded = serde_json::to_value(&msg).unwrap();
        assert_eq!(encoded, json!({"cmd": "PrintJSON", "data": [{"text": "hello"}]}));
    }

    #[test]
    fn room_update_omits_absent_fields() {
        let msg = ServerMessage::RoomUpdate {
            checked_locations: Some(vec![4, 5]),
            permissions: None,
        };
        let encoded = serde_json::to_value(&msg).unwrap();
        assert_eq!(encoded, json!({"cmd": "RoomUpdate", "checked_locations": [4, 5]}));
    }

    #[test]
    fn retrieved_flattens_extra_fields() {
        let mut keys = Map::new();
        keys.insert("k".to_owned(), json!(7));
        let mut extra = Map::new();
        extra.insert("request_id".to_owned(), json!(3));

        let encoded =
            serde_json::to_value(ServerMessage::Retrieved { keys, extra }).unwrap();
        assert_eq!(
            encoded,
            json!({"cmd": "Retrieved", "keys": {"k": 7}, "request_id": 3})
        );
    }

    #[test]
    fn empty_array_value_stays_distinct_from_empty_object() {
        let array = ServerMessage::SetReply {
            key: "k".to_owned(),
            value: json!([]),
            original_value: json!({}),
            slot: 1,
            extra: Map::new(),
        };
        let encoded = serde_json::to_string(&array).unwrap();
        assert!(encoded.contains(r#""value":[]"#));
        assert!(encoded.contains(r#""original_value":{}"#));

        let decoded: ServerMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, array);
    }
}
