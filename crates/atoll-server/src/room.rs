//! Room state: the players, their item queues, and checked locations.
//!
//! One room per process. The player list is fixed at startup; everything
//! else grows as connected clients report progress. Item-queue indices are
//! stable — once a record has been sent at index N, element N never changes,
//! which is what lets clients resynchronize by index alone.

use std::collections::{BTreeMap, BTreeSet};

use atoll_proto::types::{NetworkItem, NetworkPlayer, NetworkSlot, Permissions, Version};

/// One player slot registered in the room.
#[derive(Debug, Clone)]
pub struct PlayerSlot {
    /// Canonical slot name used to authenticate.
    pub name: String,
    /// Game this slot is playing.
    pub game: String,
}

/// Static room configuration, fixed at startup.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Seed identifier announced in `RoomInfo`.
    pub seed_name: String,
    /// Room password; `None` accepts any client.
    pub password: Option<String>,
    /// Server protocol version announced in `RoomInfo`.
    pub server_version: Version,
    /// Server capability tags announced in `RoomInfo`.
    pub server_tags: Vec<String>,
    /// Hint price as a percentage of a world's total locations.
    pub hint_cost: i64,
    /// Hint points granted to every slot.
    pub hint_points: i64,
    /// Room permission flags.
    pub permissions: Permissions,
    /// Player slots, in slot order (slot N is `players[N - 1]`).
    pub players: Vec<PlayerSlot>,
    /// Initial item queue per slot; missing entries start empty.
    pub start_items: Vec<Vec<NetworkItem>>,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            seed_name: "seed".to_owned(),
            password: None,
            server_version: Version::new(0, 6, 3),
            server_tags: Vec::new(),
            hint_cost: 50,
            hint_points: 7,
            permissions: Permissions::default(),
            players: vec![PlayerSlot { name: "Player1".to_owned(), game: "Game".to_owned() }],
            start_items: vec![vec![NetworkItem { item: 1, location: 1, player: 1, flags: 1 }]],
        }
    }
}

/// Mutable room state shared by every connection.
#[derive(Debug)]
pub struct RoomState {
    config: RoomConfig,
    /// Per-slot item queues, indexed by slot - 1. Append-only.
    item_queues: Vec<Vec<NetworkItem>>,
    /// Per-slot sets of already-checked location ids.
    checked: Vec<BTreeSet<i64>>,
}

impl RoomState {
    /// Create room state from configuration.
    ///
    /// Start-item lists beyond the player count are dropped; slots without
    /// one begin with an empty queue.
    pub fn new(config: RoomConfig) -> Self {
        let slots = config.players.len();
        let mut item_queues = config.start_items.clone();
        item_queues.truncate(slots);
        item_queues.resize_with(slots, Vec::new);
        let checked = vec![BTreeSet::new(); slots];
        Self { config, item_queues, checked }
    }

    /// Room configuration.
    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Resolve a slot name to its 1-based slot number.
    pub fn slot_by_name(&self, name: &str) -> Option<i32> {
        self.config
            .players
            .iter()
            .position(|player| player.name == name)
            .map(|index| index as i32 + 1)
    }

    /// Player registered at a 1-based slot number.
    pub fn player(&self, slot: i32) -> Option<&PlayerSlot> {
        self.slot_index(slot).map(|index| &self.config.players[index])
    }

    /// Sorted, deduplicated list of games present in the room.
    pub fn games(&self) -> Vec<String> {
        let set: BTreeSet<&str> =
            self.config.players.iter().map(|player| player.game.as_str()).collect();
        set.into_iter().map(str::to_owned).collect()
    }

    /// A slot's full item queue, empty for unknown slots.
    pub fn items(&self, slot: i32) -> &[NetworkItem] {
        self.slot_index(slot).map_or(&[], |index| self.item_queues[index].as_slice())
    }

    /// Location ids a slot has already checked, in ascending order.
    pub fn checked_locations(&self, slot: i32) -> Vec<i64> {
        self.slot_index(slot)
            .map(|index| self.checked[index].iter().copied().collect())
            .unwrap_or_default()
    }

    /// Record a location check for a slot.
    ///
    /// Appends an item-grant record to the slot's queue and returns it with
    /// its queue index. Returns `None` when the location was already
    /// checked (or the slot is unknown) — repeat checks never grant twice.
    pub fn check_location(&mut self, slot: i32, location: i64) -> Option<(usize, NetworkItem)> {
        let index = self.slot_index(slot)?;
        if !self.checked[index].insert(location) {
            return None;
        }

        let item = NetworkItem { item: location, location, player: slot, flags: 0 };
        self.item_queues[index].push(item);
        Some((self.item_queues[index].len() - 1, item))
    }

    /// All players as wire entries, in slot order.
    pub fn players_list(&self) -> Vec<NetworkPlayer> {
        self.config
            .players
            .iter()
            .enumerate()
            .map(|(index, player)| NetworkPlayer {
                team: 0,
                slot: index as i32 + 1,
                alias: player.name.clone(),
                name: player.name.clone(),
            })
            .collect()
    }

    /// Per-slot metadata keyed by decimal slot number.
    pub fn slot_info(&self) -> BTreeMap<String, NetworkSlot> {
        self.config
            .players
            .iter()
            .enumerate()
            .map(|(index, player)| {
                (
                    (index + 1).to_string(),
                    NetworkSlot {
                        name: player.name.clone(),
                        game: player.game.clone(),
                        kind: 1,
                        group_members: Vec::new(),
                    },
                )
            })
            .collect()
    }

    fn slot_index(&self, slot: i32) -> Option<usize> {
        if slot < 1 {
            return None;
        }
        let index = slot as usize - 1;
        (index < self.config.players.len()).then_some(index)
    }
}
