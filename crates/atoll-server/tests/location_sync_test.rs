//! Integration tests for location checks, scouts and item resync.
//!
//! The ordering contract under test: per slot, `ReceivedItems` indices form
//! a contiguous strictly-increasing sequence from 0, and an element sent at
//! index N never changes afterwards.

use atoll_proto::ServerMessage;
use atoll_server::{RoomConfig, ServerAction, ServerDriver, ServerEvent};
use serde_json::{Value, json};

fn messages_for_session(actions: &[ServerAction], target: u64) -> Vec<ServerMessage> {
    actions
        .iter()
        .filter_map(|action| match action {
            ServerAction::SendToSession { session_id, message } if *session_id == target => {
                Some(message.clone())
            },
            _ => None,
        })
        .collect()
}

fn feed(driver: &mut ServerDriver, session_id: u64, batch: Value) -> Vec<ServerAction> {
    driver
        .process_event(ServerEvent::FrameReceived { session_id, text: batch.to_string() })
        .unwrap()
}

/// Accept a connection and authenticate it into slot 1.
fn connected_driver(session_id: u64) -> ServerDriver {
    let mut driver = ServerDriver::new(RoomConfig::default());
    connect(&mut driver, session_id);
    driver
}

fn connect(driver: &mut ServerDriver, session_id: u64) {
    driver.process_event(ServerEvent::ConnectionAccepted { session_id }).unwrap();
    feed(
        driver,
        session_id,
        json!([{
            "cmd": "Connect",
            "name": "Player1",
            "password": null,
            "game": "Game",
            "uuid": "test-client",
            "version": {"major": 0, "minor": 6, "build": 3, "class": "Version"},
        }]),
    );
}

fn received_indices(messages: &[ServerMessage]) -> Vec<i64> {
    messages
        .iter()
        .filter_map(|message| match message {
            ServerMessage::ReceivedItems { index, .. } => Some(*index),
            _ => None,
        })
        .collect()
}

#[test]
fn checks_grow_the_queue_with_contiguous_indices() {
    let mut driver = connected_driver(1);

    let actions =
        feed(&mut driver, 1, json!([{"cmd": "LocationChecks", "locations": [100, 101, 102]}]));
    let messages = messages_for_session(&actions, 1);

    // One start item occupies index 0, so new grants begin at 1.
    assert_eq!(received_indices(&messages), vec![1, 2, 3]);

    for message in &messages {
        if let ServerMessage::ReceivedItems { items, .. } = message {
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].item, items[0].location);
            assert_eq!(items[0].player, 1);
            assert_eq!(items[0].flags, 0);
        }
    }

    match messages.last() {
        Some(ServerMessage::RoomUpdate { checked_locations, .. }) => {
            assert_eq!(checked_locations, &Some(vec![100, 101, 102]));
        },
        other => unreachable!("expected trailing RoomUpdate, got {other:?}"),
    }
}

#[test]
fn repeat_checks_grant_nothing_new() {
    let mut driver = connected_driver(1);
    feed(&mut driver, 1, json!([{"cmd": "LocationChecks", "locations": [100, 101]}]));

    let actions =
        feed(&mut driver, 1, json!([{"cmd": "LocationChecks", "locations": [100, 103]}]));
    let messages = messages_for_session(&actions, 1);

    // Only 103 is new; 100 was already checked.
    assert_eq!(received_indices(&messages), vec![3]);

    // The RoomUpdate still reports the full requested list.
    match messages.last() {
        Some(ServerMessage::RoomUpdate { checked_locations, .. }) => {
            assert_eq!(checked_locations, &Some(vec![100, 103]));
        },
        other => unreachable!("expected trailing RoomUpdate, got {other:?}"),
    }
}

#[test]
fn sync_resends_the_full_queue_from_index_zero() {
    let mut driver = connected_driver(1);
    feed(&mut driver, 1, json!([{"cmd": "LocationChecks", "locations": [100, 101, 102]}]));

    let actions = feed(&mut driver, 1, json!([{"cmd": "Sync"}]));
    let messages = messages_for_session(&actions, 1);

    match &messages[0] {
        ServerMessage::ReceivedItems { index, items } => {
            assert_eq!(*index, 0);
            assert_eq!(items.len(), 4); // start item + three checks
            assert_eq!(items[1].location, 100);
            assert_eq!(items[3].location, 102);
        },
        other => unreachable!("expected ReceivedItems, got {other:?}"),
    }
}

#[test]
fn scouts_describe_locations_without_checking_them() {
    let mut driver = connected_driver(1);

    let actions =
        feed(&mut driver, 1, json!([{"cmd": "LocationScouts", "locations": [200, 201]}]));
    let messages = messages_for_session(&actions, 1);

    // One hint text per scouted location, then the location info.
    let hint_count = messages
        .iter()
        .filter(|message| matches!(message, ServerMessage::PrintJson { .. }))
        .count();
    assert_eq!(hint_count, 2);

    match messages.last() {
        Some(ServerMessage::LocationInfo { locations }) => {
            assert_eq!(locations.len(), 2);
            assert_eq!(locations[0].location, 200);
            assert_eq!(locations[1].location, 201);
        },
        other => unreachable!("expected LocationInfo, got {other:?}"),
    }

    // Scouting never grants: the queue still holds only the start item.
    let sync = feed(&mut driver, 1, json!([{"cmd": "Sync"}]));
    match &messages_for_session(&sync, 1)[0] {
        ServerMessage::ReceivedItems { items, .. } => assert_eq!(items.len(), 1),
        other => unreachable!("expected ReceivedItems, got {other:?}"),
    }

    // A later check of a scouted location still grants normally.
    let check = feed(&mut driver, 1, json!([{"cmd": "LocationChecks", "locations": [200]}]));
    assert_eq!(received_indices(&messages_for_session(&check, 1)), vec![1]);
}

#[test]
fn deltas_go_only_to_the_checking_session() {
    let mut driver = connected_driver(1);
    connect(&mut driver, 2);

    let actions = feed(&mut driver, 1, json!([{"cmd": "LocationChecks", "locations": [100]}]));

    assert_eq!(received_indices(&messages_for_session(&actions, 1)), vec![1]);
    assert!(messages_for_session(&actions, 2).is_empty());
}

#[test]
fn update_hint_emits_placeholder_text() {
    let mut driver = connected_driver(1);

    let actions = feed(
        &mut driver,
        1,
        json!([{"cmd": "UpdateHint", "player": 1, "location": 100, "status": 1}]),
    );
    let messages = messages_for_session(&actions, 1);

    assert!(matches!(messages[0], ServerMessage::PrintJson { .. }));
}

#[test]
fn update_hint_with_non_integer_argument_faults() {
    let mut driver = connected_driver(1);

    let actions = feed(
        &mut driver,
        1,
        json!([{"cmd": "UpdateHint", "player": 1, "location": "here", "status": 1}]),
    );

    assert!(messages_for_session(&actions, 1).is_empty());
    assert!(actions.iter().any(|a| matches!(a, ServerAction::CloseConnection { .. })));
}

#[test]
fn create_hints_requires_locations() {
    let mut driver = connected_driver(1);

    let empty = feed(
        &mut driver,
        1,
        json!([{"cmd": "CreateHints", "locations": [], "player": 1, "status": 0}]),
    );
    assert!(empty.iter().any(|a| matches!(a, ServerAction::CloseConnection { .. })));

    let mut driver = connected_driver(1);
    let ok = feed(&mut driver, 1, json!([{"cmd": "CreateHints", "locations": [100]}]));
    let messages = messages_for_session(&ok, 1);
    assert!(matches!(messages[0], ServerMessage::PrintJson { .. }));
}
