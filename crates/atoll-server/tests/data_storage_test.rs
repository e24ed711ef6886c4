//! Integration tests for the key/value store protocol surface.
//!
//! Covers the reply contract precisely: a `SetReply` goes to every session
//! subscribed to the key plus the writer when it asked for one, and a write
//! to an unsubscribed key with `want_reply: false` produces no reply at all
//! — asserted as absence of actions, not merely left unchecked.

use atoll_proto::ServerMessage;
use atoll_server::{PlayerSlot, RoomConfig, ServerAction, ServerDriver, ServerEvent};
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

fn send_count(actions: &[ServerAction]) -> usize {
    actions
        .iter()
        .filter(|action| matches!(action, ServerAction::SendToSession { .. }))
        .count()
}

fn feed(driver: &mut ServerDriver, session_id: u64, batch: Value) -> Vec<ServerAction> {
    driver
        .process_event(ServerEvent::FrameReceived { session_id, text: batch.to_string() })
        .unwrap()
}

fn connect_as(driver: &mut ServerDriver, session_id: u64, name: &str) {
    driver.process_event(ServerEvent::ConnectionAccepted { session_id }).unwrap();
    feed(
        driver,
        session_id,
        json!([{
            "cmd": "Connect",
            "name": name,
            "password": null,
            "game": "Game",
            "uuid": "test-client",
            "version": {"major": 0, "minor": 6, "build": 3, "class": "Version"},
        }]),
    );
}

fn connect(driver: &mut ServerDriver, session_id: u64) {
    connect_as(driver, session_id, "Player1");
}

fn connected_driver(session_id: u64) -> ServerDriver {
    let mut driver = ServerDriver::new(RoomConfig::default());
    connect(&mut driver, session_id);
    driver
}

fn set_batch(key: &str, default: Value, want_reply: bool, operations: Value) -> Value {
    json!([{
        "cmd": "Set",
        "key": key,
        "default": default,
        "want_reply": want_reply,
        "operations": operations,
    }])
}

fn retrieved_keys(message: &ServerMessage) -> &serde_json::Map<String, Value> {
    match message {
        ServerMessage::Retrieved { keys, .. } => keys,
        other => unreachable!("expected Retrieved, got {other:?}"),
    }
}

#[test]
fn silent_set_then_get_reads_the_written_value() {
    let mut driver = connected_driver(1);

    let set_actions = feed(
        &mut driver,
        1,
        set_batch("k", json!(5), false, json!([{"operation": "replace", "value": 7}])),
    );
    // Unsubscribed key, want_reply false: the write is completely silent.
    assert_eq!(send_count(&set_actions), 0);

    let get_actions = feed(&mut driver, 1, json!([{"cmd": "Get", "keys": ["k"]}]));
    let messages = messages_for_session(&get_actions, 1);
    assert_eq!(retrieved_keys(&messages[0])["k"], json!(7));
}

#[test]
fn get_of_never_written_key_reads_null() {
    let mut driver = connected_driver(1);

    let actions = feed(&mut driver, 1, json!([{"cmd": "Get", "keys": ["ghost"]}]));
    let messages = messages_for_session(&actions, 1);

    assert_eq!(retrieved_keys(&messages[0])["ghost"], Value::Null);
}

#[test]
fn get_echoes_extra_fields_for_correlation() {
    let mut driver = connected_driver(1);

    let actions =
        feed(&mut driver, 1, json!([{"cmd": "Get", "keys": ["k"], "request_id": 42}]));
    let messages = messages_for_session(&actions, 1);

    match &messages[0] {
        ServerMessage::Retrieved { extra, .. } => {
            assert_eq!(extra.get("request_id"), Some(&json!(42)));
        },
        other => unreachable!("expected Retrieved, got {other:?}"),
    }
}

#[test]
fn want_reply_returns_value_and_original_value() {
    let mut driver = connected_driver(1);

    let actions = feed(
        &mut driver,
        1,
        set_batch("k", json!(5), true, json!([{"operation": "replace", "value": 7}])),
    );
    let messages = messages_for_session(&actions, 1);

    match &messages[0] {
        ServerMessage::SetReply { key, value, original_value, slot, .. } => {
            assert_eq!(key, "k");
            assert_eq!(value, &json!(7));
            assert_eq!(original_value, &json!(5));
            assert_eq!(*slot, 1);
        },
        other => unreachable!("expected SetReply, got {other:?}"),
    }
}

#[test]
fn subscriber_hears_writes_even_without_want_reply() {
    // Two distinct slots so the reply provably carries the writer's slot.
    let mut driver = ServerDriver::new(RoomConfig {
        players: vec![
            PlayerSlot { name: "Player1".to_owned(), game: "Game".to_owned() },
            PlayerSlot { name: "Player2".to_owned(), game: "Game".to_owned() },
        ],
        ..RoomConfig::default()
    });
    connect_as(&mut driver, 1, "Player1");
    connect_as(&mut driver, 2, "Player2");

    feed(&mut driver, 1, json!([{"cmd": "SetNotify", "keys": ["k"]}]));

    let actions = feed(
        &mut driver,
        2,
        set_batch("k", json!(0), false, json!([{"operation": "replace", "value": 9}])),
    );

    let to_subscriber = messages_for_session(&actions, 1);
    assert_eq!(to_subscriber.len(), 1);
    match &to_subscriber[0] {
        ServerMessage::SetReply { value, slot, .. } => {
            assert_eq!(value, &json!(9));
            assert_eq!(*slot, 2); // the writer's slot, not the subscriber's
        },
        other => unreachable!("expected SetReply, got {other:?}"),
    }

    // The writer itself asked for nothing and gets nothing.
    assert!(messages_for_session(&actions, 2).is_empty());
}

#[test]
fn subscribed_writer_with_want_reply_gets_exactly_one_reply() {
    let mut driver = connected_driver(1);

    feed(&mut driver, 1, json!([{"cmd": "SetNotify", "keys": ["k"]}]));
    let actions = feed(
        &mut driver,
        1,
        set_batch("k", json!(0), true, json!([{"operation": "replace", "value": 1}])),
    );

    assert_eq!(messages_for_session(&actions, 1).len(), 1);
}

#[test]
fn set_notify_replaces_the_whole_subscription_set() {
    let mut driver = connected_driver(1);
    connect(&mut driver, 2);

    feed(&mut driver, 1, json!([{"cmd": "SetNotify", "keys": ["a"]}]));
    feed(&mut driver, 1, json!([{"cmd": "SetNotify", "keys": ["b"]}]));

    let on_a = feed(&mut driver, 2, set_batch("a", json!(0), false, json!([])));
    assert_eq!(send_count(&on_a), 0);

    let on_b = feed(&mut driver, 2, set_batch("b", json!(0), false, json!([])));
    assert_eq!(messages_for_session(&on_b, 1).len(), 1);
}

#[test]
fn subscriptions_are_per_session() {
    let mut driver = connected_driver(1);
    connect(&mut driver, 2);
    connect(&mut driver, 3);

    feed(&mut driver, 2, json!([{"cmd": "SetNotify", "keys": ["k"]}]));

    let actions = feed(&mut driver, 1, set_batch("k", json!(0), false, json!([])));

    assert!(messages_for_session(&actions, 1).is_empty());
    assert_eq!(messages_for_session(&actions, 2).len(), 1);
    assert!(messages_for_session(&actions, 3).is_empty());
}

#[test]
fn empty_array_sentinel_survives_the_store() {
    let mut driver = connected_driver(1);

    feed(&mut driver, 1, set_batch("list", json!([]), false, json!([])));
    feed(&mut driver, 1, set_batch("map", json!({}), false, json!([])));

    let actions = feed(&mut driver, 1, json!([{"cmd": "Get", "keys": ["list", "map"]}]));
    let messages = messages_for_session(&actions, 1);
    let keys = retrieved_keys(&messages[0]);

    assert!(keys["list"].is_array());
    assert!(keys["map"].is_object());
    assert_ne!(keys["list"], keys["map"]);
}

#[test]
fn operation_chain_applies_in_sequence() {
    let mut driver = connected_driver(1);

    let actions = feed(
        &mut driver,
        1,
        set_batch(
            "k",
            json!(0),
            true,
            json!([
                {"operation": "replace", "value": 5},
                {"operation": "add", "value": 3},
                {"operation": "mul", "value": 2},
            ]),
        ),
    );
    let messages = messages_for_session(&actions, 1);

    match &messages[0] {
        ServerMessage::SetReply { value, original_value, .. } => {
            assert_eq!(value, &json!(16));
            assert_eq!(original_value, &json!(0));
        },
        other => unreachable!("expected SetReply, got {other:?}"),
    }
}

#[test]
fn compact_pair_operations_are_accepted() {
    let mut driver = connected_driver(1);

    let actions = feed(
        &mut driver,
        1,
        set_batch("k", json!(10), true, json!([["add", 5], ["max", 20]])),
    );
    let messages = messages_for_session(&actions, 1);

    match &messages[0] {
        ServerMessage::SetReply { value, .. } => assert_eq!(value, &json!(20)),
        other => unreachable!("expected SetReply, got {other:?}"),
    }
}

#[test]
fn type_mismatched_operation_faults_without_writing() {
    let mut driver = connected_driver(1);
    connect(&mut driver, 2);

    let actions = feed(
        &mut driver,
        1,
        set_batch("k", json!(5), true, json!([{"operation": "add", "value": "three"}])),
    );

    assert_eq!(send_count(&actions), 0);
    assert!(actions.iter().any(|a| matches!(a, ServerAction::CloseConnection { .. })));

    // The failed chain never wrote anything.
    let get_actions = feed(&mut driver, 2, json!([{"cmd": "Get", "keys": ["k"]}]));
    let messages = messages_for_session(&get_actions, 2);
    assert_eq!(retrieved_keys(&messages[0])["k"], Value::Null);
}

#[test]
fn set_reply_echoes_extra_fields() {
    let mut driver = connected_driver(1);

    let actions = feed(
        &mut driver,
        1,
        json!([{
            "cmd": "Set",
            "key": "k",
            "default": 0,
            "want_reply": true,
            "operations": [],
            "tx": "abc",
        }]),
    );
    let messages = messages_for_session(&actions, 1);

    match &messages[0] {
        ServerMessage::SetReply { extra, .. } => {
            assert_eq!(extra.get("tx"), Some(&json!("abc")));
        },
        other => unreachable!("expected SetReply, got {other:?}"),
    }
}
