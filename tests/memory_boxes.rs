//! Shared memory boxes and the transcript helpers built on top of them.

use ici_chat::memory::MemoryBoxes;
use ici_chat::memory::message::{self, format_grouped, group_by_sender, normalize_messages};
use serde_json::{Value, json};

fn msg(ts: i64, q: &str) -> Value {
    json!({ "ts": ts, "q": q })
}

// ===========================================================================
// Env-boxes
// ===========================================================================

#[test]
fn unknown_env_box_is_empty() {
    let boxes = MemoryBoxes::new();
    let snap = boxes.env_box("env-a");
    assert_eq!(snap.env_id, "env-a");
    assert!(snap.value.is_empty());
    assert!(snap.last_updated.is_none());
}

#[test]
fn replace_overwrites_previous_contents() {
    let boxes = MemoryBoxes::new();
    assert_eq!(boxes.replace_env_box("env-a", vec![msg(1, "one"), msg(2, "two")]), 2);
    assert_eq!(boxes.replace_env_box("env-a", vec![msg(3, "three")]), 1);

    let snap = boxes.env_box("env-a");
    assert_eq!(snap.value, vec![msg(3, "three")]);
    assert!(snap.last_updated.is_some());
}

#[test]
fn boxes_are_isolated_per_env() {
    let boxes = MemoryBoxes::new();
    boxes.replace_env_box("env-a", vec![msg(1, "a")]);
    boxes.replace_env_box("env-b", vec![msg(1, "b")]);
    assert_eq!(boxes.env_box("env-a").value, vec![msg(1, "a")]);
    assert_eq!(boxes.env_box("env-b").value, vec![msg(1, "b")]);
}

#[test]
fn append_deduplicates_by_ts_and_q() {
    let boxes = MemoryBoxes::new();
    assert!(boxes.append_env_box("env-a", vec![msg(1, "hello"), msg(2, "world")]));
    assert!(!boxes.append_env_box("env-a", vec![msg(1, "hello")]));
    assert!(boxes.append_env_box("env-a", vec![msg(1, "hello"), msg(3, "again")]));

    let value = boxes.env_box("env-a").value;
    assert_eq!(value, vec![msg(1, "hello"), msg(2, "world"), msg(3, "again")]);
}

#[test]
fn append_skips_messages_without_identity() {
    let boxes = MemoryBoxes::new();
    let updated = boxes.append_env_box("env-a", vec![json!({ "text": "no ts" }), json!("bare")]);
    assert!(!updated);
    assert!(boxes.env_box("env-a").value.is_empty());
}

#[test]
fn aggregate_merges_environments_in_time_order() {
    let boxes = MemoryBoxes::new();
    boxes.replace_env_box("env-a", vec![msg(30, "late"), msg(10, "early")]);
    boxes.replace_env_box("env-b", vec![msg(20, "middle"), msg(10, "early")]);

    let all = boxes.env_box_aggregate();
    assert_eq!(all, vec![msg(10, "early"), msg(20, "middle"), msg(30, "late")]);
}

// ===========================================================================
// Ip-boxes
// ===========================================================================

#[test]
fn ip_boxes_are_keyed_by_env_and_address() {
    let boxes = MemoryBoxes::new();
    boxes.replace_ip_box("env-a", "10.0.0.1", vec![msg(1, "first")]);
    boxes.replace_ip_box("env-a", "10.0.0.2", vec![msg(1, "second")]);

    let snap = boxes.ip_box("env-a", "10.0.0.1");
    assert_eq!(snap.public_ip.as_deref(), Some("10.0.0.1"));
    assert_eq!(snap.value, vec![msg(1, "first")]);
    assert!(boxes.ip_box("env-b", "10.0.0.1").value.is_empty());

    let all = boxes.all_ip_boxes();
    assert_eq!(all.len(), 2);
    assert!(all.contains_key("env-a_10.0.0.1"));
    assert!(all.contains_key("env-a_10.0.0.2"));
}

#[test]
fn clear_all_drops_both_kinds() {
    let boxes = MemoryBoxes::new();
    boxes.replace_env_box("env-a", vec![msg(1, "x")]);
    boxes.replace_ip_box("env-a", "10.0.0.1", vec![msg(1, "y")]);
    boxes.clear_all();
    assert!(boxes.all_env_boxes().is_empty());
    assert!(boxes.all_ip_boxes().is_empty());
}

// ===========================================================================
// Message helpers
// ===========================================================================

#[test]
fn accessors_read_old_and_new_shapes() {
    let old = json!({ "q": "hi there", "ts": 5 });
    let new = json!({ "text": "hello", "user": "Ana", "timestamp": 1700000000000_i64 });

    assert_eq!(message::content(&old).as_deref(), Some("hi there"));
    assert_eq!(message::sender(&old), "Unknown");
    assert_eq!(message::time(&old), 5.0);

    assert_eq!(message::content(&new).as_deref(), Some("hello"));
    assert_eq!(message::sender(&new), "Ana");
    assert_eq!(message::time(&new), 1_700_000_000_000.0);
    assert_eq!(message::dedup_key(&new), None);
    assert_eq!(message::dedup_key(&old).as_deref(), Some("5:hi there"));
}

#[test]
fn normalize_drops_blank_and_non_object_messages() {
    let raw = vec![
        json!({ "text": "keep", "user": "Ana" }),
        json!({ "text": "   " }),
        json!("a bare string"),
        json!({ "user": "Ben" }),
    ];
    let normalized = normalize_messages(&raw);
    assert_eq!(normalized.len(), 1);
    assert_eq!(normalized[0].text, "keep");
    assert_eq!(normalized[0].user, "Ana");
}

#[test]
fn transcript_groups_consecutive_senders() {
    let raw = vec![
        json!({ "text": "hi", "user": "Ana", "timestamp": 1 }),
        json!({ "text": "how are you", "user": "Ana", "timestamp": 2 }),
        json!({ "text": "good", "user": "Ben", "timestamp": 3 }),
        json!({ "text": "great", "user": "Ana", "timestamp": 4 }),
    ];
    let groups = group_by_sender(&normalize_messages(&raw));
    assert_eq!(groups.len(), 3);
    assert_eq!(groups[0].sender, "Ana");
    assert_eq!(groups[0].messages.len(), 2);
    assert_eq!(groups[0].timestamp, 1.0);

    assert_eq!(
        format_grouped(&groups),
        "Ana:\n  hi\n  how are you\n\nBen:\n  good\n\nAna:\n  great"
    );
}
