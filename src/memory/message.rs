//! Accessors over free-form chat messages.
//!
//! Boxes store whatever JSON the browser sends. Older clients write
//! `{q, ts}`, newer ones `{text, user, timestamp}`; these helpers read
//! either shape.

use serde::Serialize;
use serde_json::Value;

const CONTENT_FIELDS: &[&str] = &["text", "q", "message"];
const SENDER_FIELDS: &[&str] = &["user", "sender"];
const TIME_FIELDS: &[&str] = &["timestamp", "ts"];

/// First non-empty content field, stringified.
pub fn content(msg: &Value) -> Option<String> {
    CONTENT_FIELDS
        .iter()
        .filter_map(|f| msg.get(*f))
        .find(|v| is_truthy(v))
        .map(value_to_string)
}

pub fn sender(msg: &Value) -> String {
    SENDER_FIELDS
        .iter()
        .filter_map(|f| msg.get(*f))
        .find(|v| is_truthy(v))
        .map(value_to_string)
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Message time in the sender's units (ms for new clients), 0 when absent.
pub fn time(msg: &Value) -> f64 {
    TIME_FIELDS
        .iter()
        .filter_map(|f| msg.get(*f))
        .find_map(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .unwrap_or(0.0)
}

/// `"ts:q"` identity used to deduplicate appended messages. Only messages
/// carrying both fields have one.
pub fn dedup_key(msg: &Value) -> Option<String> {
    let ts = msg.get("ts")?;
    let q = msg.get("q")?;
    Some(format!("{}:{}", value_to_string(ts), value_to_string(q)))
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
    }
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A message reduced to the fields the transcript view needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedMessage {
    pub text: String,
    pub user: String,
    pub timestamp: f64,
}

/// Keep only object messages with non-blank content.
pub fn normalize_messages(messages: &[Value]) -> Vec<NormalizedMessage> {
    messages
        .iter()
        .filter(|m| m.is_object())
        .filter_map(|m| {
            let text = content(m)?;
            if text.trim().is_empty() {
                return None;
            }
            Some(NormalizedMessage {
                text,
                user: sender(m),
                timestamp: time(m),
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedLine {
    pub text: String,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageGroup {
    pub sender: String,
    pub timestamp: f64,
    pub messages: Vec<GroupedLine>,
}

/// Collapse consecutive messages from the same sender.
pub fn group_by_sender(messages: &[NormalizedMessage]) -> Vec<MessageGroup> {
    let mut groups: Vec<MessageGroup> = Vec::new();
    for msg in messages {
        let line = GroupedLine {
            text: msg.text.clone(),
            timestamp: msg.timestamp,
        };
        match groups.last_mut() {
            Some(group) if group.sender == msg.user => group.messages.push(line),
            _ => groups.push(MessageGroup {
                sender: msg.user.clone(),
                timestamp: msg.timestamp,
                messages: vec![line],
            }),
        }
    }
    groups
}

pub fn format_grouped(groups: &[MessageGroup]) -> String {
    let mut lines = Vec::new();
    for (i, group) in groups.iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        lines.push(format!("{}:", group.sender));
        for msg in &group.messages {
            lines.push(format!("  {}", msg.text));
        }
    }
    lines.join("\n")
}
