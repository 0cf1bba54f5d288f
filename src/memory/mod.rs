pub mod message;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use serde_json::Value;

use crate::clock::now_millis;

/// One stored box as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxSnapshot {
    pub env_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
    pub value: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<f64>,
}

#[derive(Debug, Clone, Default)]
struct StoredBox {
    value: Vec<Value>,
    last_updated: f64,
}

type IpKey = (String, String);

/// Process-local shared memory: env-boxes keyed by env id and ip-boxes
/// keyed by `(env_id, public_ip)`. Nothing here survives a restart.
#[derive(Default)]
pub struct MemoryBoxes {
    env: RwLock<HashMap<String, StoredBox>>,
    ip: RwLock<HashMap<IpKey, StoredBox>>,
}

impl MemoryBoxes {
    pub fn new() -> Self {
        Self::default()
    }

    fn env_read(&self) -> RwLockReadGuard<'_, HashMap<String, StoredBox>> {
        self.env.read().unwrap_or_else(|e| e.into_inner())
    }

    fn env_write(&self) -> RwLockWriteGuard<'_, HashMap<String, StoredBox>> {
        self.env.write().unwrap_or_else(|e| e.into_inner())
    }

    fn ip_read(&self) -> RwLockReadGuard<'_, HashMap<IpKey, StoredBox>> {
        self.ip.read().unwrap_or_else(|e| e.into_inner())
    }

    fn ip_write(&self) -> RwLockWriteGuard<'_, HashMap<IpKey, StoredBox>> {
        self.ip.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn env_box(&self, env_id: &str) -> BoxSnapshot {
        let guard = self.env_read();
        let stored = guard.get(env_id);
        BoxSnapshot {
            env_id: env_id.to_string(),
            public_ip: None,
            value: stored.map(|b| b.value.clone()).unwrap_or_default(),
            last_updated: stored.map(|b| b.last_updated),
        }
    }

    /// Replace the env-box contents. Returns the number of stored items.
    pub fn replace_env_box(&self, env_id: &str, value: Vec<Value>) -> usize {
        let count = value.len();
        self.env_write().insert(
            env_id.to_string(),
            StoredBox {
                value,
                last_updated: now_millis(),
            },
        );
        tracing::debug!("memory: env-box {} replaced with {count} item(s)", short(env_id));
        count
    }

    /// Append messages not already present by their `ts:q` key. Messages
    /// without both fields are skipped. Returns true if anything was added.
    pub fn append_env_box(&self, env_id: &str, value: Vec<Value>) -> bool {
        let mut guard = self.env_write();
        let stored = guard.entry(env_id.to_string()).or_default();
        let mut seen: HashSet<String> =
            stored.value.iter().filter_map(message::dedup_key).collect();

        let mut updated = false;
        for msg in value {
            let Some(key) = message::dedup_key(&msg) else {
                continue;
            };
            if seen.insert(key) {
                stored.value.push(msg);
                updated = true;
            }
        }
        if updated {
            stored.last_updated = now_millis();
        }
        updated
    }

    /// Every env-box message with a `ts:q` key, deduplicated across
    /// environments and ordered by `ts`.
    pub fn env_box_aggregate(&self) -> Vec<Value> {
        let guard = self.env_read();
        let mut seen = HashSet::new();
        let mut all: Vec<Value> = Vec::new();
        for stored in guard.values() {
            for msg in &stored.value {
                if let Some(key) = message::dedup_key(msg)
                    && seen.insert(key)
                {
                    all.push(msg.clone());
                }
            }
        }
        all.sort_by(|a, b| {
            let ta = a.get("ts").and_then(Value::as_f64).unwrap_or(0.0);
            let tb = b.get("ts").and_then(Value::as_f64).unwrap_or(0.0);
            ta.total_cmp(&tb)
        });
        all
    }

    pub fn ip_box(&self, env_id: &str, public_ip: &str) -> BoxSnapshot {
        let guard = self.ip_read();
        let stored = guard.get(&(env_id.to_string(), public_ip.to_string()));
        BoxSnapshot {
            env_id: env_id.to_string(),
            public_ip: Some(public_ip.to_string()),
            value: stored.map(|b| b.value.clone()).unwrap_or_default(),
            last_updated: stored.map(|b| b.last_updated),
        }
    }

    pub fn replace_ip_box(&self, env_id: &str, public_ip: &str, value: Vec<Value>) -> usize {
        let count = value.len();
        self.ip_write().insert(
            (env_id.to_string(), public_ip.to_string()),
            StoredBox {
                value,
                last_updated: now_millis(),
            },
        );
        count
    }

    /// All env-boxes, ordered by env id.
    pub fn all_env_boxes(&self) -> BTreeMap<String, BoxSnapshot> {
        self.env_read()
            .iter()
            .map(|(env_id, stored)| {
                (
                    env_id.clone(),
                    BoxSnapshot {
                        env_id: env_id.clone(),
                        public_ip: None,
                        value: stored.value.clone(),
                        last_updated: Some(stored.last_updated),
                    },
                )
            })
            .collect()
    }

    /// All ip-boxes keyed `"<env_id>_<public_ip>"`.
    pub fn all_ip_boxes(&self) -> BTreeMap<String, BoxSnapshot> {
        self.ip_read()
            .iter()
            .map(|((env_id, public_ip), stored)| {
                (
                    format!("{env_id}_{public_ip}"),
                    BoxSnapshot {
                        env_id: env_id.clone(),
                        public_ip: Some(public_ip.clone()),
                        value: stored.value.clone(),
                        last_updated: Some(stored.last_updated),
                    },
                )
            })
            .collect()
    }

    pub fn clear_all(&self) {
        self.env_write().clear();
        self.ip_write().clear();
        tracing::info!("memory: all boxes cleared");
    }
}

fn short(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}
