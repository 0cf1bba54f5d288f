use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::clock::now_millis;
use crate::error::IciError;
use crate::identity;

/// A row in the client table. Rows restored from a browser backup may
/// lack any field but `client_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub client_id: String,
    #[serde(default)]
    pub env_id: String,
    #[serde(default)]
    pub public_ip: String,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default)]
    pub last_seen: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Registration {
    pub client_id: String,
    pub env_id: String,
    pub public_ip: String,
    pub user_agent: Option<String>,
    pub timestamp: Option<f64>,
}

/// A client row that mentions a searched name.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientMention {
    pub client_id: String,
    pub last_seen: f64,
}

/// Ordered client table, unique per `(client_id, env_id)`.
#[derive(Default)]
pub struct ClientRegistry {
    rows: RwLock<Vec<ClientRecord>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<ClientRecord>> {
        self.rows.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<ClientRecord>> {
        self.rows.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert or replace the row for `(client_id, env_id)`; the new row
    /// moves to the end of the table.
    pub fn register(&self, reg: Registration) -> Result<ClientRecord, IciError> {
        for (name, value) in [
            ("env_id", &reg.env_id),
            ("public_ip", &reg.public_ip),
            ("client_id", &reg.client_id),
        ] {
            if value.trim().is_empty() {
                return Err(IciError::MissingField(name.to_string()));
            }
        }
        let timestamp = reg.timestamp.unwrap_or_else(now_millis);
        let record = ClientRecord {
            client_id: reg.client_id,
            env_id: reg.env_id,
            public_ip: reg.public_ip,
            user_agent: reg.user_agent.unwrap_or_else(|| "Unknown".to_string()),
            timestamp,
            last_seen: timestamp,
            private_id: None,
        };
        let mut rows = self.write();
        rows.retain(|r| !(r.client_id == record.client_id && r.env_id == record.env_id));
        rows.push(record.clone());
        tracing::info!("clients: registered {} ({} total)", record.client_id, rows.len());
        Ok(record)
    }

    pub fn heartbeat(
        &self,
        env_id: &str,
        client_id: &str,
        timestamp: Option<f64>,
    ) -> Result<f64, IciError> {
        let ts = timestamp.unwrap_or_else(now_millis);
        let mut rows = self.write();
        let row = rows
            .iter_mut()
            .find(|r| r.client_id == client_id && r.env_id == env_id)
            .ok_or_else(|| IciError::NotFound("Client".to_string()))?;
        row.last_seen = ts;
        Ok(ts)
    }

    pub fn list(&self, env_id: Option<&str>) -> Vec<ClientRecord> {
        self.read()
            .iter()
            .filter(|r| env_id.is_none_or(|e| r.env_id == e))
            .cloned()
            .collect()
    }

    pub fn get(&self, client_id: &str, env_id: Option<&str>) -> Option<ClientRecord> {
        self.read()
            .iter()
            .find(|r| r.client_id == client_id && env_id.is_none_or(|e| r.env_id == e))
            .cloned()
    }

    /// Remove the client's rows, limited to one environment when given.
    /// Returns whether anything was removed.
    pub fn remove(&self, client_id: &str, env_id: Option<&str>) -> bool {
        let mut rows = self.write();
        let before = rows.len();
        rows.retain(|r| !(r.client_id == client_id && env_id.is_none_or(|e| r.env_id == e)));
        rows.len() < before
    }

    pub fn recovery(&self, env_id: &str) -> Vec<ClientRecord> {
        self.list(Some(env_id))
    }

    /// Tie a client id to this deployment and the caller's address. An
    /// existing row for this deployment wins, then the most recent row for
    /// the id; otherwise a new row is appended. At most one row per
    /// `(client_id, env_id)` survives.
    pub fn remember(
        &self,
        client_id: &str,
        public_ip: &str,
        user_agent: &str,
    ) -> Result<ClientRecord, IciError> {
        let client_id = client_id.trim();
        if client_id.is_empty() {
            return Err(IciError::InvalidRequest("No valid client_id".to_string()));
        }
        let env_id = identity::env_id();
        let private_id = identity::private_id(env_id, public_ip, user_agent);
        let now = now_millis();

        let mut rows = self.write();
        let target = rows
            .iter()
            .rposition(|r| r.client_id == client_id && r.env_id == env_id)
            .or_else(|| rows.iter().rposition(|r| r.client_id == client_id));
        let Some(target) = target else {
            let record = ClientRecord {
                client_id: client_id.to_string(),
                env_id: env_id.to_string(),
                public_ip: public_ip.to_string(),
                user_agent: user_agent.to_string(),
                timestamp: now,
                last_seen: now,
                private_id: Some(private_id),
            };
            rows.push(record.clone());
            return Ok(record);
        };

        let row = &mut rows[target];
        row.timestamp = now;
        row.last_seen = now;
        row.env_id = env_id.to_string();
        row.public_ip = public_ip.to_string();
        row.user_agent = user_agent.to_string();
        row.private_id = Some(private_id);
        let record = row.clone();

        let mut index = 0;
        rows.retain(|r| {
            let keep = index == target || !(r.client_id == client_id && r.env_id == env_id);
            index += 1;
            keep
        });
        Ok(record)
    }

    /// Most recent row for `client_id`.
    pub fn lookup(&self, client_id: &str) -> Option<ClientRecord> {
        let client_id = client_id.trim();
        self.read().iter().rev().find(|r| r.client_id == client_id).cloned()
    }

    pub fn table(&self) -> Vec<ClientRecord> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Load a backed-up table. Only allowed into an empty table.
    pub fn restore(&self, rows: Vec<ClientRecord>) -> Result<usize, IciError> {
        let mut table = self.write();
        if !table.is_empty() {
            return Err(IciError::Conflict("table not empty".to_string()));
        }
        *table = rows;
        tracing::info!("clients: restored {} row(s)", table.len());
        Ok(table.len())
    }

    pub fn delete_row(&self, client_id: &str, private_id: Option<&str>) -> bool {
        let mut rows = self.write();
        let before = rows.len();
        rows.retain(|r| !(r.client_id == client_id && r.private_id.as_deref() == private_id));
        rows.len() < before
    }

    /// Returns the number of rows deleted.
    pub fn delete_all_for_env(&self, env_id: &str) -> usize {
        let mut rows = self.write();
        let before = rows.len();
        rows.retain(|r| r.env_id != env_id);
        before - rows.len()
    }

    /// Rows whose serialized form mentions `name` (case-insensitive).
    pub fn mentions(&self, name: &str) -> Vec<ClientMention> {
        let needle = name.to_lowercase();
        self.read()
            .iter()
            .filter(|r| {
                serde_json::to_string(r)
                    .map(|s| s.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            })
            .map(|r| ClientMention {
                client_id: r.client_id.clone(),
                last_seen: r.last_seen,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.write().clear();
    }
}
