//! Per-user store of captured browser UI elements.

pub mod model;

use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::clock::now_millis;
use crate::config::{VaultConfig, VaultSearchMode};
use crate::error::IciError;
use crate::vector::VectorIndex;

pub use model::{UiElement, UserVault, VaultEntry};

const REQUIRED_COLLECT_FIELDS: &[&str] = &["user_id", "tab_id", "url", "ui_element"];

/// A validated `/vault/collect` body.
#[derive(Debug, Clone)]
pub struct CollectRequest {
    pub user_id: String,
    pub tab_id: String,
    pub url: String,
    pub ui_element: UiElement,
    pub storage_data: Option<Value>,
    pub timestamp: Option<f64>,
}

impl CollectRequest {
    pub fn from_json(body: &Value) -> Result<Self, IciError> {
        for field in REQUIRED_COLLECT_FIELDS {
            if body.get(*field).is_none_or(Value::is_null) {
                return Err(IciError::MissingField((*field).to_string()));
            }
        }
        let text = |field: &str| match body.get(field) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let ui_element: UiElement = serde_json::from_value(body["ui_element"].clone())
            .map_err(|e| IciError::InvalidRequest(format!("invalid ui_element: {e}")))?;
        Ok(Self {
            user_id: text("user_id"),
            tab_id: text("tab_id"),
            url: text("url"),
            ui_element,
            storage_data: body.get("storage_data").filter(|v| !v.is_null()).cloned(),
            timestamp: body.get("timestamp").and_then(Value::as_f64),
        })
    }
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub query_text: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub threshold: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub entry_id: String,
    pub similarity_score: f32,
    pub url: String,
    pub domain: String,
    pub selector: String,
    pub tag_name: String,
    pub text_content: String,
    pub timestamp: f64,
}

impl SearchHit {
    fn from_entry(entry: &VaultEntry, score: f32) -> Self {
        Self {
            entry_id: entry.entry_id.clone(),
            similarity_score: score,
            url: entry.url.clone(),
            domain: entry.domain.clone(),
            selector: entry.ui_element.selector.clone(),
            tag_name: entry.ui_element.tag_name.clone(),
            text_content: entry.ui_element.text_content.clone(),
            timestamp: entry.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResults {
    pub entries: Vec<SearchHit>,
    pub count: usize,
    pub search_type: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VaultStats {
    pub total_entries: usize,
    pub unique_domains: usize,
    pub last_updated: Option<f64>,
    pub created_at: Option<f64>,
}

pub struct VaultStore {
    vaults: RwLock<HashMap<String, UserVault>>,
    index: VectorIndex,
    mode: VaultSearchMode,
    default_threshold: f32,
}

impl VaultStore {
    pub fn new(index: VectorIndex, config: &VaultConfig) -> Self {
        tracing::info!("vault: search mode {:?}", config.search);
        Self {
            vaults: RwLock::new(HashMap::new()),
            index,
            mode: config.search,
            default_threshold: config.threshold,
        }
    }

    pub fn mode(&self) -> VaultSearchMode {
        self.mode
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, UserVault>> {
        self.vaults.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, UserVault>> {
        self.vaults.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Store a capture and return its entry id. In vector mode non-blank
    /// text is indexed and the embedding copied onto the entry.
    pub fn collect(&self, req: CollectRequest) -> String {
        let now = now_millis();
        let mut entry = VaultEntry::new(
            req.user_id,
            req.tab_id,
            req.url,
            req.ui_element,
            req.storage_data,
            req.timestamp.unwrap_or(now),
        );

        if self.mode == VaultSearchMode::Vector
            && !entry.ui_element.text_content.trim().is_empty()
        {
            let metadata = json!({
                "url": entry.url,
                "domain": entry.domain,
                "selector": entry.ui_element.selector,
                "tag_name": entry.ui_element.tag_name,
                "timestamp": entry.timestamp,
            });
            if self.index.add_entry(
                &entry.entry_id,
                &entry.user_id,
                &entry.ui_element.text_content,
                metadata,
            ) {
                entry.vector_embedding = self.index.entry_embedding(&entry.entry_id);
            }
        }

        let entry_id = entry.entry_id.clone();
        let user_id = entry.user_id.clone();
        self.write()
            .entry(user_id.clone())
            .or_insert_with(|| UserVault::new(&user_id, now))
            .add_entry(entry, now);
        tracing::debug!("vault: collected {entry_id} for {user_id}");
        entry_id
    }

    pub fn search(&self, query: &SearchQuery) -> Result<SearchResults, IciError> {
        let user_id = query.user_id.as_deref().filter(|s| !s.is_empty());
        let text = query.query_text.as_deref().filter(|s| !s.is_empty());
        let (Some(user_id), Some(text)) = (user_id, text) else {
            return Err(IciError::InvalidRequest("Missing user_id or query_text".to_string()));
        };
        let domain = query.domain.as_deref().filter(|d| !d.is_empty());

        let entries = match self.mode {
            VaultSearchMode::Text => self.text_search(user_id, text, domain, query.limit),
            VaultSearchMode::Vector => {
                let threshold = query.threshold.unwrap_or(self.default_threshold);
                self.vector_search(user_id, text, domain, query.limit, threshold)
            }
        };
        Ok(SearchResults {
            count: entries.len(),
            entries,
            search_type: match self.mode {
                VaultSearchMode::Text => "text_based",
                VaultSearchMode::Vector => "vector",
            },
        })
    }

    fn text_search(
        &self,
        user_id: &str,
        query: &str,
        domain: Option<&str>,
        limit: usize,
    ) -> Vec<SearchHit> {
        let needle = query.to_lowercase();
        let vaults = self.read();
        let Some(vault) = vaults.get(user_id) else {
            return Vec::new();
        };
        let mut hits: Vec<SearchHit> = vault
            .entries
            .iter()
            .filter(|e| domain.is_none_or(|d| e.domain == d))
            .filter_map(|e| {
                let content = e.ui_element.text_content.to_lowercase();
                if !content.contains(&needle) && !e.url.to_lowercase().contains(&needle) {
                    return None;
                }
                let score = if content.starts_with(&needle) { 1.0 } else { 0.7 };
                Some(SearchHit::from_entry(e, score))
            })
            .collect();
        hits.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
        hits.truncate(limit);
        hits
    }

    fn vector_search(
        &self,
        user_id: &str,
        query: &str,
        domain: Option<&str>,
        limit: usize,
        threshold: f32,
    ) -> Vec<SearchHit> {
        let found = self.index.search_entries(user_id, query, limit);
        let vaults = self.read();
        let Some(vault) = vaults.get(user_id) else {
            return Vec::new();
        };
        found
            .into_iter()
            .filter(|hit| hit.score >= threshold)
            .filter_map(|hit| {
                vault
                    .entries
                    .iter()
                    .find(|e| e.entry_id == hit.entry_id)
                    .map(|e| SearchHit::from_entry(e, hit.score))
            })
            .filter(|hit| domain.is_none_or(|d| hit.domain == d))
            .collect()
    }

    pub fn entries(&self, user_id: &str, domain: Option<&str>) -> Vec<VaultEntry> {
        let vaults = self.read();
        let Some(vault) = vaults.get(user_id) else {
            return Vec::new();
        };
        match domain.filter(|d| !d.is_empty()) {
            Some(d) => vault.entries_by_domain(d).into_iter().cloned().collect(),
            None => vault.entries.clone(),
        }
    }

    /// Sorted unique domains for the user.
    pub fn domains(&self, user_id: &str) -> Vec<String> {
        self.read()
            .get(user_id)
            .map(|v| {
                v.entries
                    .iter()
                    .map(|e| e.domain.clone())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn stats(&self, user_id: &str) -> VaultStats {
        match self.read().get(user_id) {
            Some(v) => VaultStats {
                total_entries: v.entries.len(),
                unique_domains: v
                    .entries
                    .iter()
                    .map(|e| e.domain.as_str())
                    .collect::<BTreeSet<_>>()
                    .len(),
                last_updated: Some(v.last_updated),
                created_at: Some(v.created_at),
            },
            None => VaultStats {
                total_entries: 0,
                unique_domains: 0,
                last_updated: None,
                created_at: None,
            },
        }
    }

    pub fn clear(&self, user_id: &str) {
        self.write().remove(user_id);
        self.index.remove_user_data(user_id);
        tracing::info!("vault: cleared {user_id}");
    }

    pub fn vector_stats(&self) -> Value {
        match self.mode {
            VaultSearchMode::Text => {
                let vaults = self.read();
                json!({
                    "total_users": vaults.len(),
                    "total_entries": vaults.values().map(|v| v.entries.len()).sum::<usize>(),
                    "implementation": "lightweight_text_search",
                    "vector_enabled": false,
                })
            }
            VaultSearchMode::Vector => {
                let stats = self.index.stats();
                json!({
                    "total_users": stats.total_users,
                    "total_entries": stats.total_entries,
                    "users": stats.users,
                    "model": stats.model,
                    "dimension": stats.dimension,
                    "implementation": "vector",
                    "vector_enabled": true,
                })
            }
        }
    }
}
