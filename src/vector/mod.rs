//! Per-user exact inner-product index.
//!
//! Every user owns an ordered list of entry ids; entries hold their
//! normalised embedding, so a search is a dot product against each of the
//! user's rows. Embeddings are computed before the index lock is taken.

pub mod embedder;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde_json::Value;

pub use embedder::{HashingEmbedder, TextEmbedder};

#[derive(Debug, Clone)]
pub struct VectorEntry {
    pub entry_id: String,
    pub user_id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorHit {
    pub entry_id: String,
    pub score: f32,
    pub text: String,
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorStats {
    pub total_entries: usize,
    pub total_users: usize,
    pub users: BTreeMap<String, usize>,
    pub model: String,
    pub dimension: usize,
}

#[derive(Default)]
struct IndexState {
    entries: HashMap<String, VectorEntry>,
    user_rows: HashMap<String, Vec<String>>,
}

pub struct VectorIndex {
    embedder: Arc<dyn TextEmbedder>,
    state: Mutex<IndexState>,
}

impl VectorIndex {
    pub fn new(embedder: Arc<dyn TextEmbedder>) -> Self {
        tracing::info!(
            "vector: index ready (model={}, dimension={})",
            embedder.model_name(),
            embedder.dimension()
        );
        Self {
            embedder,
            state: Mutex::new(IndexState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, IndexState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn embed(&self, text: &str) -> Option<Vec<f32>> {
        if text.trim().is_empty() {
            return None;
        }
        match self.embedder.embed(text) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("vector: embedding failed: {e}");
                None
            }
        }
    }

    /// Index `text` for `user_id`. Re-adding an id replaces the old entry.
    /// Returns false for blank text or when embedding fails.
    pub fn add_entry(&self, entry_id: &str, user_id: &str, text: &str, metadata: Value) -> bool {
        let Some(embedding) = self.embed(text) else {
            return false;
        };
        let mut state = self.lock();
        if let Some(old) = state.entries.remove(entry_id)
            && let Some(rows) = state.user_rows.get_mut(&old.user_id)
        {
            rows.retain(|id| id != entry_id);
        }
        state
            .user_rows
            .entry(user_id.to_string())
            .or_default()
            .push(entry_id.to_string());
        state.entries.insert(
            entry_id.to_string(),
            VectorEntry {
                entry_id: entry_id.to_string(),
                user_id: user_id.to_string(),
                text: text.to_string(),
                embedding,
                metadata,
            },
        );
        tracing::debug!("vector: added {entry_id} for {user_id}");
        true
    }

    fn scored(&self, state: &IndexState, user_id: &str, query: &[f32]) -> Vec<(String, f32)> {
        let Some(rows) = state.user_rows.get(user_id) else {
            return Vec::new();
        };
        let mut scored: Vec<(String, f32)> = rows
            .iter()
            .filter_map(|id| state.entries.get(id))
            .map(|e| (e.entry_id.clone(), embedder::dot(query, &e.embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
    }

    /// Top `limit` entries for `user_id` scoring at least `threshold`,
    /// best first.
    pub fn search_similar(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
        threshold: f32,
    ) -> Vec<(String, f32)> {
        let Some(q) = self.embed(query) else {
            return Vec::new();
        };
        let state = self.lock();
        let mut hits = self.scored(&state, user_id, &q);
        hits.truncate(limit);
        hits.retain(|(_, score)| *score >= threshold);
        hits
    }

    /// Top `k` entries for `user_id` with their text and metadata, no floor.
    pub fn search_entries(&self, user_id: &str, query: &str, k: usize) -> Vec<VectorHit> {
        let Some(q) = self.embed(query) else {
            return Vec::new();
        };
        let state = self.lock();
        self.scored(&state, user_id, &q)
            .into_iter()
            .take(k)
            .filter_map(|(id, score)| {
                state.entries.get(&id).map(|e| VectorHit {
                    entry_id: id,
                    score,
                    text: e.text.clone(),
                    metadata: e.metadata.clone(),
                })
            })
            .collect()
    }

    pub fn entry_text(&self, entry_id: &str) -> Option<String> {
        self.lock().entries.get(entry_id).map(|e| e.text.clone())
    }

    pub fn entry_metadata(&self, entry_id: &str) -> Option<Value> {
        self.lock().entries.get(entry_id).map(|e| e.metadata.clone())
    }

    pub fn entry_embedding(&self, entry_id: &str) -> Option<Vec<f32>> {
        self.lock().entries.get(entry_id).map(|e| e.embedding.clone())
    }

    pub fn remove_entry(&self, entry_id: &str, user_id: &str) -> bool {
        let mut state = self.lock();
        match state.entries.get(entry_id) {
            Some(e) if e.user_id == user_id => {}
            _ => return false,
        }
        state.entries.remove(entry_id);
        if let Some(rows) = state.user_rows.get_mut(user_id) {
            rows.retain(|id| id != entry_id);
        }
        true
    }

    pub fn remove_user_data(&self, user_id: &str) {
        let mut state = self.lock();
        if let Some(rows) = state.user_rows.remove(user_id) {
            for id in rows {
                state.entries.remove(&id);
            }
        }
        tracing::info!("vector: removed all data for {user_id}");
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.user_rows.clear();
    }

    pub fn stats(&self) -> VectorStats {
        let state = self.lock();
        let mut users = BTreeMap::new();
        for entry in state.entries.values() {
            *users.entry(entry.user_id.clone()).or_insert(0) += 1;
        }
        VectorStats {
            total_entries: state.entries.len(),
            total_users: state.user_rows.len(),
            users,
            model: self.embedder.model_name().to_string(),
            dimension: self.embedder.dimension(),
        }
    }
}
