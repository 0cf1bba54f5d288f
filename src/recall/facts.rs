use std::collections::HashMap;
use std::sync::RwLock;

/// Schedule facts from "X should go at Y", keyed by user and lowercase name.
#[derive(Default)]
pub struct FactStore {
    facts: RwLock<HashMap<(String, String), String>>,
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: &str, name: &str, time: &str) {
        self.facts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((user_id.to_string(), name.to_lowercase()), time.to_string());
    }

    pub fn get(&self, user_id: &str, name: &str) -> Option<String> {
        self.facts
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(user_id.to_string(), name.to_lowercase()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.facts.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.facts.write().unwrap_or_else(|e| e.into_inner()).clear();
    }
}
