use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identity::sha256_hex;

/// A DOM element captured by the browser extension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiElement {
    pub selector: String,
    pub tag_name: String,
    pub text_content: String,
    pub attributes: Map<String, Value>,
    /// `x, y, width, height` in page pixels.
    pub position: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultEntry {
    pub entry_id: String,
    pub user_id: String,
    pub tab_id: String,
    pub url: String,
    pub domain: String,
    pub ui_element: UiElement,
    pub storage_data: Option<Value>,
    pub vector_embedding: Option<Vec<f32>>,
    pub timestamp: f64,
}

impl VaultEntry {
    pub fn new(
        user_id: String,
        tab_id: String,
        url: String,
        ui_element: UiElement,
        storage_data: Option<Value>,
        timestamp: f64,
    ) -> Self {
        let entry_id = entry_id(&user_id, &url, &ui_element.selector, timestamp);
        let domain = domain_of(&url);
        Self {
            entry_id,
            user_id,
            tab_id,
            url,
            domain,
            ui_element,
            storage_data,
            vector_embedding: None,
            timestamp,
        }
    }
}

/// `vault_<32 hex>_<whole timestamp>`, stable for identical captures.
pub fn entry_id(user_id: &str, url: &str, selector: &str, timestamp: f64) -> String {
    let digest = sha256_hex(format!("{user_id}{url}{selector}{timestamp}").as_bytes());
    format!("vault_{}_{}", &digest[..32], timestamp.trunc() as i64)
}

/// URL authority as `host[:port]`; empty when the URL doesn't parse or
/// has no host. A port written in the URL is kept even when it is the
/// scheme's default.
pub fn domain_of(raw: &str) -> String {
    let Ok(parsed) = url::Url::parse(raw) else {
        return String::new();
    };
    let port = match parsed.port() {
        Some(port) => Some(port),
        None if has_explicit_port(raw) => parsed.port_or_known_default(),
        None => None,
    };
    match (parsed.host_str(), port) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    }
}

fn has_explicit_port(raw: &str) -> bool {
    let rest = raw.split_once("://").map_or(raw, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    // Skip past a bracketed IPv6 literal so its colons aren't read as a port.
    let tail = host_port.rsplit_once(']').map_or(host_port, |(_, t)| t);
    tail.rsplit_once(':')
        .is_some_and(|(_, p)| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserVault {
    pub user_id: String,
    pub entries: Vec<VaultEntry>,
    pub created_at: f64,
    pub last_updated: f64,
}

impl UserVault {
    pub fn new(user_id: &str, now: f64) -> Self {
        Self {
            user_id: user_id.to_string(),
            entries: Vec::new(),
            created_at: now,
            last_updated: now,
        }
    }

    /// Append the entry, or replace the one already recorded under the
    /// same `entry_id`.
    pub fn add_entry(&mut self, entry: VaultEntry, now: f64) {
        match self.entries.iter_mut().find(|e| e.entry_id == entry.entry_id) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self.last_updated = now;
    }

    pub fn entries_by_domain(&self, domain: &str) -> Vec<&VaultEntry> {
        self.entries.iter().filter(|e| e.domain == domain).collect()
    }
}
