//! "Who is X?" search across the env-boxes, ip-boxes and client table.

use std::collections::HashSet;

use crate::clients::ClientRegistry;
use crate::memory::{MemoryBoxes, message};

use super::heuristics::title_case;

const PREVIEW_CHARS: usize = 100;
const RECENT_MENTIONS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum MentionSource {
    Shared { env_id: String },
    IpShared { env_id: String, public_ip: String },
    Client { client_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mention {
    pub source: MentionSource,
    pub content: String,
    pub user: String,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersonSearch {
    pub name: String,
    pub mentions: Vec<Mention>,
}

impl PersonSearch {
    pub fn found(&self) -> bool {
        !self.mentions.is_empty()
    }

    /// Human-readable answer listing where the name appears.
    pub fn summary(&self) -> String {
        let display = title_case(&self.name);
        if self.mentions.is_empty() {
            return format!(
                "I don't have any information about {display} in the current memory stores."
            );
        }

        let mut lines = vec![format!(
            "I found information about {display} in the following locations:"
        )];

        let shared: Vec<&Mention> = self
            .mentions
            .iter()
            .filter(|m| matches!(m.source, MentionSource::Shared { .. }))
            .collect();
        if !shared.is_empty() {
            let envs: HashSet<&str> = shared
                .iter()
                .filter_map(|m| match &m.source {
                    MentionSource::Shared { env_id } => Some(env_id.as_str()),
                    _ => None,
                })
                .collect();
            lines.push(format!(
                "• Shared memory: {} mentions across {} environment(s)",
                shared.len(),
                envs.len()
            ));
        }

        let ip_shared: Vec<&Mention> = self
            .mentions
            .iter()
            .filter(|m| matches!(m.source, MentionSource::IpShared { .. }))
            .collect();
        if !ip_shared.is_empty() {
            let ips: HashSet<&str> = ip_shared
                .iter()
                .filter_map(|m| match &m.source {
                    MentionSource::IpShared { public_ip, .. } => Some(public_ip.as_str()),
                    _ => None,
                })
                .collect();
            lines.push(format!(
                "• IP-shared memory: {} mentions from {} IP address(es)",
                ip_shared.len(),
                ips.len()
            ));
        }

        let clients: Vec<&Mention> = self
            .mentions
            .iter()
            .filter(|m| matches!(m.source, MentionSource::Client { .. }))
            .collect();
        if !clients.is_empty() {
            let ids: HashSet<&str> = clients
                .iter()
                .filter_map(|m| match &m.source {
                    MentionSource::Client { client_id } => Some(client_id.as_str()),
                    _ => None,
                })
                .collect();
            lines.push(format!(
                "• Client records: {} mentions in {} client record(s)",
                clients.len(),
                ids.len()
            ));
        }

        lines.push("\nRecent mentions:".to_string());
        let mut recent: Vec<&Mention> = self.mentions.iter().collect();
        // Stable, so equal timestamps keep store order.
        recent.sort_by(|a, b| b.timestamp.total_cmp(&a.timestamp));
        for m in recent.into_iter().take(RECENT_MENTIONS) {
            lines.push(format!("• {}", preview(&m.content)));
        }
        lines.join("\n")
    }
}

fn preview(content: &str) -> String {
    if content.chars().count() > PREVIEW_CHARS {
        let head: String = content.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        content.to_string()
    }
}

/// Collect every mention of `name` (matched lowercase, as a substring).
/// Each store is read in turn; no two locks are held together.
pub fn search_person(name: &str, boxes: &MemoryBoxes, clients: &ClientRegistry) -> PersonSearch {
    let needle = name.to_lowercase();
    let mut mentions = Vec::new();

    for (env_id, snapshot) in boxes.all_env_boxes() {
        for msg in &snapshot.value {
            let Some(content) = message::content(msg) else {
                continue;
            };
            if content.to_lowercase().contains(&needle) {
                mentions.push(Mention {
                    source: MentionSource::Shared { env_id: env_id.clone() },
                    content,
                    user: message::sender(msg),
                    timestamp: message::time(msg),
                });
            }
        }
    }

    for snapshot in boxes.all_ip_boxes().into_values() {
        let public_ip = snapshot.public_ip.clone().unwrap_or_default();
        for msg in &snapshot.value {
            let Some(content) = message::content(msg) else {
                continue;
            };
            if content.to_lowercase().contains(&needle) {
                mentions.push(Mention {
                    source: MentionSource::IpShared {
                        env_id: snapshot.env_id.clone(),
                        public_ip: public_ip.clone(),
                    },
                    content,
                    user: message::sender(msg),
                    timestamp: message::time(msg),
                });
            }
        }
    }

    for hit in clients.mentions(&needle) {
        mentions.push(Mention {
            source: MentionSource::Client {
                client_id: hit.client_id,
            },
            content: format!("Client record mentions {needle}"),
            user: "system".to_string(),
            timestamp: hit.last_seen,
        });
    }

    tracing::debug!("recall: '{needle}' mentioned {} time(s)", mentions.len());
    PersonSearch {
        name: needle,
        mentions,
    }
}
