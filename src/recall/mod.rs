//! The chat assistant: decides what to remember and answers questions
//! from schedule facts, the shared boxes and a per-user recall index.

pub mod facts;
pub mod heuristics;
pub mod person;

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use crate::clients::ClientRegistry;
use crate::clock::now_millis;
use crate::config::RecallConfig;
use crate::identity::sha256_hex;
use crate::memory::MemoryBoxes;
use crate::vector::VectorIndex;

pub use facts::FactStore;
pub use heuristics::{is_question_seeking_memory, is_statement_worth_remembering};
pub use person::{PersonSearch, search_person};

const GREETING: &str =
    "Hello! You can tell me information to remember, or ask me questions about what I've learned.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// A stored schedule fact answered a "when should X go" question.
    Fact,
    /// A cross-store person search. Always produces one summary.
    Person { found: bool },
    /// A similarity hit from the recall index.
    Recall,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryContext {
    pub text: String,
    pub score: Option<f32>,
    pub kind: ContextKind,
}

impl MemoryContext {
    fn is_hit(&self) -> bool {
        !matches!(self.kind, ContextKind::Person { found: false })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub memory_stored: bool,
    pub memory_context_found: bool,
    pub memory_count: usize,
}

pub struct Assistant {
    facts: FactStore,
    index: VectorIndex,
    boxes: Arc<MemoryBoxes>,
    clients: Arc<ClientRegistry>,
    config: RecallConfig,
}

impl Assistant {
    pub fn new(
        index: VectorIndex,
        boxes: Arc<MemoryBoxes>,
        clients: Arc<ClientRegistry>,
        config: RecallConfig,
    ) -> Self {
        Self {
            facts: FactStore::new(),
            index,
            boxes,
            clients,
            config,
        }
    }

    pub fn facts(&self) -> &FactStore {
        &self.facts
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Remember `message` for `user_id` if it looks like information.
    /// Schedule statements also land in the fact store.
    pub fn store_information(&self, user_id: &str, message: &str) -> bool {
        if !is_statement_worth_remembering(message) {
            return false;
        }
        let mut stored = false;
        if let Some((name, time)) = heuristics::parse_schedule_statement(message) {
            self.facts.insert(user_id, &name, &time);
            stored = true;
        }

        let ts = now_millis() as u64;
        let digest = sha256_hex(format!("{message}{ts}").as_bytes());
        let entry_id = format!("memory_{}_{ts}", &digest[..16]);
        let metadata = json!({
            "type": "memory_statement",
            "timestamp": ts,
            "source": "chat_input",
        });
        if self.index.add_entry(&entry_id, user_id, message, metadata) {
            stored = true;
        }
        if stored {
            let preview: String = message.chars().take(50).collect();
            tracing::info!("recall: stored memory for {user_id}: {preview}");
        }
        stored
    }

    /// Context for answering `message`, best first.
    pub fn search_memory_for_context(&self, user_id: &str, message: &str) -> Vec<MemoryContext> {
        if let Some(name) = heuristics::parse_schedule_question(message)
            && let Some(time) = self.facts.get(user_id, &name)
        {
            return vec![MemoryContext {
                text: format!("{} should go at {time}, today.", heuristics::title_case(&name)),
                score: None,
                kind: ContextKind::Fact,
            }];
        }

        if let Some(name) = heuristics::parse_person_question(message) {
            let search = search_person(&name, &self.boxes, &self.clients);
            return vec![MemoryContext {
                text: search.summary(),
                score: None,
                kind: ContextKind::Person { found: search.found() },
            }];
        }

        self.index
            .search_similar(user_id, message, self.config.limit, self.config.threshold)
            .into_iter()
            .filter_map(|(id, score)| {
                self.index.entry_text(&id).map(|text| MemoryContext {
                    text,
                    score: Some(score),
                    kind: ContextKind::Recall,
                })
            })
            .collect()
    }

    pub fn reply(&self, user_id: &str, message: &str) -> ChatReply {
        if is_question_seeking_memory(message) {
            let context = self.search_memory_for_context(user_id, message);
            if let Some(best) = context.first() {
                let response = match best.kind {
                    ContextKind::Recall => answer_from_recall(&best.text),
                    ContextKind::Fact | ContextKind::Person { .. } => best.text.clone(),
                };
                let found = best.is_hit();
                return ChatReply {
                    response,
                    memory_stored: false,
                    memory_context_found: found,
                    memory_count: if found { context.len() } else { 0 },
                };
            }
        }

        if is_statement_worth_remembering(message) {
            let memory_stored = self.store_information(user_id, message);
            return ChatReply {
                response: acknowledgement(message).to_string(),
                memory_stored,
                memory_context_found: false,
                memory_count: 0,
            };
        }

        let response = if message.trim().is_empty() {
            GREETING.to_string()
        } else {
            format!("I understand you said: '{message}'. How can I help you with that?")
        };
        ChatReply {
            response,
            memory_stored: false,
            memory_context_found: false,
            memory_count: 0,
        }
    }

    pub fn clear(&self) {
        self.facts.clear();
        self.index.clear();
    }
}

fn answer_from_recall(memory: &str) -> String {
    if let Some((name, _)) = heuristics::parse_schedule_statement(memory)
        && let Some(time) = heuristics::extract_clock_time(memory)
    {
        return format!("{} should go at {time}.", heuristics::title_case(&name));
    }
    format!("Based on what I remember: {memory}")
}

fn acknowledgement(message: &str) -> &'static str {
    let lower = message.to_lowercase();
    if lower.contains("should go at") {
        "Got it! I'll remember that scheduling information."
    } else if lower.contains("likes") {
        "Noted! I'll remember that preference."
    } else if lower.contains("works at") || lower.contains("works in") {
        "I'll remember that workplace information."
    } else {
        "I've noted that information for future reference."
    }
}
