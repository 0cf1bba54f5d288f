//! Recall index, person search and the chat assistant.

use std::sync::Arc;

use ici_chat::clients::{ClientRegistry, Registration};
use ici_chat::config::RecallConfig;
use ici_chat::memory::MemoryBoxes;
use ici_chat::recall::{Assistant, ContextKind, search_person};
use ici_chat::vector::{HashingEmbedder, VectorIndex};
use serde_json::json;

fn index() -> VectorIndex {
    VectorIndex::new(Arc::new(HashingEmbedder::new(384).unwrap()))
}

struct Fixture {
    assistant: Assistant,
    boxes: Arc<MemoryBoxes>,
    clients: Arc<ClientRegistry>,
}

fn fixture() -> Fixture {
    let boxes = Arc::new(MemoryBoxes::new());
    let clients = Arc::new(ClientRegistry::new());
    let assistant = Assistant::new(
        index(),
        boxes.clone(),
        clients.clone(),
        RecallConfig::default(),
    );
    Fixture {
        assistant,
        boxes,
        clients,
    }
}

// ===========================================================================
// Vector index
// ===========================================================================

#[test]
fn search_is_scoped_to_the_user() {
    let index = index();
    assert!(index.add_entry("a1", "alice", "green tea and biscuits", json!({})));
    assert!(index.add_entry("b1", "bob", "green tea and biscuits", json!({})));

    let hits = index.search_similar("alice", "green tea", 5, 0.0);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0, "a1");
    assert!(index.search_similar("carol", "green tea", 5, 0.0).is_empty());
}

#[test]
fn best_match_ranks_first_and_threshold_filters() {
    let index = index();
    index.add_entry("tea", "u", "alice likes green tea", json!({}));
    index.add_entry("cars", "u", "the garage repairs old trucks", json!({}));

    let hits = index.search_similar("u", "alice likes green tea", 5, 0.0);
    assert_eq!(hits[0].0, "tea");
    assert!(hits[0].1 > 0.99);

    let strict = index.search_similar("u", "alice likes green tea", 5, 0.9);
    assert_eq!(strict.len(), 1);
}

#[test]
fn blank_text_is_not_indexed() {
    let index = index();
    assert!(!index.add_entry("x", "u", "   ", json!({})));
    assert!(index.search_similar("u", "   ", 5, 0.0).is_empty());
    assert_eq!(index.stats().total_entries, 0);
}

#[test]
fn readding_an_id_replaces_the_entry() {
    let index = index();
    index.add_entry("e1", "u", "first text", json!({ "v": 1 }));
    index.add_entry("e1", "u", "second text", json!({ "v": 2 }));

    assert_eq!(index.entry_text("e1").as_deref(), Some("second text"));
    assert_eq!(index.entry_metadata("e1"), Some(json!({ "v": 2 })));
    assert_eq!(index.stats().total_entries, 1);
    assert_eq!(index.search_entries("u", "second text", 10).len(), 1);
}

#[test]
fn search_entries_returns_text_and_metadata() {
    let index = index();
    index.add_entry("e1", "u", "bob works at the bakery", json!({ "kind": "work" }));
    let hits = index.search_entries("u", "bakery", 3);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].text, "bob works at the bakery");
    assert_eq!(hits[0].metadata, json!({ "kind": "work" }));
}

#[test]
fn removal_and_stats() {
    let index = index();
    index.add_entry("a1", "alice", "one", json!({}));
    index.add_entry("a2", "alice", "two", json!({}));
    index.add_entry("b1", "bob", "three", json!({}));

    let stats = index.stats();
    assert_eq!(stats.total_entries, 3);
    assert_eq!(stats.total_users, 2);
    assert_eq!(stats.users["alice"], 2);
    assert_eq!(stats.model, "feature-hashing");
    assert_eq!(stats.dimension, 384);

    assert!(!index.remove_entry("a1", "bob"));
    assert!(index.remove_entry("a1", "alice"));
    index.remove_user_data("bob");
    assert_eq!(index.stats().total_entries, 1);
    assert!(index.entry_embedding("a2").is_some());

    index.clear();
    assert_eq!(index.stats().total_users, 0);
}

// ===========================================================================
// Person search
// ===========================================================================

#[test]
fn person_summary_lists_sources_and_recent_mentions() {
    let f = fixture();
    f.boxes.replace_env_box(
        "env-a",
        vec![
            json!({ "text": "Jeanne runs the bakery", "user": "Ana", "timestamp": 100 }),
            json!({ "text": "unrelated chatter", "timestamp": 150 }),
            json!({ "text": "Say hi to jeanne", "timestamp": 300 }),
        ],
    );
    f.boxes.replace_ip_box(
        "env-a",
        "10.0.0.1",
        vec![json!({ "text": "Jeanne called", "timestamp": 200 })],
    );
    f.clients
        .register(Registration {
            client_id: "c1".to_string(),
            env_id: "env-a".to_string(),
            public_ip: "10.0.0.1".to_string(),
            user_agent: Some("Jeanne's laptop".to_string()),
            timestamp: Some(50.0),
        })
        .unwrap();

    let search = search_person("Jeanne", &f.boxes, &f.clients);
    assert!(search.found());
    assert_eq!(search.mentions.len(), 4);
    assert_eq!(
        search.summary(),
        "I found information about Jeanne in the following locations:\n\
         • Shared memory: 2 mentions across 1 environment(s)\n\
         • IP-shared memory: 1 mentions from 1 IP address(es)\n\
         • Client records: 1 mentions in 1 client record(s)\n\
         \n\
         Recent mentions:\n\
         • Say hi to jeanne\n\
         • Jeanne called\n\
         • Jeanne runs the bakery"
    );
}

#[test]
fn long_mentions_are_truncated() {
    let f = fixture();
    let long = format!("Jeanne {}", "x".repeat(200));
    f.boxes.replace_env_box("env-a", vec![json!({ "text": long })]);

    let summary = search_person("jeanne", &f.boxes, &f.clients).summary();
    let last = summary.lines().last().unwrap();
    assert!(last.ends_with("..."));
    assert_eq!(last.trim_start_matches("• ").chars().count(), 103);
}

#[test]
fn unknown_person_gets_a_polite_miss() {
    let f = fixture();
    let search = search_person("nobody", &f.boxes, &f.clients);
    assert!(!search.found());
    assert_eq!(
        search.summary(),
        "I don't have any information about Nobody in the current memory stores."
    );
}

// ===========================================================================
// Assistant
// ===========================================================================

#[test]
fn schedule_fact_answers_when_question() {
    let f = fixture();
    let stored = f.assistant.reply("u1", "Tommy should go at 2pm");
    assert!(stored.memory_stored);
    assert_eq!(stored.response, "Got it! I'll remember that scheduling information.");
    assert_eq!(f.assistant.facts().get("u1", "tommy").as_deref(), Some("2pm"));

    let answer = f.assistant.reply("u1", "When should Tommy go?");
    assert!(answer.memory_context_found);
    assert_eq!(answer.memory_count, 1);
    assert!(!answer.memory_stored);
    assert_eq!(answer.response, "Tommy should go at 2pm, today.");
}

#[test]
fn facts_are_per_user() {
    let f = fixture();
    f.assistant.reply("u1", "Tommy should go at 2pm");
    let context = f.assistant.search_memory_for_context("u2", "When should Tommy go?");
    assert!(context.iter().all(|c| c.kind != ContextKind::Fact));
}

#[test]
fn recall_hit_rewrites_schedule_memory() {
    let f = fixture();
    f.assistant.reply("u1", "Tommy should go at 2pm");
    let answer = f.assistant.reply("u1", "What time should Tommy go?");
    assert!(answer.memory_context_found);
    assert_eq!(answer.response, "Tommy should go at 2 pm.");
}

#[test]
fn recall_hit_quotes_other_memories() {
    let f = fixture();
    let stored = f.assistant.reply("u1", "Alice likes green tea");
    assert_eq!(stored.response, "Noted! I'll remember that preference.");

    let answer = f.assistant.reply("u1", "Tell me about Alice and green tea?");
    assert!(answer.memory_context_found);
    assert!(answer.memory_count >= 1);
    assert_eq!(answer.response, "Based on what I remember: Alice likes green tea");
}

#[test]
fn person_question_reports_not_found_without_context() {
    let f = fixture();
    let answer = f.assistant.reply("u1", "Who is Zed?");
    assert!(!answer.memory_context_found);
    assert_eq!(answer.memory_count, 0);
    assert!(answer.response.starts_with("I don't have any information about Zed"));
}

#[test]
fn person_question_searches_shared_memory() {
    let f = fixture();
    f.boxes
        .replace_env_box("env-a", vec![json!({ "text": "Zed fixed the printer", "timestamp": 1 })]);
    let answer = f.assistant.reply("u1", "who is zed");
    assert!(answer.memory_context_found);
    assert!(answer.response.contains("Zed fixed the printer"));
}

#[test]
fn acknowledgements_follow_statement_kind() {
    let f = fixture();
    assert_eq!(
        f.assistant.reply("u1", "Bob works at the bakery").response,
        "I'll remember that workplace information."
    );
    assert_eq!(
        f.assistant.reply("u1", "Remember the code is 4412").response,
        "I've noted that information for future reference."
    );
}

#[test]
fn plain_chat_is_echoed_and_blank_gets_greeting() {
    let f = fixture();
    let echo = f.assistant.reply("u1", "hello there");
    assert_eq!(
        echo.response,
        "I understand you said: 'hello there'. How can I help you with that?"
    );
    assert!(!echo.memory_stored);

    let greeting = f.assistant.reply("u1", "");
    assert!(greeting.response.starts_with("Hello!"));
}

#[test]
fn stored_memories_carry_chat_metadata() {
    let f = fixture();
    assert!(f.assistant.store_information("u1", "Alice likes green tea"));
    assert!(!f.assistant.store_information("u1", "hi"));

    let hits = f.assistant.index().search_entries("u1", "green tea", 1);
    assert_eq!(hits.len(), 1);
    assert!(hits[0].entry_id.starts_with("memory_"));
    assert_eq!(hits[0].metadata["type"], "memory_statement");
    assert_eq!(hits[0].metadata["source"], "chat_input");

    f.assistant.clear();
    assert!(f.assistant.facts().is_empty());
    assert_eq!(f.assistant.index().stats().total_entries, 0);
}
