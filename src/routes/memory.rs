use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::{Value, json};

use super::AppRouter;
use crate::error::IciError;
use crate::events::ServerEvent;
use crate::memory::message;
use crate::server::{AppState, parse_json_body};

pub fn router() -> AppRouter {
    AppRouter::new()
        .route("/env-box", get(get_env_box).post(post_env_box))
        .route("/env-box/append", post(append_env_box))
        .route("/env-box/transcript", get(env_box_transcript))
        .route("/env-box-aggregate", get(env_box_aggregate))
        .route("/ip-box", get(get_ip_box).post(post_ip_box))
}

#[derive(Debug, Default, Deserialize)]
struct BoxQuery {
    env_id: Option<String>,
    public_ip: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BoxWrite {
    #[serde(default)]
    env_id: Option<String>,
    #[serde(default)]
    public_ip: Option<String>,
    #[serde(default)]
    value: Value,
}

/// Stored boxes always hold a list; anything else becomes empty.
fn as_message_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        _ => Vec::new(),
    }
}

async fn get_env_box(State(state): State<Arc<AppState>>, Query(q): Query<BoxQuery>) -> Json<Value> {
    let env_id = state.resolve_env_id(q.env_id.as_deref());
    Json(json!(state.boxes.env_box(&env_id)))
}

async fn post_env_box(
    State(state): State<Arc<AppState>>,
    Query(q): Query<BoxQuery>,
    body: Bytes,
) -> Result<Json<Value>, IciError> {
    let req: BoxWrite = parse_json_body(&body)?;
    let env_id = state.resolve_env_id(q.env_id.as_deref().or(req.env_id.as_deref()));
    let stored_items = state.boxes.replace_env_box(&env_id, as_message_list(req.value));
    state.events.publish(ServerEvent::SharedMemoryUpdated {
        env_id: env_id.clone(),
    });
    Ok(Json(json!({
        "success": true,
        "env_id": env_id,
        "stored_items": stored_items,
    })))
}

async fn append_env_box(
    State(state): State<Arc<AppState>>,
    Query(q): Query<BoxQuery>,
    body: Bytes,
) -> Result<Json<Value>, IciError> {
    let req: BoxWrite = parse_json_body(&body)?;
    let env_id = state.resolve_env_id(q.env_id.as_deref().or(req.env_id.as_deref()));
    let messages = match req.value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        single => vec![single],
    };
    let updated = state.boxes.append_env_box(&env_id, messages);
    if updated {
        state.events.publish(ServerEvent::SharedMemoryUpdated {
            env_id: env_id.clone(),
        });
    }
    Ok(Json(json!({ "status": "ok", "updated": updated })))
}

async fn env_box_aggregate(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "value": state.boxes.env_box_aggregate() }))
}

async fn env_box_transcript(
    State(state): State<Arc<AppState>>,
    Query(q): Query<BoxQuery>,
) -> Json<Value> {
    let env_id = state.resolve_env_id(q.env_id.as_deref());
    let snapshot = state.boxes.env_box(&env_id);
    let normalized = message::normalize_messages(&snapshot.value);
    let groups = message::group_by_sender(&normalized);
    let text = message::format_grouped(&groups);
    Json(json!({
        "env_id": env_id,
        "groups": groups,
        "text": text,
    }))
}

fn require_public_ip(raw: Option<&str>) -> Result<String, IciError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| IciError::MissingParameter("public_ip".to_string()))
}

async fn get_ip_box(
    State(state): State<Arc<AppState>>,
    Query(q): Query<BoxQuery>,
) -> Result<Json<Value>, IciError> {
    let public_ip = require_public_ip(q.public_ip.as_deref())?;
    let env_id = state.resolve_env_id(q.env_id.as_deref());
    Ok(Json(json!(state.boxes.ip_box(&env_id, &public_ip))))
}

async fn post_ip_box(
    State(state): State<Arc<AppState>>,
    Query(q): Query<BoxQuery>,
    body: Bytes,
) -> Result<Json<Value>, IciError> {
    let req: BoxWrite = parse_json_body(&body)?;
    let public_ip = require_public_ip(q.public_ip.as_deref().or(req.public_ip.as_deref()))?;
    let env_id = state.resolve_env_id(q.env_id.as_deref().or(req.env_id.as_deref()));
    let stored_items = state
        .boxes
        .replace_ip_box(&env_id, &public_ip, as_message_list(req.value));
    Ok(Json(json!({
        "success": true,
        "env_id": env_id,
        "public_ip": public_ip,
        "stored_items": stored_items,
    })))
}
