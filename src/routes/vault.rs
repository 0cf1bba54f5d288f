use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};
use serde::Deserialize;
use serde_json::{Value, json};

use super::AppRouter;
use crate::error::IciError;
use crate::server::{AppState, parse_json_body};
use crate::vault::{CollectRequest, SearchQuery, SearchResults, VaultStats};

pub fn router() -> AppRouter {
    AppRouter::new()
        .route("/vault/collect", post(collect))
        .route("/vault/search", post(search))
        .route("/vault/entries/{user_id}", get(entries))
        .route("/vault/domains/{user_id}", get(domains))
        .route("/vault/stats/{user_id}", get(stats))
        .route("/vault/clear/{user_id}", delete(clear))
        .route("/vault/vector-stats", get(vector_stats))
}

#[derive(Debug, Default, Deserialize)]
struct DomainQuery {
    domain: Option<String>,
}

async fn collect(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<Value>, IciError> {
    let raw: Value = parse_json_body(&body)?;
    if !raw.is_object() {
        return Err(IciError::MalformedJson("expected a JSON object".to_string()));
    }
    let req = CollectRequest::from_json(&raw)?;
    let entry_id = state.vault.collect(req);
    Ok(Json(json!({
        "success": true,
        "entry_id": entry_id,
        "message": "Data collected successfully",
    })))
}

async fn search(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<SearchResults>, IciError> {
    let query: SearchQuery = parse_json_body(&body)?;
    Ok(Json(state.vault.search(&query)?))
}

async fn entries(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(q): Query<DomainQuery>,
) -> Json<Value> {
    let entries = state.vault.entries(&user_id, q.domain.as_deref());
    Json(json!({ "count": entries.len(), "entries": entries }))
}

async fn domains(State(state): State<Arc<AppState>>, Path(user_id): Path<String>) -> Json<Value> {
    Json(json!({ "domains": state.vault.domains(&user_id) }))
}

async fn stats(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Json<VaultStats> {
    Json(state.vault.stats(&user_id))
}

async fn clear(State(state): State<Arc<AppState>>, Path(user_id): Path<String>) -> Json<Value> {
    state.vault.clear(&user_id);
    Json(json!({ "success": true, "message": "Vault cleared" }))
}

async fn vector_stats(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(state.vault.vector_stats())
}
