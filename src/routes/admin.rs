use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use serde_json::{Value, json};

use super::AppRouter;
use crate::identity;
use crate::server::AppState;

const LEARN_NOTES: &str = "# ICI Chat

Everything lives in this process's memory. Restarting the server forgets it all.

## Shared memory

- `/env-box` holds the chat for everyone on this deployment (the env id).
- `/ip-box` holds the chat for everyone behind one public IP.
- `/env-box/transcript` groups the env-box by sender.

## Assistant

Tell it things like \"Tommy should go at 2pm\" and ask \"When should Tommy go?\".
\"Who is Tommy?\" searches the shared boxes and the client table.

## Vault

The browser extension posts captured page elements to `/vault/collect`.
Search them with `/vault/search`, by text or by embedding similarity.
";

pub fn router() -> AppRouter {
    AppRouter::new()
        .route("/health", get(health))
        .route("/env-id", get(env_id))
        .route("/data", get(data))
        .route("/system-info", get(system_info))
        .route("/learn", get(learn))
        .route("/debug/env-box", get(debug_env_box))
        .route("/debug/ip-box", get(debug_ip_box))
        .route("/debug/clients", get(debug_clients))
        .route("/debug/clear-all", post(debug_clear_all))
        .route("/admin/config", get(admin_config))
        .route("/admin/secrets-health", get(secrets_health))
        .route("/admin/validate", get(validate))
        .route("/email-status", get(email_status))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ready",
        "env_id": state.env_id,
        "build_version": identity::build_version(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}

async fn env_id(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "env_id": state.env_id }))
}

async fn data() -> Json<Value> {
    Json(json!({ "key": identity::generate_secure_key() }))
}

async fn system_info(State(state): State<Arc<AppState>>) -> Json<Value> {
    let elements = identity::env_id_elements();
    Json(json!({
        "version": elements.version,
        "platform": elements.platform,
        "implementation": elements.implementation,
        "executable": elements.executable,
        "env_id": state.env_id,
        "build_version": identity::build_version(),
        "environment": state.config.environment.as_str(),
    }))
}

async fn learn() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/markdown; charset=utf-8")], LEARN_NOTES)
}

async fn debug_env_box(State(state): State<Arc<AppState>>) -> Json<Value> {
    let boxes = state.boxes.all_env_boxes();
    Json(json!({ "total_environments": boxes.len(), "env_boxes": boxes }))
}

async fn debug_ip_box(State(state): State<Arc<AppState>>) -> Json<Value> {
    let boxes = state.boxes.all_ip_boxes();
    Json(json!({ "total_ip_environments": boxes.len(), "ip_boxes": boxes }))
}

async fn debug_clients(State(state): State<Arc<AppState>>) -> Json<Value> {
    let table = state.clients.table();
    Json(json!({ "total_clients": table.len(), "client_table": table }))
}

async fn debug_clear_all(State(state): State<Arc<AppState>>, body: Bytes) -> Json<Value> {
    let timestamp = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|v| v.get("timestamp").cloned())
        .unwrap_or(Value::Null);
    state.clear_all();
    Json(json!({
        "success": true,
        "message": "All data cleared",
        "timestamp": timestamp,
    }))
}

async fn admin_config(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!(state.secrets.configuration_report()))
}

async fn secrets_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!(state.secrets.check_configuration_health()))
}

async fn validate(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!(state.secrets.validate_configuration()))
}

async fn email_status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let secrets = &state.secrets;
    let provider = secrets.email_provider();
    Json(json!({
        "configured": provider.is_some(),
        "provider": provider,
        "email_enabled": secrets.is_email_enabled(),
        "admin_email_set": secrets.admin_email().is_some(),
        "configuration_status": secrets.configuration_status(),
        "secrets_source": "Environment Variables",
        "status_message": match provider {
            Some(p) => format!("Using {}", p.as_str()),
            None => "No email provider configured".to_string(),
        },
    }))
}
