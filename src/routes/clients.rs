use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{Extensions, HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::{Value, json};

use super::AppRouter;
use crate::clients::{ClientRecord, Registration};
use crate::error::IciError;
use crate::server::{AppState, parse_json_body, parse_optional_json_body};

pub fn router() -> AppRouter {
    AppRouter::new()
        .route("/client-register", post(register))
        .route("/client-heartbeat", post(heartbeat))
        .route("/clients", get(list_clients))
        .route("/client/{client_id}/data", get(client_data))
        .route("/client/{client_id}/remove", post(remove_client))
        .route("/recovery-data", get(recovery_data))
        .route("/client-remember", post(remember))
        .route("/client-lookup", post(lookup))
        .route("/client-table", get(table))
        .route("/client-table-restore", post(restore))
        .route("/delete-client-row", post(delete_row))
        .route("/delete-all-client-rows", post(delete_all_rows))
}

#[derive(Debug, Default, Deserialize)]
struct EnvQuery {
    env_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HeartbeatRequest {
    env_id: String,
    client_id: String,
    timestamp: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ClientIdRequest {
    client_id: String,
    private_id: Option<String>,
}

fn status_body(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

async fn register(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, IciError> {
    let reg: Registration = parse_json_body(&body)?;
    let record = state.clients.register(reg)?;
    state.notify_client_table();
    Ok(Json(json!({
        "success": true,
        "client_id": record.client_id,
        "env_id": record.env_id,
        "registered_at": record.timestamp,
    })))
}

async fn heartbeat(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, IciError> {
    let req: HeartbeatRequest = parse_json_body(&body)?;
    if req.env_id.trim().is_empty() {
        return Err(IciError::MissingField("env_id".to_string()));
    }
    if req.client_id.trim().is_empty() {
        return Err(IciError::MissingField("client_id".to_string()));
    }
    let last_seen = state.clients.heartbeat(&req.env_id, &req.client_id, req.timestamp)?;
    Ok(Json(json!({ "success": true, "last_seen": last_seen })))
}

async fn list_clients(
    State(state): State<Arc<AppState>>,
    Query(q): Query<EnvQuery>,
) -> Json<Value> {
    let env_id = q.env_id.filter(|e| !e.is_empty());
    let clients = state.clients.list(env_id.as_deref());
    match env_id {
        Some(env_id) => Json(json!({ "clients": clients, "env_id": env_id })),
        None => Json(json!({ "clients": clients })),
    }
}

async fn client_data(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    Query(q): Query<EnvQuery>,
) -> Result<Json<ClientRecord>, IciError> {
    let env_id = q.env_id.filter(|e| !e.is_empty());
    state
        .clients
        .get(&client_id, env_id.as_deref())
        .map(Json)
        .ok_or_else(|| IciError::NotFound("Client".to_string()))
}

async fn remove_client(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    Query(q): Query<EnvQuery>,
) -> Result<Json<Value>, IciError> {
    let env_id = q.env_id.filter(|e| !e.is_empty());
    if !state.clients.remove(&client_id, env_id.as_deref()) {
        return Err(IciError::NotFound("Client".to_string()));
    }
    state.notify_client_table();
    Ok(Json(json!({
        "success": true,
        "message": format!("Client {client_id} removed"),
    })))
}

async fn recovery_data(
    State(state): State<Arc<AppState>>,
    Query(q): Query<EnvQuery>,
) -> Json<Value> {
    let env_id = state.resolve_env_id(q.env_id.as_deref());
    let clients = state.clients.recovery(&env_id);
    Json(json!({
        "env_id": env_id,
        "total_clients": clients.len(),
        "clients": clients,
    }))
}

/// Caller address: first `X-Forwarded-For` hop, else the socket peer.
fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok())
        && let Some(first) = forwarded.split(',').next().map(str::trim).filter(|s| !s.is_empty())
    {
        return first.to_string();
    }
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}

async fn remember(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    extensions: Extensions,
    body: Bytes,
) -> Response {
    let req: ClientIdRequest = match parse_optional_json_body(&body) {
        Ok(req) => req,
        Err(e) => return e.into_response(),
    };
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let public_ip = client_ip(&headers, &extensions);
    match state.clients.remember(&req.client_id, &public_ip, user_agent) {
        Ok(record) => {
            state.notify_client_table();
            status_body(StatusCode::OK, json!({ "status": "ok", "key": record.client_id }))
        }
        Err(e) => status_body(
            StatusCode::BAD_REQUEST,
            json!({ "status": "error", "reason": e.user_message() }),
        ),
    }
}

async fn lookup(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<Value>, IciError> {
    let req: ClientIdRequest = parse_optional_json_body(&body)?;
    Ok(Json(match state.clients.lookup(&req.client_id) {
        Some(record) => json!({ "status": "ok", "record": record }),
        None => json!({ "status": "not_found" }),
    }))
}

async fn table(State(state): State<Arc<AppState>>) -> Json<Vec<ClientRecord>> {
    Json(state.clients.table())
}

async fn restore(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    if !state.clients.is_empty() {
        return status_body(
            StatusCode::BAD_REQUEST,
            json!({ "status": "skipped", "reason": "table not empty" }),
        );
    }
    let rows: Vec<ClientRecord> = match serde_json::from_slice(&body) {
        Ok(rows) => rows,
        Err(_) => {
            return status_body(
                StatusCode::BAD_REQUEST,
                json!({ "status": "error", "reason": "invalid format" }),
            );
        }
    };
    match state.clients.restore(rows) {
        Ok(restored) => {
            state.notify_client_table();
            status_body(StatusCode::OK, json!({ "status": "ok", "restored": restored }))
        }
        // Lost a race with a concurrent write.
        Err(_) => status_body(
            StatusCode::BAD_REQUEST,
            json!({ "status": "skipped", "reason": "table not empty" }),
        ),
    }
}

async fn delete_row(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let req: ClientIdRequest = match parse_optional_json_body(&body) {
        Ok(req) => req,
        Err(e) => return e.into_response(),
    };
    let deleted = state.clients.delete_row(&req.client_id, req.private_id.as_deref());
    state.notify_client_table();
    if deleted {
        status_body(StatusCode::OK, json!({ "status": "ok" }))
    } else {
        status_body(
            StatusCode::NOT_FOUND,
            json!({ "status": "not_found", "reason": "No such row" }),
        )
    }
}

async fn delete_all_rows(State(state): State<Arc<AppState>>) -> Json<Value> {
    let deleted = state.clients.delete_all_for_env(&state.env_id);
    state.notify_client_table();
    Json(json!({ "status": "ok", "deleted": deleted }))
}
