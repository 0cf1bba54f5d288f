use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::{Value, json};

use super::AppRouter;
use crate::error::IciError;
use crate::server::{AppState, parse_json_body, parse_optional_json_body};

pub fn router() -> AppRouter {
    AppRouter::new()
        .route("/lost-memory-report", post(submit_report))
        .route("/lost-memory-reports", get(list_reports))
        .route("/file-lost-memory-report", post(file_legacy_report))
        .route("/get-lost-memory-reports", get(list_legacy_reports))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReportRequest {
    env_id: String,
    report: String,
    timestamp: Option<f64>,
    client_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyReportRequest {
    env_id: Option<String>,
    details: String,
}

#[derive(Debug, Default, Deserialize)]
struct EnvQuery {
    env_id: Option<String>,
}

async fn submit_report(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, IciError> {
    let req: ReportRequest = parse_json_body(&body)?;
    let report = state
        .reports
        .submit(&req.env_id, &req.report, req.timestamp, req.client_id.as_deref())?;

    let email_enabled = state.secrets.is_email_enabled();
    if state.secrets.admin_email().is_some() {
        tracing::info!(
            "reports: admin notification for #{} not sent, mail delivery is disabled",
            report.id
        );
    }
    Ok(Json(json!({
        "success": true,
        "report_id": report.id,
        "env_id": req.env_id,
        "email_sent": false,
        "email_disabled": !email_enabled,
    })))
}

async fn list_reports(
    State(state): State<Arc<AppState>>,
    Query(q): Query<EnvQuery>,
) -> Json<Value> {
    match q.env_id.filter(|e| !e.is_empty()) {
        Some(env_id) => {
            let reports = state.reports.list(&env_id);
            Json(json!({
                "env_id": env_id,
                "total": reports.len(),
                "reports": reports,
            }))
        }
        None => Json(json!(state.reports.list_all())),
    }
}

async fn file_legacy_report(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let req: LegacyReportRequest = match parse_optional_json_body(&body) {
        Ok(req) => req,
        Err(e) => return e.into_response(),
    };
    if req.details.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "error", "reason": "Missing details" })),
        )
            .into_response();
    }
    let env_id = state.resolve_env_id(req.env_id.as_deref());
    match state.reports.submit(&env_id, &req.details, None, None) {
        Ok(report) => Json(json!({
            "status": "ok",
            "report": { "details": report.report, "timestamp": report.timestamp },
        }))
        .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn list_legacy_reports(
    State(state): State<Arc<AppState>>,
    Query(q): Query<EnvQuery>,
) -> Json<Value> {
    let env_id = state.resolve_env_id(q.env_id.as_deref());
    let reports: Vec<Value> = state
        .reports
        .list(&env_id)
        .into_iter()
        .map(|r| json!({ "details": r.report, "timestamp": r.timestamp }))
        .collect();
    Json(json!({ "status": "ok", "reports": reports }))
}
