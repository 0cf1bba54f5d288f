use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::routing::post;
use serde::Deserialize;
use serde_json::{Value, json};

use super::AppRouter;
use crate::error::IciError;
use crate::recall::ChatReply;
use crate::server::{AppState, parse_json_body};

const ANONYMOUS: &str = "Anonymous";

pub fn router() -> AppRouter {
    AppRouter::new()
        .route("/ai-chat", post(ai_chat))
        .route("/ai-chat-enhanced", post(ai_chat))
        .route("/ask", post(ask))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChatRequest {
    message: String,
    user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AskRequest {
    question: String,
    user_id: Option<String>,
}

fn user_or_anonymous(user_id: Option<&str>) -> &str {
    user_id.map(str::trim).filter(|u| !u.is_empty()).unwrap_or(ANONYMOUS)
}

async fn ai_chat(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ChatReply>, IciError> {
    let req: ChatRequest = parse_json_body(&body)?;
    let user_id = user_or_anonymous(req.user_id.as_deref());
    Ok(Json(state.assistant.reply(user_id, &req.message)))
}

/// Older chat page: `question` in, `answer` out.
async fn ask(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<Value>, IciError> {
    let req: AskRequest = parse_json_body(&body)?;
    let user_id = user_or_anonymous(req.user_id.as_deref());
    let reply = state.assistant.reply(user_id, &req.question);
    Ok(Json(json!({
        "answer": reply.response,
        "memory_stored": reply.memory_stored,
        "memory_used": reply.memory_context_found,
        "memory_count": reply.memory_count,
    })))
}
