use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IciError {
    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("malformed json body: {0}")]
    MalformedJson(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("port {0} is still in use")]
    PortInUse(u16),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl IciError {
    /// HTTP status for this error when it crosses the API boundary.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingField(_)
            | Self::MissingParameter(_)
            | Self::InvalidRequest(_)
            | Self::MalformedJson(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PortInUse(_)
            | Self::Embedding(_)
            | Self::Config(_)
            | Self::Io(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Produce a sanitized message safe for returning to HTTP clients.
    /// Internal failures (I/O, embedding backends) do not leak their details.
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingField(field) => format!("Missing required field: {field}"),
            Self::MissingParameter(param) => format!("Missing required parameter: {param}"),
            Self::InvalidRequest(msg) => msg.clone(),
            Self::MalformedJson(_) => "No data provided".to_string(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::Conflict(msg) => msg.clone(),
            Self::PortInUse(port) => format!("port {port} is in use"),
            Self::Embedding(_) => "failed to generate embedding".to_string(),
            Self::Config(msg) => format!("configuration error: {msg}"),
            Self::Io(_) => "internal i/o error".to_string(),
            Self::Other(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for IciError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!("request failed: {self}");
        }
        (status, Json(json!({ "error": self.user_message() }))).into_response()
    }
}
