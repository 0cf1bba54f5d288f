use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Bytes;
use serde::de::DeserializeOwned;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::clients::ClientRegistry;
use crate::config::Config;
use crate::error::IciError;
use crate::events::{EventBus, ServerEvent};
use crate::identity;
use crate::memory::MemoryBoxes;
use crate::recall::Assistant;
use crate::reports::LostMemoryReports;
use crate::routes;
use crate::secrets::SecretsManager;
use crate::vault::VaultStore;
use crate::vector::{HashingEmbedder, TextEmbedder, VectorIndex};

/// Everything a request handler can reach. Each store guards itself.
pub struct AppState {
    pub config: Config,
    pub env_id: String,
    pub started_at: Instant,
    pub boxes: Arc<MemoryBoxes>,
    pub clients: Arc<ClientRegistry>,
    pub assistant: Assistant,
    pub vault: VaultStore,
    pub reports: LostMemoryReports,
    pub secrets: SecretsManager,
    pub events: EventBus,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, IciError> {
        let secrets = SecretsManager::new(config.environment);
        Self::with_secrets(config, secrets)
    }

    /// Build state around an explicit secrets source (tests pass a map).
    pub fn with_secrets(config: Config, secrets: SecretsManager) -> Result<Self, IciError> {
        let embedder = build_embedder(&config)?;
        let boxes = Arc::new(MemoryBoxes::new());
        let clients = Arc::new(ClientRegistry::new());
        let assistant = Assistant::new(
            VectorIndex::new(embedder.clone()),
            boxes.clone(),
            clients.clone(),
            config.recall.clone(),
        );
        let vault = VaultStore::new(VectorIndex::new(embedder), &config.vault);
        Ok(Self {
            env_id: identity::env_id().to_string(),
            started_at: Instant::now(),
            boxes,
            clients,
            assistant,
            vault,
            reports: LostMemoryReports::new(),
            secrets,
            events: EventBus::new(),
            config,
        })
    }

    /// Env id from the request, or this server's when absent or blank.
    pub fn resolve_env_id(&self, requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.env_id.as_str())
            .to_string()
    }

    pub fn notify_client_table(&self) {
        self.events.publish(ServerEvent::ClientTableUpdated {
            total: self.clients.len(),
        });
    }

    /// Wipe boxes, facts, the recall index, clients and reports.
    pub fn clear_all(&self) {
        self.boxes.clear_all();
        self.assistant.clear();
        self.clients.clear();
        self.reports.clear();
        self.notify_client_table();
        tracing::warn!("server: all data cleared");
    }
}

#[cfg(feature = "fastembed")]
fn build_embedder(config: &Config) -> Result<Arc<dyn TextEmbedder>, IciError> {
    match crate::vector::embedder::FastEmbedder::try_new() {
        Ok(model) => Ok(Arc::new(model)),
        Err(e) => {
            tracing::warn!("vector: model unavailable ({e}), falling back to feature hashing");
            Ok(Arc::new(HashingEmbedder::new(config.vault.dimension)?))
        }
    }
}

#[cfg(not(feature = "fastembed"))]
fn build_embedder(config: &Config) -> Result<Arc<dyn TextEmbedder>, IciError> {
    Ok(Arc::new(HashingEmbedder::new(config.vault.dimension)?))
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::memory::router())
        .merge(routes::chat::router())
        .merge(routes::clients::router())
        .merge(routes::vault::router())
        .merge(routes::reports::router())
        .merge(routes::admin::router())
        .merge(routes::events::router())
        .with_state(state)
}

/// Serve until `shutdown` is cancelled, then drain in-flight requests.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> Result<(), IciError> {
    let addr = listener.local_addr()?;
    tracing::info!("server: listening on http://{addr} (env_id={})", short(&state.env_id));
    let app = build_router(state);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    tracing::info!("server: stopped");
    Ok(())
}

/// Parse a JSON request body. Empty or malformed bodies are a 400.
pub fn parse_json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, IciError> {
    if body.is_empty() {
        return Err(IciError::MalformedJson("empty body".to_string()));
    }
    serde_json::from_slice::<T>(body).map_err(|e| IciError::MalformedJson(e.to_string()))
}

/// Like `parse_json_body`, but an empty body yields `T::default()`.
pub fn parse_optional_json_body<T: DeserializeOwned + Default>(
    body: &Bytes,
) -> Result<T, IciError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    parse_json_body(body)
}

fn short(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}
