use serde::Serialize;
use tokio::sync::broadcast;

/// Buffered events per subscriber before slow readers start lagging.
const EVENT_BUFFER: usize = 64;

/// Change notifications pushed to connected browsers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    SharedMemoryUpdated { env_id: String },
    ClientTableUpdated { total: usize },
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SharedMemoryUpdated { .. } => "shared_memory_updated",
            Self::ClientTableUpdated { .. } => "client_table_updated",
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ServerEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER);
        Self { tx }
    }

    /// Fire-and-forget. Having no subscribers is the normal case.
    pub fn publish(&self, event: ServerEvent) {
        let name = event.name();
        match self.tx.send(event) {
            Ok(n) => tracing::debug!("events: {name} delivered to {n} subscriber(s)"),
            Err(_) => tracing::trace!("events: {name} dropped, no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.tx.subscribe()
    }
}
