//! HTTP handlers, one module per area. Each exposes a `router()` merged
//! by `server::build_router`.

pub mod admin;
pub mod chat;
pub mod clients;
pub mod events;
pub mod memory;
pub mod reports;
pub mod vault;

use std::sync::Arc;

use axum::Router;

use crate::server::AppState;

pub(crate) type AppRouter = Router<Arc<AppState>>;
