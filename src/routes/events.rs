use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use futures_util::Stream;
use futures_util::StreamExt;
use futures_util::future::ready;
use tokio_stream::wrappers::BroadcastStream;

use super::AppRouter;
use crate::server::AppState;

pub fn router() -> AppRouter {
    AppRouter::new().route("/events", get(events))
}

/// Server-sent change notifications. Lagging subscribers skip what they
/// missed.
async fn events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.events.subscribe()).filter_map(|msg| {
        ready(match msg {
            Ok(event) => Event::default().event(event.name()).json_data(&event).ok().map(Ok),
            Err(e) => {
                tracing::debug!("events: subscriber lagged: {e}");
                None
            }
        })
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
