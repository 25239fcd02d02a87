use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures_util::stream::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::ensure_self;
use crate::middleware::AuthUser;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/users/{user_id}/events", get(user_events))
}

/// Server-Sent Events for one user's realtime channel.
async fn user_events(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    ensure_self(auth, user_id)?;
    let channel = user_id.to_string();
    let rx = state.hub.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let channel = channel.clone();
        async move {
            match result {
                Ok(message) if message.channel == channel => {
                    match serde_json::to_string(&message.event) {
                        Ok(data) => Some(Ok(Event::default().event(message.event.name()).data(data))),
                        Err(e) => {
                            warn!("Dropping unserializable event: {}", e);
                            None
                        }
                    }
                }
                Ok(_) => None,
                Err(e) => {
                    warn!("SSE subscriber for {} lagged: {}", channel, e);
                    None
                }
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
