use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::{extract::State, Router};
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;

use crate::auth::AuthUser;
use crate::constants::{ADAPTATION_REPLAY_LIMIT, SSE_KEEPALIVE_SECS};
use crate::response::AppError;
use crate::selection::adaptive::AdaptationEvent;
use crate::state::AppState;

static SSE_CONNECTION_COUNT: AtomicUsize = AtomicUsize::new(0);

struct SseGuard;

impl SseGuard {
    fn acquire() -> Self {
        SSE_CONNECTION_COUNT.fetch_add(1, Ordering::SeqCst);
        SseGuard
    }
}

impl Drop for SseGuard {
    fn drop(&mut self) {
        SSE_CONNECTION_COUNT.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn active_sse_connections() -> usize {
    SSE_CONNECTION_COUNT.load(Ordering::SeqCst)
}

pub fn router() -> Router<AppState> {
    Router::new().route("/events", get(sse_handler))
}

fn to_sse(event: &AdaptationEvent) -> Option<Event> {
    serde_json::to_string(event)
        .ok()
        .map(|json| Event::default().event("adaptation").id(event.id.clone()).data(json))
}

/// Replays the learner's most recent stored events (oldest first), then
/// follows live events until the client disconnects or the server stops.
pub async fn sse_handler(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    // subscribe before reading history so nothing falls between the two
    let mut live_rx = state.subscribe_adaptations();
    let mut shutdown_rx = state.shutdown_rx();
    let learner_id = auth.learner_id;

    let mut history = state
        .store()
        .list_learner_adaptation_events(&learner_id, ADAPTATION_REPLAY_LIMIT)?;
    history.reverse();

    let stream = async_stream::stream! {
        let _guard = SseGuard::acquire();
        let mut replayed = std::collections::HashSet::new();

        for event in &history {
            replayed.insert(event.id.clone());
            if let Some(sse) = to_sse(event) {
                yield Ok(sse);
            }
        }

        loop {
            tokio::select! {
                received = live_rx.recv() => {
                    match received {
                        Ok(event) => {
                            if event.learner_id != learner_id || replayed.contains(&event.id) {
                                continue;
                            }
                            if let Some(sse) = to_sse(&event) {
                                yield Ok(sse);
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(learner_id = %learner_id, skipped, "Adaptation stream lagged");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
                _ = shutdown_rx.recv() => {
                    break;
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEPALIVE_SECS))
            .text("keepalive"),
    ))
}
