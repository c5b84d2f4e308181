//! Streaming auto-search endpoint.
//!
//! One request drives one orchestration run; its progress events are written
//! as server-sent events until the terminal `done` or `error` event closes the
//! stream. Dropping the connection drops the receiver, which cancels the run.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures::StreamExt;
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use autosearch_core::RunEvent;

use super::handlers::error_response;
use crate::metrics::{STREAMS_ACTIVE, STREAM_EVENTS_SENT};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AutoSearchParams {
    pub query: Option<String>,
}

/// Keeps the open-stream gauge accurate for as long as the body lives.
struct StreamGuard;

impl StreamGuard {
    fn open() -> Self {
        STREAMS_ACTIVE.inc();
        StreamGuard
    }

    fn sent(&self, event: &RunEvent) {
        STREAM_EVENTS_SENT.with_label_values(&[event.name()]).inc();
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        STREAMS_ACTIVE.dec();
    }
}

/// Render a run event as `event: <name>` / `data: <json>`.
pub fn to_sse_event(event: &RunEvent) -> Event {
    Event::default()
        .event(event.name())
        .data(event.data().to_string())
}

/// GET /api/auto-search?query=
pub async fn auto_search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AutoSearchParams>,
) -> Response {
    let query = match params
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
    {
        Some(query) => query.to_string(),
        None => {
            return error_response(StatusCode::BAD_REQUEST, "Query is required").into_response()
        }
    };

    info!(query = %query, "Auto-search stream opened");

    let events = state.orchestrator().run_streaming(query);
    let guard = StreamGuard::open();
    let stream = ReceiverStream::new(events).map(move |event| {
        guard.sent(&event);
        Ok::<_, Infallible>(to_sse_event(&event))
    });

    let mut response = Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}
