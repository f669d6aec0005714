use crate::server::AppContext;
use crate::state::AppEvent;
use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tokio_stream::StreamExt;
use vidbatch_common::BatchId;

pub fn sse_routes() -> Router<AppContext> {
    Router::new().route("/events", get(events_handler))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Only forward events of this batch.
    batch_id: Option<BatchId>,
}

pub async fn events_handler(
    State(ctx): State<AppContext>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = ctx.state.subscribe();
    let only = query.batch_id;

    let stream = BroadcastStream::new(rx)
        .filter_map(|result| result.ok())
        .filter(move |event: &AppEvent| only.map_or(true, |id| event.batch_id() == id))
        .map(|event: AppEvent| {
            // Unnamed events so EventSource.onmessage sees everything; the
            // JSON carries event_type for routing.
            let data = serde_json::to_string(&event).unwrap_or_else(|e| {
                format!(r#"{{"error": "serialization failed: {}"}}"#, e)
            });

            Ok(Event::default().data(data))
        });

    let heartbeat = IntervalStream::new(tokio::time::interval(Duration::from_secs(30))).map(|_| {
        Ok(Event::default()
            .event("heartbeat")
            .data(r#"{"event_type":"heartbeat"}"#))
    });

    let combined = stream.merge(heartbeat);

    Sse::new(combined).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping"))
}
