use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::Stream;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use super::AppState;
use crate::daemon::events::ScanEvent;
use crate::models::ScanId;

#[derive(Debug, Deserialize, Default)]
pub struct SseParams {
    pub scan_id: Option<String>,
}

/// Logs when the SSE stream is dropped (client disconnects).
struct SseDropGuard;

impl Drop for SseDropGuard {
    fn drop(&mut self) {
        tracing::debug!("SSE client disconnected");
    }
}

/// Turn one broadcast item into an SSE frame, or `None` if it is filtered out.
fn to_sse_event(
    item: Result<ScanEvent, tokio_stream::wrappers::errors::BroadcastStreamRecvError>,
    filter: Option<ScanId>,
) -> Option<Event> {
    match item {
        Ok(event) => {
            if filter.is_some_and(|id| event.scan_id() != id) {
                return None;
            }
            serde_json::to_string(&event)
                .ok()
                .map(|data| Event::default().event(event.kind()).data(data))
        }
        // Lagged: tell the client and keep going
        Err(_) => Some(Event::default().comment("lagged: some events were missed")),
    }
}

pub async fn sse_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SseParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::info!("SSE client connected");

    let rx = state.event_tx.subscribe();
    let filter = params.scan_id.and_then(|s| s.parse::<ScanId>().ok());

    let drop_guard = SseDropGuard;
    let stream = BroadcastStream::new(rx).filter_map(move |item| {
        let _ = &drop_guard;
        to_sse_event(item, filter).map(Ok)
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

    fn finished(id: ScanId) -> ScanEvent {
        ScanEvent::Finished {
            scan_id: id,
            output_file: id.artifact_name(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_unfiltered_event_passes() {
        let id = ScanId::new();
        assert!(to_sse_event(Ok(finished(id)), None).is_some());
    }

    #[test]
    fn test_filter_drops_other_scans() {
        let wanted = ScanId::new();
        let other = ScanId::new();
        assert!(to_sse_event(Ok(finished(other)), Some(wanted)).is_none());
        assert!(to_sse_event(Ok(finished(wanted)), Some(wanted)).is_some());
    }

    #[test]
    fn test_lag_becomes_comment() {
        let item = Err(BroadcastStreamRecvError::Lagged(3));
        assert!(to_sse_event(item, None).is_some());
    }
}
