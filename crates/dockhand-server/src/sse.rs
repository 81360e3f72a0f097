//! Server-sent status stream.
//!
//! Each update is rendered as a small HTML snippet with event name
//! `doc-<document_id>`, so HTMX-style clients can swap per-document regions.
//! A `connected` event opens the stream and `heartbeat` events keep proxies
//! from closing it.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use futures::stream::{self, Stream, StreamExt};
use tokio_stream::wrappers::IntervalStream;
use tracing::debug;

use dockhand_core::defaults::SSE_HEARTBEAT_SECS;
use dockhand_core::StatusUpdate;

use crate::AppState;

/// `GET /api/status/stream`
pub async fn status_stream(State(state): State<AppState>) -> impl IntoResponse {
    let Some(subscription) = state.broadcaster.subscribe() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "too many SSE connections").into_response();
    };

    debug!("SSE connection established");

    let connected = stream::once(async { event_ok(Event::default().event("connected").data("ok")) });

    let updates = stream::unfold(subscription, |mut subscription| async move {
        subscription
            .recv()
            .await
            .map(|update| (event_ok(render_update(&update)), subscription))
    });

    let heartbeat_period = Duration::from_secs(SSE_HEARTBEAT_SECS);
    let heartbeat = IntervalStream::new(tokio::time::interval_at(
        tokio::time::Instant::now() + heartbeat_period,
        heartbeat_period,
    ))
    .map(|_| event_ok(Event::default().event("heartbeat").data("ping")));

    let events: std::pin::Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>> =
        Box::pin(connected.chain(stream::select(updates, heartbeat)));

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(events),
    )
        .into_response()
}

fn event_ok(event: Event) -> Result<Event, Infallible> {
    Ok(event)
}

/// Render one update as the HTML snippet clients swap into the document row.
fn render_update(update: &StatusUpdate) -> Event {
    let html = render_status_html(update);
    Event::default()
        .event(format!("doc-{}", update.document_id))
        .data(html)
}

fn render_status_html(update: &StatusUpdate) -> String {
    match update.error.as_deref() {
        Some(error) => format!(
            r#"<span class="status status-{status}" title="{error}">{status}</span>"#,
            status = update.status,
            error = escape_html(error),
        ),
        None => format!(
            r#"<span class="status status-{status}">{status}</span>"#,
            status = update.status,
        ),
    }
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_render_status_html_plain() {
        let update = StatusUpdate::new(Uuid::nil(), "processing", "default");
        let html = render_status_html(&update);
        assert!(html.contains("status-processing"));
        assert!(!html.contains("title="));
    }

    #[test]
    fn test_render_status_html_with_error_escapes() {
        let update = StatusUpdate::new(Uuid::nil(), "failed", "default")
            .with_error(r#"<script>"bad"</script>"#);
        let html = render_status_html(&update);
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("&quot;bad&quot;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_escape_html_order() {
        // Ampersand must be escaped first or entities double-escape.
        assert_eq!(escape_html("&lt;"), "&amp;lt;");
    }
}
