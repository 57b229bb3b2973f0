use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use metrics::counter;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::ics;
use crate::scheduler::{CalendarCache, ServedCalendar};

#[derive(Clone)]
pub struct AppState {
    calendars: Arc<HashMap<String, CalendarCache>>,
}

impl AppState {
    pub fn new(calendars: impl IntoIterator<Item = ServedCalendar>) -> Self {
        let map = calendars
            .into_iter()
            .map(|c| (c.endpoint, c.cache))
            .collect();
        Self {
            calendars: Arc::new(map),
        }
    }
}

/// `GET /<endpoint>.ics` for every served calendar, plus `GET /health`.
pub fn create_router(calendars: impl IntoIterator<Item = ServedCalendar>) -> Router {
    let state = AppState::new(calendars);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/{*file}", get(serve_calendar))
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn serve_calendar(
    State(state): State<AppState>,
    Path(file): Path<String>,
    headers: HeaderMap,
) -> Response {
    let t0 = Instant::now();
    let Some(cache) = file
        .strip_suffix(".ics")
        .and_then(|key| state.calendars.get(key))
    else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let merged = cache.serve();
    counter!("calendar_requests_total").increment(1);

    let etag = HeaderValue::from_str(&merged.etag).ok();
    let not_modified = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|seen| etag_matches(seen, &merged.etag));

    let mut resp = if not_modified {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        merged.calendar.clone().into_response()
    };

    let h = resp.headers_mut();
    h.insert(header::CONTENT_TYPE, HeaderValue::from_static(ics::CONTENT_TYPE));
    if let Ok(v) = HeaderValue::from_str(&format!("attachment; filename={file}")) {
        h.insert(header::CONTENT_DISPOSITION, v);
    }
    if let Some(v) = etag {
        h.insert(header::ETAG, v);
    }

    tracing::info!(
        target: "api",
        file = %file,
        events = merged.event_count,
        not_modified,
        elapsed_us = t0.elapsed().as_micros() as u64,
        "served calendar"
    );
    resp
}

/// `If-None-Match` is `*` or a comma-separated list of tags, weak or strong.
fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    if_none_match.split(',').map(str::trim).any(|tag| {
        tag == "*" || tag.strip_prefix("W/").unwrap_or(tag) == etag
    })
}
