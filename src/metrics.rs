use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and register metric descriptions.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("merge_runs_total", "Merges started, bootstrap included.");
        describe_counter!("merge_failures_total", "Merges aborted by a feed fetch error.");
        describe_histogram!("merge_duration_ms", "Wall time of successful merges in milliseconds.");
        describe_counter!("feed_events_total", "Events parsed from upstream feeds.");
        describe_counter!(
            "feed_events_kept_total",
            "Events surviving feed rules and added to a merged calendar."
        );
        describe_counter!("ingest_feed_errors_total", "Upstream fetch/parse errors.");
        describe_histogram!("ingest_fetch_ms", "Upstream fetch + parse time in milliseconds.");
        describe_counter!(
            "cache_refresh_failures_total",
            "Scheduled refreshes that kept the previous calendar."
        );
        describe_histogram!("cache_refresh_ms", "Wall time of successful scheduled refreshes.");
        describe_gauge!("cache_last_refresh_ts", "Unix ts of the last successful merge.");
        describe_counter!("calendar_requests_total", "Calendar requests served from cache.");
    });
}
