//! iCal merger: binary entrypoint.
//! Loads the config, bootstraps every merged calendar, then serves them
//! through the Axum router with background refresh tasks running.

use std::sync::Arc;

use ical_merger::ingest::{FeedFetcher, HttpFetcher};
use ical_merger::metrics::Metrics;
use ical_merger::{create_router, start_all, Config, NotifierMux};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `RUST_LOG` wins; otherwise the config's `log_level`, otherwise `info`.
/// The runtime may already have installed a subscriber, so this is best-effort.
fn init_tracing(fallback: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(fallback.unwrap_or("info")));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    let cfg = Config::load_default().map_err(anyhow::Error::from)?;
    init_tracing(cfg.log_level.as_deref());

    let metrics = Metrics::init()?;
    let notifier = NotifierMux::from_config(&cfg.notification);
    let fetcher: Arc<dyn FeedFetcher> =
        Arc::new(HttpFetcher::new().with_timeout(cfg.fetch_timeout()));

    // A calendar that cannot be built once must not be served empty.
    let calendars = start_all(&cfg.sources, fetcher, notifier)
        .await
        .map_err(anyhow::Error::from)?;

    let router = create_router(calendars).merge(metrics.router());
    Ok(router.into())
}
