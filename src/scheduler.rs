// src/scheduler.rs
//! Per-output-source cache and its periodic refresh task.
//!
//! The refresh task is the only writer. Readers clone an `Arc` under a read
//! lock that is never held across a fetch, so a slow upstream never blocks a
//! request and a reader sees either the old or the new calendar, whole.

use metrics::{counter, gauge, histogram};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::OutputSource;
use crate::error::{BootstrapError, MergeError};
use crate::ingest::FeedFetcher;
use crate::merge::{MergeCoordinator, MergedResult};
use crate::notify::NotifierMux;

/// Read handle on the last good merge of one output source.
#[derive(Clone, Debug)]
pub struct CalendarCache {
    current: Arc<RwLock<Arc<MergedResult>>>,
    refreshing: Arc<AtomicBool>,
}

impl CalendarCache {
    fn new(initial: MergedResult) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(initial))),
            refreshing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Latest merged calendar. Never fetches.
    pub fn serve(&self) -> Arc<MergedResult> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// True while a refresh for this source is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    fn replace(&self, next: MergedResult) {
        let next = Arc::new(next);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = next;
    }
}

pub struct CacheScheduler {
    coordinator: MergeCoordinator,
    cache: CalendarCache,
    interval: Duration,
}

impl CacheScheduler {
    /// Run the first merge. Failing here means the endpoint has nothing to
    /// serve, so the caller should treat it as fatal.
    pub async fn bootstrap(coordinator: MergeCoordinator) -> Result<Self, BootstrapError> {
        let output = coordinator.source().name.clone();
        tracing::info!(target: "cache", output = %output, "bootstrapping calendar");

        let first = coordinator
            .merge()
            .await
            .map_err(|source| BootstrapError {
                output: output.clone(),
                source,
            })?;
        gauge!("cache_last_refresh_ts").set(first.built_at.timestamp() as f64);

        let interval = coordinator.source().refresh_interval();
        Ok(Self {
            coordinator,
            cache: CalendarCache::new(first),
            interval,
        })
    }

    pub fn cache(&self) -> CalendarCache {
        self.cache.clone()
    }

    pub fn serve(&self) -> Arc<MergedResult> {
        self.cache.serve()
    }

    pub fn source(&self) -> &OutputSource {
        self.coordinator.source()
    }

    /// One scheduled cycle. On failure the previous calendar stays in place.
    pub async fn refresh(&self) -> Result<(), MergeError> {
        let t0 = Instant::now();
        let output = self.source().name.as_str();
        let notifier = self.coordinator.notifier();

        tracing::info!(target: "cache", output, "cache invalidated, remerging ics files");
        notifier.emit(self.coordinator.tag("Invalidated cache, remerging ics files"));

        self.cache.refreshing.store(true, Ordering::Release);
        let result = self.coordinator.merge().await;
        self.cache.refreshing.store(false, Ordering::Release);

        match result {
            Ok(next) => {
                histogram!("cache_refresh_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
                gauge!("cache_last_refresh_ts").set(next.built_at.timestamp() as f64);
                self.cache.replace(next);
                tracing::info!(
                    target: "cache",
                    output,
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "cache refreshed"
                );
                Ok(())
            }
            Err(e) => {
                counter!("cache_refresh_failures_total").increment(1);
                tracing::error!(target: "cache", output, error = %e, "refresh failed, keeping previous calendar");
                notifier.emit(self.coordinator.tag(&format!("Error merging ical files: {e}")));
                Err(e)
            }
        }
    }

    /// Refresh every `interval`, first tick one interval from now. A slow
    /// merge delays the next tick rather than queueing extra ones.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.interval;
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let _ = self.refresh().await;
            }
        })
    }
}

/// A bootstrapped calendar ready for the router.
#[derive(Clone, Debug)]
pub struct ServedCalendar {
    /// Endpoint key, e.g. `family` for `/family.ics`.
    pub endpoint: String,
    pub cache: CalendarCache,
}

/// Bootstrap every output source in order and start its refresh task.
/// Stops at the first source that cannot produce a calendar.
pub async fn start_all(
    sources: &[OutputSource],
    fetcher: Arc<dyn FeedFetcher>,
    notifier: NotifierMux,
) -> Result<Vec<ServedCalendar>, BootstrapError> {
    let mut served = Vec::with_capacity(sources.len());
    for source in sources {
        let endpoint = source.endpoint_key().to_string();
        let coordinator = MergeCoordinator::new(source.clone(), Arc::clone(&fetcher), notifier.clone());
        let scheduler = CacheScheduler::bootstrap(coordinator).await?;
        let cache = scheduler.cache();
        tracing::info!(
            target: "cache",
            output = %source.name,
            route = %source.route_path(),
            every_min = source.refresh_interval_minutes,
            "serving calendar"
        );
        scheduler.spawn();
        served.push(ServedCalendar { endpoint, cache });
    }
    Ok(served)
}
