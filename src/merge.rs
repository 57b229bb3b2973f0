//! # Merge Coordinator
//! Builds one merged calendar for one output source: fetch every feed in
//! declaration order, filter/modify each, concatenate, serialize.
//!
//! A single failed fetch aborts the whole merge; nothing partial is returned.

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;

use crate::config::OutputSource;
use crate::error::MergeError;
use crate::filter;
use crate::ics;
use crate::ingest::FeedFetcher;
use crate::notify::NotifierMux;

/// One complete, serialized merge. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedResult {
    pub calendar: String,
    /// Space-joined feed names in declaration order.
    pub description: String,
    pub built_at: DateTime<Utc>,
    pub event_count: usize,
    /// Quoted strong validator derived from `calendar`.
    pub etag: String,
}

pub struct MergeCoordinator {
    source: Arc<OutputSource>,
    fetcher: Arc<dyn FeedFetcher>,
    notifier: NotifierMux,
}

impl MergeCoordinator {
    pub fn new(source: OutputSource, fetcher: Arc<dyn FeedFetcher>, notifier: NotifierMux) -> Self {
        Self {
            source: Arc::new(source),
            fetcher,
            notifier,
        }
    }

    pub fn source(&self) -> &OutputSource {
        &self.source
    }

    pub fn notifier(&self) -> &NotifierMux {
        &self.notifier
    }

    /// `[<output name>] <message>`
    pub fn tag(&self, message: &str) -> String {
        format!("[{}] {}", self.source.name, message)
    }

    pub async fn merge(&self) -> Result<MergedResult, MergeError> {
        let t0 = Instant::now();
        let output = self.source.name.as_str();
        counter!("merge_runs_total").increment(1);

        // Fetch everything first so a late failure discards earlier feeds.
        let mut loaded = Vec::with_capacity(self.source.feeds.len());
        for feed in &self.source.feeds {
            match self.fetcher.fetch(feed).await {
                Ok(events) => {
                    tracing::info!(
                        target: "merge",
                        output,
                        feed = %feed.name,
                        events = events.len(),
                        "loaded {} events from {}",
                        events.len(),
                        feed.name
                    );
                    loaded.push((feed, events));
                }
                Err(source) => {
                    let err = MergeError::Fetch {
                        feed: feed.name.clone(),
                        source,
                    };
                    tracing::error!(target: "merge", output, error = %err, "merge aborted");
                    counter!("merge_failures_total").increment(1);
                    self.notifier
                        .emit(self.tag(&format!("Could not complete request, {err}")));
                    return Err(err);
                }
            }
        }

        let mut names = Vec::with_capacity(loaded.len());
        let mut merged = Vec::new();
        for (feed, events) in loaded {
            let kept = filter::filter_feed(feed, events);
            tracing::info!(
                target: "merge",
                output,
                feed = %feed.name,
                kept = kept.len(),
                "adding {} events from {}",
                kept.len(),
                feed.name
            );
            counter!("feed_events_kept_total").increment(kept.len() as u64);
            names.push(feed.name.as_str());
            merged.extend(kept);
        }

        let description = names.join(" ");
        let event_count = merged.len();
        let calendar = ics::build_calendar(&self.source.name, &description, merged);
        let etag = etag_for(&calendar);

        let elapsed = t0.elapsed();
        histogram!("merge_duration_ms").record(elapsed.as_secs_f64() * 1_000.0);
        tracing::info!(
            target: "merge",
            output,
            events = event_count,
            elapsed_ms = elapsed.as_millis() as u64,
            "merge complete"
        );
        self.notifier
            .emit(self.tag(&format!("Merged ical files in {elapsed:.2?}")));

        Ok(MergedResult {
            calendar,
            description,
            built_at: Utc::now(),
            event_count,
            etag,
        })
    }
}

fn etag_for(body: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(body.as_bytes());
    let mut out = String::with_capacity(34);
    out.push('"');
    for b in digest.iter().take(16) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out.push('"');
    out
}
