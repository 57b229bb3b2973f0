// src/ingest/http.rs
use async_trait::async_trait;
use icalendar::Event;
use metrics::{counter, histogram};
use reqwest::Client;
use std::time::Duration;

use crate::config::SourceFeed;
use crate::error::FetchError;
use crate::ics;
use crate::ingest::types::FeedFetcher;

const USER_AGENT: &str = concat!("ical-merger/", env!("CARGO_PKG_VERSION"));

/// Fetches feeds over HTTP(S) and parses the body as iCalendar.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl FeedFetcher for HttpFetcher {
    async fn fetch(&self, feed: &SourceFeed) -> Result<Vec<Event>, FetchError> {
        let t0 = std::time::Instant::now();
        let result = self.get(feed).await;

        histogram!("ingest_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        match &result {
            Ok(events) => {
                counter!("feed_events_total").increment(events.len() as u64);
            }
            Err(e) => {
                tracing::warn!(target: "ingest", feed = %feed.name, error = %e, "feed fetch failed");
                counter!("ingest_feed_errors_total").increment(1);
            }
        }
        result
    }
}

impl HttpFetcher {
    async fn get(&self, feed: &SourceFeed) -> Result<Vec<Event>, FetchError> {
        let resp = self
            .client
            .get(&feed.url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status { status });
        }

        let body = resp.text().await?;
        ics::parse_events(&body)
    }
}
