// tests/common/mod.rs
// Shared fixtures for integration tests: in-memory fetcher, recording
// notifier, and small builders for events and output sources.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use icalendar::{Component, Event, EventLike};
use tokio::sync::mpsc;

use ical_merger::config::{OutputSource, SourceFeed};
use ical_merger::error::FetchError;
use ical_merger::ingest::FeedFetcher;
use ical_merger::{ics, Notifier, NotifierMux};

pub const WORK_ICS: &str = include_str!("../fixtures/work.ics");
pub const HOME_ICS: &str = include_str!("../fixtures/home.ics");

/// Serves canned event lists keyed by feed URL. Unknown URLs answer 404.
#[derive(Default)]
pub struct MemoryFetcher {
    feeds: Mutex<HashMap<String, Result<Vec<Event>, reqwest::StatusCode>>>,
    calls: AtomicUsize,
}

impl MemoryFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, url: &str, events: Vec<Event>) {
        self.feeds
            .lock()
            .unwrap()
            .insert(url.to_string(), Ok(events));
    }

    pub fn set_body(&self, url: &str, body: &str) {
        self.set(url, ics::parse_events(body).expect("fixture parses"));
    }

    pub fn fail(&self, url: &str, status: reqwest::StatusCode) {
        self.feeds
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(status));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl FeedFetcher for MemoryFetcher {
    async fn fetch(&self, feed: &SourceFeed) -> Result<Vec<Event>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.feeds.lock().unwrap().get(&feed.url) {
            Some(Ok(events)) => Ok(events.clone()),
            Some(Err(status)) => Err(FetchError::Status { status: *status }),
            None => Err(FetchError::Status {
                status: reqwest::StatusCode::NOT_FOUND,
            }),
        }
    }
}

/// Forwards every notification into a channel the test can drain.
pub struct RecordingNotifier(mpsc::UnboundedSender<String>);

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &str) -> anyhow::Result<()> {
        self.0.send(message.to_string())?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

pub fn recording_notifier() -> (NotifierMux, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let mux = NotifierMux::disabled().with_sink(Arc::new(RecordingNotifier(tx)));
    (mux, rx)
}

/// Collect notifications until the channel has been quiet for a moment.
pub async fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut out = Vec::new();
    while let Ok(Some(msg)) = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await {
        out.push(msg);
    }
    out
}

pub fn event(uid: &str, summary: &str, day: u32) -> Event {
    Event::new()
        .uid(uid)
        .summary(summary)
        .starts(Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap())
        .done()
}

pub fn feed(name: &str) -> SourceFeed {
    SourceFeed {
        name: name.to_string(),
        url: format!("http://feeds.test/{name}.ics"),
        rules: vec![],
        modifiers: vec![],
    }
}

pub fn output(name: &str, endpoint: &str, feeds: Vec<SourceFeed>) -> OutputSource {
    OutputSource {
        name: name.to_string(),
        endpoint: endpoint.to_string(),
        refresh_interval_minutes: 1,
        feeds,
    }
}

/// UIDs of the VEVENTs in a serialized calendar, in document order.
pub fn uids(calendar: &str) -> Vec<String> {
    ics::parse_events(calendar)
        .expect("merged calendar parses")
        .iter()
        .map(|e| e.property_value("UID").unwrap_or_default().to_string())
        .collect()
}
