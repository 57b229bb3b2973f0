// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod filter;
pub mod ics;
pub mod ingest;
pub mod merge;
pub mod metrics;
pub mod notify;
pub mod scheduler;

// ---- Re-exports for stable public API ----
pub use crate::api::create_router;
pub use crate::config::Config;
pub use crate::merge::{MergeCoordinator, MergedResult};
pub use crate::notify::{Notifier, NotifierMux};
pub use crate::scheduler::{start_all, CacheScheduler, CalendarCache, ServedCalendar};
