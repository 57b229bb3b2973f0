// src/ingest/mod.rs
pub mod http;
pub mod types;

pub use http::HttpFetcher;
pub use types::FeedFetcher;
