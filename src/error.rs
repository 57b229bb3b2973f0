//! Error taxonomy for the merge pipeline.
//!
//! Rule errors are recovered where they happen (the rule counts as a miss).
//! Fetch errors abort one merge cycle; whether that is fatal depends on the
//! caller (bootstrap vs. scheduled refresh).

use thiserror::Error;

/// A single rule could not be evaluated against an event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// The event has no property with the rule's target field name.
    #[error("event has no `{field}` property")]
    MissingField { field: String },

    /// A date-based rule ran against an event without a usable DTSTART.
    #[error("event has no start time")]
    NoStartTime,
}

/// Retrieving or decoding one upstream feed failed.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("upstream answered {status}")]
    Status { status: reqwest::StatusCode },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed calendar: {0}")]
    Parse(String),
}

/// A merge for one output source was aborted.
#[derive(Error, Debug)]
pub enum MergeError {
    #[error("error loading {feed}: {source}")]
    Fetch {
        feed: String,
        #[source]
        source: FetchError,
    },
}

impl MergeError {
    /// Name of the feed that broke the merge.
    pub fn feed(&self) -> &str {
        match self {
            MergeError::Fetch { feed, .. } => feed,
        }
    }
}

/// The mandatory first merge failed; the endpoint must not start serving.
#[derive(Error, Debug)]
#[error("bootstrap of `{output}` failed: {source}")]
pub struct BootstrapError {
    pub output: String,
    #[source]
    pub source: MergeError,
}

/// The configuration file could not be read or did not validate.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("reading config from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("parsing JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{path}: {message}")]
    Invalid { path: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            path: path.into(),
            message: message.into(),
        }
    }
}
