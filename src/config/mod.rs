// src/config/mod.rs
//! Service configuration: output sources, their feeds, and the rules and
//! modifiers attached to each feed.
//!
//! Loaded once at startup; everything downstream treats it as immutable.
//! Unknown check kinds and actions are rejected by serde, so the filter
//! engine only ever sees the closed enums below.

mod validate;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const ENV_CONFIG_PATH: &str = "ICAL_MERGER_CONFIG";

fn default_fetch_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub notification: NotificationConfig,
    /// Fallback tracing filter when `RUST_LOG` is unset, e.g. "info" or "ical_merger=debug".
    #[serde(default)]
    pub log_level: Option<String>,
    /// Per-request timeout for upstream calendar fetches.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default)]
    pub sources: Vec<OutputSource>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationService {
    #[default]
    None,
    Discord,
    Slack,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub service: NotificationService,
    #[serde(default)]
    pub url: Option<String>,
}

/// One published merged calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSource {
    /// Calendar display name (`X-WR-CALNAME`) and notification tag.
    #[serde(alias = "xwr_name")]
    pub name: String,
    #[serde(rename = "end_point")]
    pub endpoint: String,
    /// Minutes between background refreshes.
    #[serde(rename = "heartbeat")]
    pub refresh_interval_minutes: u64,
    #[serde(alias = "info")]
    pub feeds: Vec<SourceFeed>,
}

impl OutputSource {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_minutes.saturating_mul(60))
    }

    /// Endpoint without a leading slash or `.ics` suffix; used for routing and uniqueness.
    pub fn endpoint_key(&self) -> &str {
        let e = self.endpoint.trim().trim_start_matches('/');
        e.strip_suffix(".ics").unwrap_or(e)
    }

    /// Router path serving this calendar, e.g. `/family.ics`.
    pub fn route_path(&self) -> String {
        format!("/{}.ics", self.endpoint_key())
    }
}

/// One upstream calendar contributing to an output source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFeed {
    pub name: String,
    pub url: String,
    /// OR-combined; empty keeps every event.
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckKind {
    Contains,
    NotContains,
    Equals,
    NotEquals,
    FirstOfDay,
    FirstOfMonth,
    FirstOfYear,
}

impl CheckKind {
    /// Date-based kinds read DTSTART and the feed watermark instead of a field.
    pub fn is_stateful(self) -> bool {
        matches!(
            self,
            CheckKind::FirstOfDay | CheckKind::FirstOfMonth | CheckKind::FirstOfYear
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub name: String,
    /// ICS property name, e.g. `SUMMARY`. Ignored by date-based kinds.
    #[serde(rename = "component", default)]
    pub field: String,
    pub check: CheckKind,
    #[serde(rename = "case", default)]
    pub case_sensitive: bool,
    #[serde(rename = "data", default)]
    pub values: Vec<String>,
}

impl Rule {
    /// Case folding applied to both the field value and the rule values.
    pub fn transform(&self, s: &str) -> String {
        if self.case_sensitive {
            s.to_string()
        } else {
            s.to_lowercase()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Append,
    Prepend,
    Replace,
    #[serde(rename = "ALARM", alias = "ADD_ALARM")]
    AddAlarm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Modifier {
    pub name: String,
    #[serde(rename = "component", default)]
    pub field: String,
    pub action: Action,
    #[serde(default)]
    pub data: String,
    /// AND-combined; empty always applies.
    #[serde(rename = "rules", default)]
    pub guards: Vec<Rule>,
}

impl Config {
    /// Load from an explicit path. `.json` files are read as JSON, anything else as TOML.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = if ext == "json" {
            Self::from_json_str(&content)?
        } else {
            Self::from_toml_str(&content)?
        };
        tracing::info!(
            target: "config",
            path = %path.display(),
            sources = cfg.sources.len(),
            "config loaded"
        );
        Ok(cfg)
    }

    /// Load using `$ICAL_MERGER_CONFIG`, falling back to `config.toml`.
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load_from(&default_path())
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let mut cfg: Config = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let mut cfg: Config = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}

pub fn default_path() -> PathBuf {
    std::env::var(ENV_CONFIG_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}
