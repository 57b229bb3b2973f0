// src/notify/mod.rs
//! Status notifications (merge started / finished / failed).
//!
//! Sinks implement [`Notifier`]; the merge pipeline only ever sees a
//! [`NotifierMux`], which delivers in the background and swallows failures
//! after logging them.

pub mod discord;
pub mod slack;

use anyhow::Result;
use std::sync::Arc;

use crate::config::{NotificationConfig, NotificationService};

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Cloneable fan-out over zero or more sinks. Fire-and-forget.
#[derive(Clone, Default)]
pub struct NotifierMux {
    sinks: Vec<Arc<dyn Notifier>>,
}

impl NotifierMux {
    /// A mux with no sinks; `emit` only logs at debug level.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn new(sinks: Vec<Arc<dyn Notifier>>) -> Self {
        Self { sinks }
    }

    pub fn with_sink(mut self, sink: Arc<dyn Notifier>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn from_config(cfg: &NotificationConfig) -> Self {
        let url = cfg.url.clone().unwrap_or_default();
        let sink: Option<Arc<dyn Notifier>> = match cfg.service {
            NotificationService::None => None,
            NotificationService::Discord => Some(Arc::new(discord::DiscordNotifier::new(url))),
            NotificationService::Slack => Some(Arc::new(slack::SlackNotifier::new(url))),
        };
        let mux = Self::new(sink.into_iter().collect());
        if mux.is_enabled() {
            tracing::info!(target: "notify", service = ?cfg.service, "notifications enabled");
        } else {
            tracing::info!(target: "notify", "notifications disabled");
        }
        mux
    }

    pub fn is_enabled(&self) -> bool {
        !self.sinks.is_empty()
    }

    /// Queue `message` for every sink. Must be called inside a tokio runtime.
    pub fn emit(&self, message: impl Into<String>) {
        let message: Arc<str> = Arc::from(message.into());
        tracing::debug!(target: "notify", text = %message, "sending notification");
        for sink in &self.sinks {
            let sink = Arc::clone(sink);
            let message = Arc::clone(&message);
            tokio::spawn(async move {
                if let Err(e) = sink.send(&message).await {
                    tracing::warn!(target: "notify", sink = sink.name(), error = ?e, "notification failed");
                }
            });
        }
    }
}

impl std::fmt::Debug for NotifierMux {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.sinks.iter().map(|s| s.name()).collect();
        f.debug_struct("NotifierMux").field("sinks", &names).finish()
    }
}
