use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::Notifier;

const USERNAME: &str = "iCal Merger Service";
/// Backoff doubles per attempt; past this the delay stops being useful.
const MAX_RETRIES: u8 = 8;

#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.clamp(1, MAX_RETRIES);
        self
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        let payload = DiscordWebhookPayload {
            content: message,
            username: USERNAME,
        };

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status_ref() {
                    Ok(_) => return Ok(()),
                    Err(e) => anyhow!("Discord webhook HTTP error: {e}"),
                },
                Err(e) => anyhow!("Discord webhook request failed: {e}"),
            };

            if attempt >= self.max_retries {
                return Err(err);
            }
            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
        }
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

#[derive(Serialize)]
struct DiscordWebhookPayload<'a> {
    content: &'a str,
    username: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_shape() {
        let p = DiscordWebhookPayload {
            content: "[Family] merged in 1.2s",
            username: USERNAME,
        };
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["content"], "[Family] merged in 1.2s");
        assert_eq!(v["username"], USERNAME);
    }

    #[test]
    fn retries_never_drop_below_one_attempt() {
        let n = DiscordNotifier::new("http://localhost/hook".into()).with_retries(0);
        assert_eq!(n.max_retries, 1);
    }

    #[test]
    fn retries_are_capped_so_backoff_cannot_overflow() {
        let n = DiscordNotifier::new("http://localhost/hook".into()).with_retries(200);
        assert_eq!(n.max_retries, MAX_RETRIES);
        let last_delay_ms = 500u64.checked_shl(u32::from(n.max_retries) - 1);
        assert_eq!(last_delay_ms, Some(64_000));
    }
}
