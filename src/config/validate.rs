// src/config/validate.rs
use std::collections::HashSet;

use super::{Config, Modifier, NotificationService, Rule, SourceFeed};
use crate::error::ConfigError;

impl Config {
    /// Check invariants the merge pipeline relies on and normalize field
    /// names to upper case. Errors name the offending entry, e.g.
    /// `sources[1].feeds[0]`.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.notification.service != NotificationService::None
            && self
                .notification
                .url
                .as_deref()
                .map_or(true, |u| u.trim().is_empty())
        {
            return Err(ConfigError::invalid(
                "notification",
                "url is required when a service is set",
            ));
        }

        let mut endpoints = HashSet::new();
        for (i, source) in self.sources.iter_mut().enumerate() {
            let path = format!("sources[{i}]");

            let key = source.endpoint_key().to_string();
            if key.is_empty() {
                return Err(ConfigError::invalid(path, "end_point is missing"));
            }
            if !endpoints.insert(key) {
                return Err(ConfigError::invalid(path, "end_point is not unique"));
            }
            if source.refresh_interval_minutes == 0 {
                return Err(ConfigError::invalid(path, "heartbeat must be greater than 0"));
            }
            if source.feeds.is_empty() {
                return Err(ConfigError::invalid(path, "at least one feed is required"));
            }

            for (j, feed) in source.feeds.iter_mut().enumerate() {
                validate_feed(feed, &format!("{path}.feeds[{j}]"))?;
            }
        }
        Ok(())
    }
}

fn validate_feed(feed: &mut SourceFeed, path: &str) -> Result<(), ConfigError> {
    if feed.name.trim().is_empty() {
        return Err(ConfigError::invalid(path, "name is missing"));
    }
    if feed.url.trim().is_empty() {
        return Err(ConfigError::invalid(path, "URL is missing"));
    }
    let url = reqwest::Url::parse(&feed.url)
        .map_err(|e| ConfigError::invalid(path, format!("URL is invalid: {e}")))?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::invalid(path, "URL is invalid (hostname)"));
    }

    for (k, rule) in feed.rules.iter_mut().enumerate() {
        validate_rule(rule, &format!("{path}.rules[{k}]"))?;
    }
    for (k, modifier) in feed.modifiers.iter_mut().enumerate() {
        validate_modifier(modifier, &format!("{path}.modifiers[{k}]"))?;
    }
    Ok(())
}

fn validate_rule(rule: &mut Rule, path: &str) -> Result<(), ConfigError> {
    rule.field = rule.field.trim().to_ascii_uppercase();
    if !rule.check.is_stateful() && rule.field.is_empty() {
        return Err(ConfigError::invalid(path, "component is missing"));
    }
    Ok(())
}

fn validate_modifier(modifier: &mut Modifier, path: &str) -> Result<(), ConfigError> {
    modifier.field = modifier.field.trim().to_ascii_uppercase();
    if modifier.action != super::Action::AddAlarm && modifier.field.is_empty() {
        return Err(ConfigError::invalid(path, "component is missing"));
    }
    for (k, guard) in modifier.guards.iter_mut().enumerate() {
        validate_rule(guard, &format!("{path}.rules[{k}]"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::*;

    fn base() -> &'static str {
        r#"
[[sources]]
name = "One"
end_point = "one"
heartbeat = 10

[[sources.feeds]]
name = "a"
url = "http://a.example.com/a.ics"
"#
    }

    fn err_of(toml: &str) -> String {
        Config::from_toml_str(toml).unwrap_err().to_string()
    }

    #[test]
    fn base_config_is_valid() {
        assert!(Config::from_toml_str(base()).is_ok());
    }

    #[test]
    fn duplicate_endpoint_rejected_ignoring_slash_and_suffix() {
        let dup = format!(
            "{}{}",
            base(),
            r#"
[[sources]]
name = "Two"
end_point = "/one.ics"
heartbeat = 10

[[sources.feeds]]
name = "b"
url = "http://b.example.com/b.ics"
"#
        );
        let msg = err_of(&dup);
        assert!(msg.contains("sources[1]"), "{msg}");
        assert!(msg.contains("not unique"), "{msg}");
    }

    #[test]
    fn zero_heartbeat_rejected() {
        let msg = err_of(&base().replace("heartbeat = 10", "heartbeat = 0"));
        assert!(msg.contains("heartbeat"), "{msg}");
    }

    #[test]
    fn feed_url_must_have_host() {
        let msg = err_of(&base().replace("http://a.example.com/a.ics", "invalid-url"));
        assert!(msg.contains("sources[0].feeds[0]"), "{msg}");
        assert!(msg.contains("URL is invalid"), "{msg}");
    }

    #[test]
    fn feed_name_required() {
        let msg = err_of(&base().replace("name = \"a\"", "name = \"\""));
        assert!(msg.contains("name is missing"), "{msg}");
    }

    #[test]
    fn source_without_feeds_rejected() {
        let toml = r#"
[[sources]]
name = "Empty"
end_point = "empty"
heartbeat = 10
feeds = []
"#;
        assert!(err_of(toml).contains("at least one feed"));
    }

    #[test]
    fn value_rule_needs_component_but_date_rule_does_not() {
        let with_date_rule = format!(
            "{}{}",
            base(),
            "\n[[sources.feeds.rules]]\ncheck = \"FIRST_OF_MONTH\"\n"
        );
        assert!(Config::from_toml_str(&with_date_rule).is_ok());

        let with_value_rule = format!(
            "{}{}",
            base(),
            "\n[[sources.feeds.rules]]\ncheck = \"EQUALS\"\ndata = [\"x\"]\n"
        );
        let msg = err_of(&with_value_rule);
        assert!(msg.contains("rules[0]"), "{msg}");
    }

    #[test]
    fn notification_service_requires_url() {
        let toml = format!("[notification]\nservice = \"slack\"\n{}", base());
        assert!(err_of(&toml).contains("notification"));
    }
}
