// src/filter/mod.rs
//! Per-feed filter/modify pass.
//!
//! Events are visited in upstream order with one [`EvaluationState`] for the
//! whole feed, so `FIRST_OF_*` checks see a consistent watermark across the
//! batch. Survivors keep their relative order.

pub mod modifiers;
pub mod rules;

use icalendar::Event;

use crate::config::{Rule, SourceFeed};

pub use modifiers::apply_modifiers;
pub use rules::{evaluate, EvaluationState};

/// True if `rules` is empty or any rule matches (short-circuits on the first hit).
pub fn survives(rule_set: &[Rule], event: &Event, state: &mut EvaluationState) -> bool {
    rule_set.is_empty() || rule_set.iter().any(|r| rules::matches(r, event, state))
}

/// Run the feed's rules over `events` and rewrite the survivors with its modifiers.
pub fn filter_feed(feed: &SourceFeed, events: Vec<Event>) -> Vec<Event> {
    let mut state = EvaluationState::new();
    let total = events.len();

    let kept: Vec<Event> = events
        .into_iter()
        .filter_map(|mut event| {
            if !survives(&feed.rules, &event, &mut state) {
                return None;
            }
            apply_modifiers(&feed.modifiers, &mut event, &mut state);
            Some(event)
        })
        .collect();

    tracing::debug!(
        target: "filter",
        feed = %feed.name,
        total,
        kept = kept.len(),
        "feed filtered"
    );
    kept
}
