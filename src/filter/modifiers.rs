use icalendar::{Component, Event, EventLike};

use super::rules::{self, EvaluationState};
use crate::config::{Action, Modifier};
use crate::ics;

/// Apply `modifiers` to `event` in declaration order and return how many
/// were applied.
///
/// Each modifier's guard rules are AND-combined (empty passes). The first
/// modifier whose guard fails ends processing for this event: it and every
/// later modifier are skipped.
pub fn apply_modifiers(
    modifiers: &[Modifier],
    event: &mut Event,
    state: &mut EvaluationState,
) -> usize {
    let mut applied = 0;
    for modifier in modifiers {
        let guard_passed = modifier
            .guards
            .iter()
            .all(|g| rules::matches(g, event, state));
        if !guard_passed {
            tracing::debug!(
                target: "filter",
                modifier = %modifier.name,
                applied,
                "guard failed, skipping remaining modifiers"
            );
            break;
        }
        apply(modifier, event);
        applied += 1;
    }
    applied
}

fn apply(modifier: &Modifier, event: &mut Event) {
    let field = modifier.field.as_str();
    let data = modifier.data.as_str();
    match modifier.action {
        Action::Append => {
            let value = format!("{}{data}", event.property_value(field).unwrap_or_default());
            event.add_property(field, value);
        }
        Action::Prepend => {
            let value = format!("{data}{}", event.property_value(field).unwrap_or_default());
            event.add_property(field, value);
        }
        Action::Replace => {
            event.add_property(field, data);
        }
        Action::AddAlarm => {
            event.alarm(ics::display_alarm(&modifier.name, data));
        }
    }
}
