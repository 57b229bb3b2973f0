//! Single-rule evaluation against one event.
//!
//! Value checks (case folding optional, any-of semantics over `values`):
//! - `CONTAINS`:     field contains ANY of the values
//! - `NOT_CONTAINS`: negation of `CONTAINS`
//! - `EQUALS`:       field equals ANY of the values
//! - `NOT_EQUALS`:   negation of `EQUALS`
//!
//! Date checks read DTSTART and latch on the feed's [`EvaluationState`]:
//! a check fires only when the day/month/year number is strictly greater
//! than anything this feed has fired on before in iteration order.

use chrono::Datelike;
use icalendar::{Component, Event};

use crate::config::{CheckKind, Rule};
use crate::error::RuleError;
use crate::ics;

/// Per-feed watermark for the `FIRST_OF_*` checks. Lives for one filtering
/// pass over one feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationState {
    current_day: Option<u32>,
    current_month: Option<u32>,
    current_year: Option<i32>,
}

impl EvaluationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_day(&self) -> Option<u32> {
        self.current_day
    }

    pub fn current_month(&self) -> Option<u32> {
        self.current_month
    }

    pub fn current_year(&self) -> Option<i32> {
        self.current_year
    }
}

/// Evaluate `rule` against `event`. Date checks may advance `state`.
pub fn evaluate(
    rule: &Rule,
    event: &Event,
    state: &mut EvaluationState,
) -> Result<bool, RuleError> {
    match rule.check {
        CheckKind::Contains => contains(rule, event),
        CheckKind::NotContains => contains(rule, event).map(|hit| !hit),
        CheckKind::Equals => equals(rule, event),
        CheckKind::NotEquals => equals(rule, event).map(|hit| !hit),
        CheckKind::FirstOfDay => {
            let date = start(event)?;
            Ok(latch(&mut state.current_day, date.day()))
        }
        CheckKind::FirstOfMonth => {
            let date = start(event)?;
            Ok(latch(&mut state.current_month, date.month()))
        }
        CheckKind::FirstOfYear => {
            let date = start(event)?;
            Ok(latch(&mut state.current_year, date.year()))
        }
    }
}

/// Fail-closed wrapper: an evaluation error counts as a miss.
pub fn matches(rule: &Rule, event: &Event, state: &mut EvaluationState) -> bool {
    match evaluate(rule, event, state) {
        Ok(hit) => hit,
        Err(e) => {
            tracing::warn!(
                target: "filter",
                rule = %rule.name,
                check = ?rule.check,
                uid = event.property_value("UID").unwrap_or_default(),
                error = %e,
                "could not complete check"
            );
            false
        }
    }
}

// --- internals ---

fn field<'e>(rule: &Rule, event: &'e Event) -> Result<&'e str, RuleError> {
    event
        .property_value(&rule.field)
        .ok_or_else(|| RuleError::MissingField {
            field: rule.field.clone(),
        })
}

fn contains(rule: &Rule, event: &Event) -> Result<bool, RuleError> {
    let value = rule.transform(field(rule, event)?);
    Ok(rule
        .values
        .iter()
        .any(|v| value.contains(rule.transform(v).as_str())))
}

fn equals(rule: &Rule, event: &Event) -> Result<bool, RuleError> {
    let value = rule.transform(field(rule, event)?);
    Ok(rule.values.iter().any(|v| value == rule.transform(v)))
}

fn start(event: &Event) -> Result<chrono::NaiveDate, RuleError> {
    ics::start_date(event).ok_or(RuleError::NoStartTime)
}

/// Fire and advance when `value` is strictly above the mark; otherwise leave it.
fn latch<T: Ord + Copy>(mark: &mut Option<T>, value: T) -> bool {
    match *mark {
        Some(current) if value <= current => false,
        _ => {
            *mark = Some(value);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use icalendar::EventLike;

    fn rule(check: CheckKind, values: &[&str], case_sensitive: bool) -> Rule {
        Rule {
            name: "test".into(),
            field: "SUMMARY".into(),
            check,
            case_sensitive,
            values: values.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn titled(summary: &str) -> Event {
        Event::new().summary(summary).done()
    }

    fn on_day(day: u32) -> Event {
        Event::new()
            .summary("x")
            .starts(Utc.with_ymd_and_hms(2024, 3, day, 10, 0, 0).unwrap())
            .done()
    }

    fn eval(r: &Rule, e: &Event) -> bool {
        evaluate(r, e, &mut EvaluationState::new()).unwrap()
    }

    #[test]
    fn contains_respects_case_mode() {
        let e = titled("Team Meeting");
        assert!(eval(&rule(CheckKind::Contains, &["meeting"], false), &e));
        assert!(!eval(&rule(CheckKind::Contains, &["meeting"], true), &e));
        assert!(eval(&rule(CheckKind::Contains, &["Meeting"], true), &e));
    }

    #[test]
    fn contains_matches_any_value() {
        let e = titled("Dentist appointment");
        let r = rule(CheckKind::Contains, &["gym", "dentist"], false);
        assert!(eval(&r, &e));
        assert!(!eval(&r, &titled("Conference")));
    }

    #[test]
    fn empty_values_never_match() {
        for summary in ["", "Team Meeting", "anything"] {
            let e = titled(summary);
            assert!(!eval(&rule(CheckKind::Contains, &[], false), &e));
            assert!(!eval(&rule(CheckKind::Equals, &[], true), &e));
            assert!(eval(&rule(CheckKind::NotContains, &[], false), &e));
            assert!(eval(&rule(CheckKind::NotEquals, &[], true), &e));
        }
    }

    #[test]
    fn negations_are_exact_complements() {
        let events = [titled("Team Meeting"), titled("Conference"), titled("TEAM")];
        let values: [&[&str]; 3] = [&["team"], &["Conference", "x"], &[]];
        for e in &events {
            for vals in values {
                for cs in [true, false] {
                    assert_eq!(
                        eval(&rule(CheckKind::NotContains, vals, cs), e),
                        !eval(&rule(CheckKind::Contains, vals, cs), e)
                    );
                    assert_eq!(
                        eval(&rule(CheckKind::NotEquals, vals, cs), e),
                        !eval(&rule(CheckKind::Equals, vals, cs), e)
                    );
                }
            }
        }
    }

    #[test]
    fn equals_is_whole_value() {
        let r = rule(CheckKind::Equals, &["team meeting"], false);
        assert!(eval(&r, &titled("Team Meeting")));
        assert!(!eval(&r, &titled("Team")));
    }

    #[test]
    fn missing_field_fails_closed() {
        let mut r = rule(CheckKind::Contains, &["x"], false);
        r.field = "LOCATION".into();
        let e = titled("x");
        let mut st = EvaluationState::new();
        assert_eq!(
            evaluate(&r, &e, &mut st),
            Err(RuleError::MissingField {
                field: "LOCATION".into()
            })
        );
        assert!(!matches(&r, &e, &mut st));

        // NOT_* does not flip a missing field into a hit
        r.check = CheckKind::NotContains;
        assert!(!matches(&r, &e, &mut st));
    }

    #[test]
    fn first_of_day_latches_in_iteration_order() {
        let r = rule(CheckKind::FirstOfDay, &[], false);
        let mut st = EvaluationState::new();
        let got: Vec<bool> = [5, 5, 6, 5]
            .into_iter()
            .map(|d| evaluate(&r, &on_day(d), &mut st).unwrap())
            .collect();
        assert_eq!(got, vec![true, false, true, false]);
        assert_eq!(st.current_day(), Some(6));
    }

    #[test]
    fn first_of_month_and_year_use_their_component() {
        let month = rule(CheckKind::FirstOfMonth, &[], false);
        let year = rule(CheckKind::FirstOfYear, &[], false);
        let mut st = EvaluationState::new();

        let april = Event::new()
            .starts(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap())
            .done();
        let earlier = Event::new()
            .starts(NaiveDate::from_ymd_opt(2019, 2, 1).unwrap())
            .done();

        assert!(evaluate(&month, &april, &mut st).unwrap());
        assert!(evaluate(&year, &april, &mut st).unwrap());
        assert!(!evaluate(&month, &earlier, &mut st).unwrap());
        assert!(!evaluate(&year, &earlier, &mut st).unwrap());
        assert_eq!(st.current_month(), Some(4));
        assert_eq!(st.current_year(), Some(2024));
        // day watermark untouched by other kinds
        assert_eq!(st.current_day(), None);
    }

    #[test]
    fn date_check_without_start_fails_closed_and_keeps_state() {
        let r = rule(CheckKind::FirstOfDay, &[], false);
        let mut st = EvaluationState::new();
        assert_eq!(
            evaluate(&r, &titled("no start"), &mut st),
            Err(RuleError::NoStartTime)
        );
        assert_eq!(st, EvaluationState::new());
        assert!(evaluate(&r, &on_day(1), &mut st).unwrap());
    }
}
