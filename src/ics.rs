//! iCalendar wire format: body -> ordered VEVENT list, and merged event list -> body.

use chrono::{Duration, NaiveDate};
use icalendar::{
    Alarm, Calendar, CalendarComponent, CalendarDateTime, Component, DatePerhapsTime, Event,
    Trigger,
};

use crate::error::FetchError;

pub const CONTENT_TYPE: &str = "text/calendar; charset=utf-8";

/// Parse an iCalendar body and return its events in document order.
pub fn parse_events(body: &str) -> Result<Vec<Event>, FetchError> {
    if !body.trim_start().starts_with("BEGIN:VCALENDAR") {
        return Err(FetchError::Parse("body is not a VCALENDAR".into()));
    }
    let calendar: Calendar = body.parse().map_err(FetchError::Parse)?;
    Ok(calendar
        .components
        .into_iter()
        .filter_map(|c| match c {
            CalendarComponent::Event(e) => Some(e),
            _ => None,
        })
        .collect())
}

/// Serialize a merged calendar. `name` becomes X-WR-CALNAME and
/// `description` X-WR-CALDESC; events keep the given order.
pub fn build_calendar(name: &str, description: &str, events: Vec<Event>) -> String {
    let mut cal = Calendar::new();
    cal.name(name).description(description);
    for event in events {
        cal.push(event);
    }
    cal.done().to_string()
}

/// Calendar date of the event's DTSTART. Zoned and floating times use their
/// wall-clock date, UTC times the UTC date.
pub fn start_date(event: &Event) -> Option<NaiveDate> {
    match event.get_start()? {
        DatePerhapsTime::Date(d) => Some(d),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => Some(dt.date_naive()),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(dt)) => Some(dt.date()),
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, .. }) => {
            Some(date_time.date())
        }
    }
}

/// DISPLAY alarm with a raw RFC 5545 trigger value such as `-PT15M`.
pub fn display_alarm(description: &str, trigger: &str) -> Alarm {
    let mut alarm = Alarm::display(description, Trigger::before_start(Duration::zero()));
    alarm.add_property("TRIGGER", trigger);
    alarm.done()
}
