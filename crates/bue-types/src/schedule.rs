//! Calendar helpers over the event's string timestamps.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::warn;

use crate::models::Event;

/// Wire format of `startTime` / `endTime`.
pub const EVENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

const DISPLAY_FORMAT: &str = "%b %-d, %-I:%M %p";

#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid event time '{value}': {reason}")]
pub struct ScheduleError {
    pub value: String,
    pub reason: String,
}

pub fn parse_event_time(value: &str) -> Result<NaiveDateTime, ScheduleError> {
    NaiveDateTime::parse_from_str(value.trim(), EVENT_TIME_FORMAT).map_err(|e| ScheduleError {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

impl Event {
    pub fn start_datetime(&self) -> Result<NaiveDateTime, ScheduleError> {
        parse_event_time(&self.start_time)
    }

    pub fn end_datetime(&self) -> Result<NaiveDateTime, ScheduleError> {
        parse_event_time(&self.end_time)
    }

    pub fn start_date(&self) -> Result<NaiveDate, ScheduleError> {
        self.start_datetime().map(|dt| dt.date())
    }
}

/// Buckets events by the local date they start on, for the month view.
/// Events with an unparseable start are left out.
pub fn group_by_start_date(events: &[Event]) -> BTreeMap<NaiveDate, Vec<Event>> {
    let mut by_date: BTreeMap<NaiveDate, Vec<Event>> = BTreeMap::new();
    for event in events {
        match event.start_date() {
            Ok(date) => by_date.entry(date).or_default().push(event.clone()),
            Err(e) => warn!("Skipping event {} in calendar: {}", event.id, e),
        }
    }
    by_date
}

/// "Oct 5, 3:00 PM - Oct 5, 5:30 PM"
pub fn format_time_range(start: &str, end: &str) -> Result<String, ScheduleError> {
    let start = parse_event_time(start)?;
    let end = parse_event_time(end)?;
    Ok(format!(
        "{} - {}",
        start.format(DISPLAY_FORMAT),
        end.format(DISPLAY_FORMAT)
    ))
}
