//! Row type for the `events` cache table.
//! Kept apart from `bue_types::Event` so the column encoding stays a DB concern.

use std::collections::BTreeSet;

use bue_types::Event;
use rusqlite::Row;

use crate::error::StorageResult;

pub const EVENT_COLUMNS: &str =
    "id, title, description, location, start_time, end_time, photo, event_url, saved_users";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_time: String,
    pub end_time: String,
    pub photo: String,
    pub event_url: String,
    /// JSON array of user ids.
    pub saved_users: String,
}

impl EventRow {
    /// Reads a row selected with [`EVENT_COLUMNS`] in that order.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            location: row.get(3)?,
            start_time: row.get(4)?,
            end_time: row.get(5)?,
            photo: row.get(6)?,
            event_url: row.get(7)?,
            saved_users: row.get(8)?,
        })
    }

    pub fn from_event(event: &Event) -> StorageResult<Self> {
        Ok(Self {
            id: event.id.clone(),
            title: event.title.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            start_time: event.start_time.clone(),
            end_time: event.end_time.clone(),
            photo: event.photo.clone(),
            event_url: event.event_url.clone(),
            saved_users: serde_json::to_string(&event.saved_users)?,
        })
    }

    pub fn into_event(self) -> StorageResult<Event> {
        let saved_users: BTreeSet<String> = if self.saved_users.trim().is_empty() {
            BTreeSet::new()
        } else {
            serde_json::from_str(&self.saved_users)?
        };

        Ok(Event {
            id: self.id,
            title: self.title,
            description: self.description,
            location: self.location,
            start_time: self.start_time,
            end_time: self.end_time,
            photo: self.photo,
            event_url: self.event_url,
            saved_users,
        })
    }
}
