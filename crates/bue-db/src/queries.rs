use std::sync::Arc;

use bue_types::Event;
use rusqlite::Connection;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::models::{EVENT_COLUMNS, EventRow};
use crate::stream::StoreChange;
use crate::EventStore;

impl EventStore {
    /// Inserts each event, fully replacing any cached row with the same id.
    /// The whole batch commits atomically; live streams re-emit afterwards.
    pub fn upsert_events(&self, events: &[Event]) -> StorageResult<()> {
        if events.is_empty() {
            return Ok(());
        }
        if events.iter().any(|e| e.id.is_empty()) {
            return Err(StorageError::InvalidId);
        }

        let rows = events
            .iter()
            .map(EventRow::from_event)
            .collect::<StorageResult<Vec<_>>>()?;

        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO events (id, title, description, location, start_time, end_time, photo, event_url, saved_users)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                     ON CONFLICT(id) DO UPDATE SET
                        title = excluded.title,
                        description = excluded.description,
                        location = excluded.location,
                        start_time = excluded.start_time,
                        end_time = excluded.end_time,
                        photo = excluded.photo,
                        event_url = excluded.event_url,
                        saved_users = excluded.saved_users",
                )?;
                for row in &rows {
                    stmt.execute(rusqlite::params![
                        row.id,
                        row.title,
                        row.description,
                        row.location,
                        row.start_time,
                        row.end_time,
                        row.photo,
                        row.event_url,
                        row.saved_users,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })?;

        debug!("Upserted {} events into cache", rows.len());
        let ids: Arc<[String]> = rows.into_iter().map(|r| r.id).collect();
        self.notify(StoreChange::Upserted(ids));
        Ok(())
    }

    pub fn clear_all(&self) -> StorageResult<()> {
        let removed = self.with_conn(|conn| Ok(conn.execute("DELETE FROM events", [])?))?;
        debug!("Cleared {} cached events", removed);
        self.notify(StoreChange::Cleared);
        Ok(())
    }

    /// Current snapshot of the whole cache, in storage order.
    pub fn all_events(&self) -> StorageResult<Vec<Event>> {
        self.with_conn(query_all_events)
    }

    pub fn event_by_id(&self, id: &str) -> StorageResult<Option<Event>> {
        self.with_conn(|conn| query_event_by_id(conn, id))
    }
}

fn query_all_events(conn: &Connection) -> StorageResult<Vec<Event>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {} FROM events ORDER BY rowid",
        EVENT_COLUMNS
    ))?;

    let rows = stmt
        .query_map([], EventRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter().map(EventRow::into_event).collect()
}

fn query_event_by_id(conn: &Connection, id: &str) -> StorageResult<Option<Event>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {} FROM events WHERE id = ?1",
        EVENT_COLUMNS
    ))?;

    let row = stmt.query_row([id], EventRow::from_row).optional()?;
    row.map(EventRow::into_event).transpose()
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> StorageResult<Option<T>>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> StorageResult<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, title: &str) -> Event {
        Event {
            id: id.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    #[test]
    fn second_upsert_replaces_whole_row() {
        let store = EventStore::open_in_memory().unwrap();

        let mut first = event("1", "Open Mic");
        first.location = "GSU Ballroom".into();
        first.saved_users.insert("u1".into());
        store.upsert_events(&[first]).unwrap();

        let second = event("1", "Open Mic Night");
        store.upsert_events(&[second.clone()]).unwrap();

        let cached = store.event_by_id("1").unwrap().unwrap();
        assert_eq!(cached, second);
        assert_eq!(cached.location, "");
        assert!(cached.saved_users.is_empty());
        assert_eq!(store.all_events().unwrap().len(), 1);
    }

    #[test]
    fn rejects_empty_ids_without_writing() {
        let store = EventStore::open_in_memory().unwrap();
        let result = store.upsert_events(&[event("ok", "A"), event("", "B")]);
        assert!(matches!(result, Err(StorageError::InvalidId)));
        assert!(store.all_events().unwrap().is_empty());
    }

    #[test]
    fn clear_all_empties_cache() {
        let store = EventStore::open_in_memory().unwrap();
        store
            .upsert_events(&[event("1", "A"), event("2", "B")])
            .unwrap();
        store.clear_all().unwrap();

        assert!(store.all_events().unwrap().is_empty());
        assert_eq!(store.event_by_id("1").unwrap(), None);
    }

    #[test]
    fn keeps_first_insertion_order() {
        let store = EventStore::open_in_memory().unwrap();
        store
            .upsert_events(&[event("b", "B"), event("a", "A")])
            .unwrap();
        store.upsert_events(&[event("b", "B2")]).unwrap();

        let ids: Vec<String> = store.all_events().unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[test]
    fn undecodable_saved_users_is_an_error() {
        let store = EventStore::open_in_memory().unwrap();
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO events (id, saved_users) VALUES ('bad', 'nope')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        assert!(matches!(store.event_by_id("bad"), Err(StorageError::Encoding(_))));
        assert!(matches!(store.all_events(), Err(StorageError::Encoding(_))));
    }
}
