/// Integration tests: the cache survives a reopen, and rows written by the
/// v1 schema come through the v2 migration with defaults filled in.

use std::fs;
use std::path::PathBuf;

use bue_db::{EventStore, migrations};
use bue_types::Event;
use rusqlite::Connection;

fn temp_db(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("bue_db_test_{}_{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir.join("events.db")
}

#[test]
fn events_survive_reopen() {
    let path = temp_db("reopen");

    {
        let store = EventStore::open(&path).unwrap();
        let mut event = Event {
            id: "e1".into(),
            title: "Hockey vs BC".into(),
            start_time: "2024-11-08 19:00".into(),
            ..Default::default()
        };
        event.saved_users.insert("u1".into());
        store.upsert_events(&[event]).unwrap();
    }

    let store = EventStore::open(&path).unwrap();
    let cached = store.event_by_id("e1").unwrap().expect("row persisted");
    assert_eq!(cached.title, "Hockey vs BC");
    assert!(cached.is_saved_by("u1"));
    assert_eq!(store.schema_version().unwrap(), migrations::LATEST_VERSION);

    let _ = fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn v1_rows_are_backfilled_on_open() {
    let conn = Connection::open_in_memory().unwrap();
    migrations::migrate_to(&conn, 1).unwrap();
    conn.execute(
        "INSERT INTO events (id, title, description, location, start_time, end_time, photo)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        (
            "legacy",
            "Study Break",
            "Free snacks",
            "Mugar Library",
            "2024-12-10 14:00",
            "2024-12-10 16:00",
            "https://cdn.example.edu/snacks.jpg",
        ),
    )
    .unwrap();

    let store = EventStore::with_connection(conn).unwrap();
    let event = store.event_by_id("legacy").unwrap().unwrap();

    assert_eq!(event.event_url, "");
    assert!(event.saved_users.is_empty());
    assert_eq!(event.title, "Study Break");
    assert_eq!(event.description, "Free snacks");
    assert_eq!(event.location, "Mugar Library");
    assert_eq!(event.start_time, "2024-12-10 14:00");
    assert_eq!(event.end_time, "2024-12-10 16:00");
    assert_eq!(event.photo, "https://cdn.example.edu/snacks.jpg");
}
