use rusqlite::Connection;
use tracing::info;

use crate::error::StorageResult;

pub const LATEST_VERSION: i64 = 2;

pub fn run(conn: &Connection) -> StorageResult<()> {
    migrate_to(conn, LATEST_VERSION)
}

/// Applies every migration step up to and including `target`.
pub fn migrate_to(conn: &Connection, target: i64) -> StorageResult<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version = current_version(conn)?;

    if version < 1 && target >= 1 {
        info!("Event store: running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;
            CREATE TABLE events (
                id          TEXT PRIMARY KEY,
                title       TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                location    TEXT NOT NULL DEFAULT '',
                start_time  TEXT NOT NULL DEFAULT '',
                end_time    TEXT NOT NULL DEFAULT '',
                photo       TEXT NOT NULL DEFAULT ''
            );

            INSERT INTO schema_version (version) VALUES (1);
            COMMIT;
            ",
        )?;
    }

    // Additive: existing rows pick up the column defaults.
    if version < 2 && target >= 2 {
        info!("Event store: running migration v2 (event_url, saved_users)");
        conn.execute_batch(
            "
            BEGIN;
            ALTER TABLE events ADD COLUMN event_url TEXT NOT NULL DEFAULT '';
            ALTER TABLE events ADD COLUMN saved_users TEXT NOT NULL DEFAULT '[]';

            INSERT INTO schema_version (version) VALUES (2);
            COMMIT;
            ",
        )?;
    }

    Ok(())
}

pub fn current_version(conn: &Connection) -> StorageResult<i64> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;
    Ok(version)
}
