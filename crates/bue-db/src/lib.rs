pub mod error;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod stream;

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio::sync::broadcast;
use tracing::info;

pub use error::{StorageError, StorageResult};
pub use stream::{EventStream, StoreChange};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// On-device event cache. Cheap to clone; all clones share one connection
/// and one change channel.
#[derive(Clone)]
pub struct EventStore {
    inner: Arc<EventStoreInner>,
}

struct EventStoreInner {
    conn: Mutex<Connection>,

    /// Committed writes, fanned out to every live stream.
    changes: broadcast::Sender<StoreChange>,
}

impl EventStore {
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // WAL so a crash mid-write never leaves a half-applied batch visible
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let store = Self::with_connection(conn)?;
        info!("Event store opened at {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    /// Wraps an already open connection, migrating it to the latest schema.
    pub fn with_connection(conn: Connection) -> StorageResult<Self> {
        migrations::run(&conn)?;

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            inner: Arc::new(EventStoreInner {
                conn: Mutex::new(conn),
                changes,
            }),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> StorageResult<T>,
    {
        let conn = self
            .inner
            .conn
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?;
        f(&conn)
    }

    pub fn schema_version(&self) -> StorageResult<i64> {
        self.with_conn(migrations::current_version)
    }

    /// Raw change notifications. Most callers want
    /// [`get_all_events`](Self::get_all_events) instead.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.inner.changes.subscribe()
    }

    fn notify(&self, change: StoreChange) {
        // No receivers is fine: nobody is watching right now.
        let _ = self.inner.changes.send(change);
    }
}
