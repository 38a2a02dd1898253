//! Live queries over the event cache.
//!
//! A stream registers for change notifications before its first read, then
//! re-reads the table after every relevant commit. Each emission is therefore
//! a snapshot at least as new as the write that triggered it, and no stream
//! ever goes backwards.

use std::sync::Arc;

use bue_types::Event;
use futures_util::stream::BoxStream;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::warn;

use crate::EventStore;
use crate::error::StorageResult;

pub type EventStream<T> = BoxStream<'static, StorageResult<T>>;

/// A committed write to the cache.
#[derive(Debug, Clone)]
pub enum StoreChange {
    Upserted(Arc<[String]>),
    Cleared,
}

impl StoreChange {
    pub fn touches(&self, id: &str) -> bool {
        match self {
            Self::Upserted(ids) => ids.iter().any(|i| i == id),
            Self::Cleared => true,
        }
    }
}

impl EventStore {
    /// Emits the full cache now, then again after every upsert or clear.
    /// The stream never ends on its own; drop it to unsubscribe.
    pub fn get_all_events(&self) -> EventStream<Vec<Event>> {
        let store = self.clone();
        let mut changes = self.subscribe();

        Box::pin(async_stream::stream! {
            yield store.all_events();
            while next_change(&mut changes, |_| true).await {
                yield store.all_events();
            }
        })
    }

    /// Emits the cached row for `id` (or `None`) now, then again whenever a
    /// write touches that id or the cache is cleared.
    pub fn get_event_by_id(&self, id: &str) -> EventStream<Option<Event>> {
        let store = self.clone();
        let id = id.to_string();
        let mut changes = self.subscribe();

        Box::pin(async_stream::stream! {
            yield store.event_by_id(&id);
            while next_change(&mut changes, |c| c.touches(&id)).await {
                yield store.event_by_id(&id);
            }
        })
    }
}

/// Waits for a change accepted by `relevant`, then drains anything already
/// queued so a burst of writes produces a single re-read.
/// Returns `false` once the store is gone.
async fn next_change<F>(rx: &mut broadcast::Receiver<StoreChange>, relevant: F) -> bool
where
    F: Fn(&StoreChange) -> bool,
{
    loop {
        match rx.recv().await {
            Ok(change) if relevant(&change) => break,
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                // We can't tell what was missed; a fresh read covers it.
                warn!("Cache subscriber lagged by {} changes", skipped);
                break;
            }
            Err(RecvError::Closed) => return false,
        }
    }

    loop {
        match rx.try_recv() {
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) => return true,
            Err(TryRecvError::Closed) => return true,
        }
    }
}
