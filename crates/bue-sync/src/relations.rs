//! The user↔event "saved" edge, kept on both records:
//! `users/{uid}/savedEvents` and `events/{id}/savedUsers`.
//!
//! Each side is a whole-list read followed by a whole-list write, one side
//! after the other. There is no transaction: two concurrent calls touching
//! the same list can overwrite each other (last write wins), and a failure
//! between the two sides leaves the edge half-applied until the user retries.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::{AuthSession, Connectivity, RealtimeDatabase, is_valid_key, paths};
use crate::error::RelationWriteError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListEdit {
    Add,
    Remove,
}

#[derive(Clone)]
pub struct SavedEventRelations {
    db: Arc<dyn RealtimeDatabase>,
    auth: Arc<dyn AuthSession>,
    connectivity: Arc<dyn Connectivity>,
}

impl SavedEventRelations {
    pub fn new(
        db: Arc<dyn RealtimeDatabase>,
        auth: Arc<dyn AuthSession>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            db,
            auth,
            connectivity,
        }
    }

    /// Saves `event_id` for the signed-in user. `true` only if both sides
    /// were written (or already held the edge).
    pub async fn add_saved_event(&self, event_id: &str) -> bool {
        self.report(event_id, ListEdit::Add, self.apply(event_id, ListEdit::Add).await)
    }

    /// Removes the saved edge. `true` only if both sides no longer hold it.
    pub async fn remove_saved_event(&self, event_id: &str) -> bool {
        self.report(event_id, ListEdit::Remove, self.apply(event_id, ListEdit::Remove).await)
    }

    /// Whether the signed-in user's record lists `event_id`. `false` when
    /// offline, signed out, or the read fails.
    pub async fn is_saved(&self, event_id: &str) -> bool {
        let uid = match self.preflight(event_id) {
            Ok(uid) => uid,
            Err(e) => {
                debug!("Saved check for {} skipped: {}", event_id, e);
                return false;
            }
        };

        match self.read_list(&paths::user_saved_events(&uid)).await {
            Ok(items) => items.iter().any(|i| i == event_id),
            Err(e) => {
                warn!("Saved check for {} failed: {}", event_id, e);
                false
            }
        }
    }

    async fn apply(&self, event_id: &str, edit: ListEdit) -> Result<(), RelationWriteError> {
        let uid = self.preflight(event_id)?;

        self.edit_list(&paths::user_saved_events(&uid), event_id, edit)
            .await?;
        self.edit_list(&paths::event_saved_users(event_id), &uid, edit)
            .await?;
        Ok(())
    }

    /// Local checks only; nothing here touches the network.
    fn preflight(&self, event_id: &str) -> Result<String, RelationWriteError> {
        if !self.connectivity.is_online() {
            return Err(RelationWriteError::Offline);
        }
        let uid = self
            .auth
            .current_uid()
            .ok_or(RelationWriteError::SignedOut)?;

        if !is_valid_key(event_id) {
            return Err(RelationWriteError::InvalidKey(event_id.to_string()));
        }
        if !is_valid_key(&uid) {
            return Err(RelationWriteError::InvalidKey(uid));
        }
        Ok(uid)
    }

    async fn edit_list(
        &self,
        path: &str,
        item: &str,
        edit: ListEdit,
    ) -> Result<(), RelationWriteError> {
        let mut items = self.read_list(path).await?;

        let changed = match edit {
            ListEdit::Add if items.iter().any(|i| i == item) => false,
            ListEdit::Add => {
                items.push(item.to_string());
                true
            }
            ListEdit::Remove => {
                let before = items.len();
                items.retain(|i| i != item);
                items.len() != before
            }
        };

        if !changed {
            debug!("{} already in desired state for {}", path, item);
            return Ok(());
        }

        self.db.set(path, Value::from(items)).await?;
        Ok(())
    }

    async fn read_list(&self, path: &str) -> Result<Vec<String>, RelationWriteError> {
        let values = match self.db.get(path).await? {
            None => return Ok(Vec::new()),
            Some(Value::Array(items)) => items,
            // Sparse arrays come back as objects keyed by index.
            Some(Value::Object(map)) => {
                let mut entries: Vec<(String, Value)> = map.into_iter().collect();
                entries.sort_by_key(|(k, _)| (k.parse::<usize>().unwrap_or(usize::MAX), k.clone()));
                entries.into_iter().map(|(_, v)| v).collect()
            }
            Some(other) => {
                return Err(RelationWriteError::Malformed {
                    path: path.to_string(),
                    reason: format!("expected a list, got {}", other),
                });
            }
        };

        values
            .into_iter()
            .filter(|v| !v.is_null())
            .map(|v| match v {
                Value::String(s) => Ok(s),
                other => Err(RelationWriteError::Malformed {
                    path: path.to_string(),
                    reason: format!("non-string entry {}", other),
                }),
            })
            .collect()
    }

    fn report(
        &self,
        event_id: &str,
        edit: ListEdit,
        result: Result<(), RelationWriteError>,
    ) -> bool {
        match result {
            Ok(()) => {
                info!("Saved edge {:?} applied for event {}", edit, event_id);
                true
            }
            Err(e) => {
                warn!("Saved edge {:?} failed for event {}: {}", edit, event_id, e);
                false
            }
        }
    }
}
