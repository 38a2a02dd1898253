use std::sync::Arc;

use bue_types::{Event, PhotoRef, User};
use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::{ObjectStorage, RealtimeDatabase, is_valid_key, paths};
use crate::error::FetchError;

/// Reads events from the hosted database and turns storage references into
/// fetchable photo URLs.
#[derive(Clone)]
pub struct RemoteEventGateway {
    db: Arc<dyn RealtimeDatabase>,
    storage: Arc<dyn ObjectStorage>,
}

impl RemoteEventGateway {
    pub fn new(db: Arc<dyn RealtimeDatabase>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { db, storage }
    }

    /// The whole remote collection in one read. Returns only after every
    /// photo lookup has settled, so no event comes back half-resolved.
    pub async fn fetch_all_events(&self) -> Result<Vec<Event>, FetchError> {
        let Some(raw) = self.db.get(paths::EVENTS).await? else {
            info!("No events found in the remote database");
            return Ok(Vec::new());
        };

        let events = decode_collection(raw)?;
        let events = join_all(events.into_iter().map(|e| self.resolve_photo(e))).await;

        debug!("Fetched {} events from remote", events.len());
        Ok(events)
    }

    /// `Ok(None)` if no event exists under `id`.
    pub async fn fetch_event_by_id(&self, id: &str) -> Result<Option<Event>, FetchError> {
        if !is_valid_key(id) {
            return Err(FetchError::InvalidKey(id.to_string()));
        }

        let path = paths::event(id);
        let Some(raw) = self.db.get(&path).await? else {
            info!("Event {} not found remotely", id);
            return Ok(None);
        };

        let mut event: Event = serde_json::from_value(raw).map_err(|e| FetchError::Malformed {
            path,
            reason: e.to_string(),
        })?;
        event.id = id.to_string();

        Ok(Some(self.resolve_photo(event).await))
    }

    /// Profile record for `uid`, or `None` if the user has no record yet.
    pub async fn fetch_user(&self, uid: &str) -> Result<Option<User>, FetchError> {
        if !is_valid_key(uid) {
            return Err(FetchError::InvalidKey(uid.to_string()));
        }

        let path = paths::user(uid);
        let Some(raw) = self.db.get(&path).await? else {
            return Ok(None);
        };

        let mut user: User = serde_json::from_value(raw).map_err(|e| FetchError::Malformed {
            path,
            reason: e.to_string(),
        })?;
        user.uid = uid.to_string();
        Ok(Some(user))
    }

    /// A failed lookup keeps the raw path: the event is degraded, not dropped.
    async fn resolve_photo(&self, mut event: Event) -> Event {
        let object_path = match event.photo_ref() {
            PhotoRef::StoragePath(path) => path.to_string(),
            PhotoRef::Url(_) | PhotoRef::Missing => return event,
        };

        match self.storage.download_url(&object_path).await {
            Ok(url) => event.photo = url,
            Err(e) => warn!(
                "Photo lookup failed for event {} ({}): {}",
                event.id, object_path, e
            ),
        }
        event
    }
}

/// The collection arrives keyed by id; integer-like keys make the database
/// hand it back as an array with holes instead.
fn decode_collection(raw: Value) -> Result<Vec<Event>, FetchError> {
    let entries: Vec<(String, Value)> = match raw {
        Value::Object(map) => map.into_iter().collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        other => {
            return Err(FetchError::Malformed {
                path: paths::EVENTS.to_string(),
                reason: format!("expected an object of events, got {}", type_name(&other)),
            });
        }
    };

    let mut events = Vec::with_capacity(entries.len());
    for (id, value) in entries {
        match serde_json::from_value::<Event>(value) {
            Ok(mut event) => {
                event.id = id;
                events.push(event);
            }
            Err(e) => warn!("Skipping malformed event {}: {}", id, e),
        }
    }
    Ok(events)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use serde_json::json;

    fn gateway(backend: &Arc<MemoryBackend>) -> RemoteEventGateway {
        RemoteEventGateway::new(backend.clone(), backend.clone())
    }

    #[tokio::test]
    async fn empty_collection_is_ok_not_error() {
        let backend = Arc::new(MemoryBackend::new());
        let events = gateway(&backend).fetch_all_events().await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn unreachable_remote_is_error() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_unreachable(true);
        let result = gateway(&backend).fetch_all_events().await;
        assert!(matches!(result, Err(FetchError::Backend(_))));
    }

    #[tokio::test]
    async fn resolves_storage_paths_once() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed(
            "events",
            json!({
                "E1": { "title": "Career Fair", "photo": "events/fair.jpg" },
                "E2": { "title": "Concert", "photo": "https://cdn.example.com/concert.jpg" },
                "E3": { "title": "Lecture" }
            }),
        );
        backend.put_object("events/fair.jpg", "https://storage.example.com/fair.jpg?token=t");

        let mut events = gateway(&backend).fetch_all_events().await.unwrap();
        events.sort_by(|a, b| a.id.cmp(&b.id));

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].photo, "https://storage.example.com/fair.jpg?token=t");
        assert_eq!(events[1].photo, "https://cdn.example.com/concert.jpg");
        assert_eq!(events[2].photo, "");
        assert_eq!(backend.url_lookups(), 1);
    }

    #[tokio::test]
    async fn failed_photo_lookup_degrades() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed("events/E1", json!({ "title": "Gala", "photo": "events/missing.jpg" }));

        let event = gateway(&backend).fetch_event_by_id("E1").await.unwrap().unwrap();
        assert_eq!(event.id, "E1");
        assert_eq!(event.photo, "events/missing.jpg");
    }

    #[tokio::test]
    async fn missing_single_event_is_none() {
        let backend = Arc::new(MemoryBackend::new());
        assert_eq!(gateway(&backend).fetch_event_by_id("nope").await.unwrap(), None);
        assert!(matches!(
            gateway(&backend).fetch_event_by_id("a/b").await,
            Err(FetchError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn array_collections_and_bad_items() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed(
            "events",
            json!([null, { "title": "One" }, "garbage", { "title": "Three" }]),
        );

        let events = gateway(&backend).fetch_all_events().await.unwrap();
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["1", "3"]);
    }

    #[tokio::test]
    async fn scalar_collection_is_malformed() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed("events", json!(7));
        assert!(matches!(
            gateway(&backend).fetch_all_events().await,
            Err(FetchError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn fetches_user_profile() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed(
            "users/u1",
            json!({ "firstName": "Rhett", "lastName": "Terrier", "savedEvents": ["E1"] }),
        );

        let user = gateway(&backend).fetch_user("u1").await.unwrap().unwrap();
        assert_eq!(user.uid, "u1");
        assert_eq!(user.first_name, "Rhett");
        assert!(user.saved_events.contains("E1"));
    }
}
