use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

/// A campus event as stored in the hosted database under `events/{id}`.
///
/// The remote record does not carry its own id; callers set `id` from the
/// record key after decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Event {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    /// `yyyy-MM-dd HH:mm`, local time.
    pub start_time: String,
    pub end_time: String,
    /// Either an object-storage path or an already resolved download URL.
    pub photo: String,
    pub event_url: String,
    #[serde(deserialize_with = "string_set")]
    pub saved_users: BTreeSet<String>,
}

/// How an event's `photo` field should be treated before display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoRef<'a> {
    Missing,
    /// Already a fetchable URL; never resolve again.
    Url(&'a str),
    /// Object-storage path that still needs a download URL.
    StoragePath(&'a str),
}

impl Event {
    pub fn photo_ref(&self) -> PhotoRef<'_> {
        PhotoRef::classify(&self.photo)
    }

    pub fn is_saved_by(&self, uid: &str) -> bool {
        self.saved_users.contains(uid)
    }
}

impl<'a> PhotoRef<'a> {
    pub fn classify(photo: &'a str) -> Self {
        let photo = photo.trim();
        if photo.is_empty() {
            return Self::Missing;
        }
        if photo.starts_with("https://") || photo.starts_with("http://") {
            return Self::Url(photo);
        }

        // gs://bucket/path/to/object -> path/to/object
        match photo.strip_prefix("gs://") {
            Some(rest) => match rest.split_once('/') {
                Some((_bucket, path)) if !path.is_empty() => Self::StoragePath(path),
                _ => Self::Missing,
            },
            None => Self::StoragePath(photo.trim_start_matches('/')),
        }
    }
}

/// A signed-in user's profile record under `users/{uid}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uid: String,
    pub first_name: String,
    pub last_name: String,
    pub user_image: String,
    #[serde(deserialize_with = "string_set")]
    pub saved_events: BTreeSet<String>,
}

/// Events the given user has saved, in input order.
pub fn saved_by(events: &[Event], uid: &str) -> Vec<Event> {
    events
        .iter()
        .filter(|e| e.is_saved_by(uid))
        .cloned()
        .collect()
}

// The realtime database drops empty lists entirely and leaves `null` holes
// in arrays after an index is removed, so both collapse to "nothing here".
fn string_set<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items: Option<Vec<Option<String>>> = Option::deserialize(deserializer)?;
    Ok(items
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect())
}
