//! Seams to the hosted backend and the device platform.
//!
//! Everything remote goes through these traits so the gateway, coordinator
//! and relation manager take explicit handles instead of reaching for a
//! process-wide client.

pub mod memory;
pub mod rest;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::BackendError;

/// JSON tree addressed by slash-separated paths (`events/{id}/savedUsers`).
#[async_trait]
pub trait RealtimeDatabase: Send + Sync {
    /// `Ok(None)` when nothing is stored at `path`.
    async fn get(&self, path: &str) -> Result<Option<Value>, BackendError>;

    /// Replaces whatever is at `path` with `value`.
    async fn set(&self, path: &str, value: Value) -> Result<(), BackendError>;
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Resolves an object path to a URL that can be fetched directly.
    async fn download_url(&self, object_path: &str) -> Result<String, BackendError>;
}

pub trait AuthSession: Send + Sync {
    fn current_uid(&self) -> Option<String>;
}

pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

pub mod paths {
    pub const EVENTS: &str = "events";

    pub fn event(id: &str) -> String {
        format!("events/{}", id)
    }

    pub fn event_saved_users(id: &str) -> String {
        format!("events/{}/savedUsers", id)
    }

    pub fn user(uid: &str) -> String {
        format!("users/{}", uid)
    }

    pub fn user_saved_events(uid: &str) -> String {
        format!("users/{}/savedEvents", uid)
    }

    pub fn user_field(uid: &str, field: &str) -> String {
        format!("users/{}/{}", uid, field)
    }
}

/// Whether `key` can be used as a single path segment. The realtime
/// database rejects these characters in keys.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key
            .chars()
            .any(|c| matches!(c, '/' | '.' | '#' | '$' | '[' | ']') || c.is_control())
}
