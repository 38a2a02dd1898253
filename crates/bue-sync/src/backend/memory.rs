//! In-process stand-in for the hosted backend. Used by tests and for running
//! the client without credentials.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{ObjectStorage, RealtimeDatabase};
use crate::error::BackendError;

#[derive(Default)]
pub struct MemoryBackend {
    root: Mutex<Value>,
    objects: Mutex<HashMap<String, String>>,
    failing: Mutex<HashSet<String>>,
    unreachable: AtomicBool,
    gets: AtomicUsize,
    sets: AtomicUsize,
    url_lookups: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            root: Mutex::new(Value::Object(Map::new())),
            ..Default::default()
        }
    }

    /// Writes directly into the tree without counting as a call.
    pub fn seed(&self, path: &str, value: Value) {
        write_at(&mut lock(&self.root), path, value);
    }

    /// Reads directly from the tree without counting as a call.
    pub fn value_at(&self, path: &str) -> Option<Value> {
        read_at(&lock(&self.root), path).cloned()
    }

    pub fn put_object(&self, object_path: &str, url: &str) {
        lock(&self.objects)
            .insert(object_path.to_string(), url.to_string());
    }

    /// Every call touching exactly `path` fails with a transport error.
    pub fn fail_path(&self, path: &str) {
        lock(&self.failing).insert(path.to_string());
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn set_calls(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn url_lookups(&self) -> usize {
        self.url_lookups.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.get_calls() + self.set_calls() + self.url_lookups()
    }

    fn check(&self, path: &str) -> Result<(), BackendError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(BackendError::Transport("connection refused".into()));
        }
        if lock(&self.failing).contains(path) {
            return Err(BackendError::Transport(format!("injected failure at {}", path)));
        }
        Ok(())
    }
}

#[async_trait]
impl RealtimeDatabase for MemoryBackend {
    async fn get(&self, path: &str) -> Result<Option<Value>, BackendError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check(path)?;
        Ok(self.value_at(path))
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), BackendError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.check(path)?;
        self.seed(path, value);
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for MemoryBackend {
    async fn download_url(&self, object_path: &str) -> Result<String, BackendError> {
        self.url_lookups.fetch_add(1, Ordering::SeqCst);
        self.check(object_path)?;
        lock(&self.objects)
            .get(object_path)
            .cloned()
            .ok_or_else(|| BackendError::Status {
                status: 404,
                body: format!("no object at {}", object_path),
            })
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn read_at<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut node = root;
    for seg in segments(path) {
        node = match node {
            Value::Object(map) => map.get(seg)?,
            Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    match node {
        Value::Null => None,
        _ => Some(node),
    }
}

// Like the hosted database, writing null or an empty container deletes the node.
fn write_at(root: &mut Value, path: &str, value: Value) {
    let segs: Vec<&str> = segments(path).collect();
    let Some((last, parents)) = segs.split_last() else {
        *root = value;
        return;
    };

    let mut node = root;
    for seg in parents {
        node = child_mut(node, seg);
    }

    let empty = match &value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if empty {
        remove_child(node, last);
    } else {
        *child_mut(node, last) = value;
    }
}

/// Child slot for `seg`, created as null if absent. Arrays are indexed in
/// place; any other non-object node is replaced by an object.
fn child_mut<'a>(node: &'a mut Value, seg: &str) -> &'a mut Value {
    let index = if node.is_array() {
        seg.parse::<usize>().ok()
    } else {
        None
    };
    match (node, index) {
        (Value::Array(items), Some(idx)) => {
            if items.len() <= idx {
                items.resize(idx + 1, Value::Null);
            }
            &mut items[idx]
        }
        (node, _) => object_mut(node)
            .entry(seg.to_string())
            .or_insert(Value::Null),
    }
}

fn remove_child(node: &mut Value, seg: &str) {
    match node {
        Value::Array(items) => {
            if let Some(slot) = seg.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                *slot = Value::Null;
            }
            while items.last().is_some_and(Value::is_null) {
                items.pop();
            }
            if items.is_empty() {
                *node = Value::Null;
            }
        }
        Value::Object(map) => {
            map.remove(seg);
        }
        _ => {}
    }
}

fn object_mut(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking test thread must not wedge the rest of the suite.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn reads_and_writes_nested_paths() {
        let backend = MemoryBackend::new();
        backend.seed("events", json!({ "E1": { "title": "Gala" } }));

        let title = backend.get("events/E1/title").await.unwrap();
        assert_eq!(title, Some(json!("Gala")));

        backend.set("users/u1/savedEvents", json!(["E1"])).await.unwrap();
        assert_eq!(backend.value_at("users/u1/savedEvents"), Some(json!(["E1"])));

        backend.set("users/u1/savedEvents", json!([])).await.unwrap();
        assert_eq!(backend.value_at("users/u1/savedEvents"), None);

        assert_eq!(backend.get_calls(), 1);
        assert_eq!(backend.set_calls(), 2);
    }

    #[tokio::test]
    async fn writes_through_array_collections() {
        let backend = MemoryBackend::new();
        backend.seed("events", json!([null, { "title": "One" }, { "title": "Two" }]));

        backend.set("events/1/savedUsers", json!(["u1"])).await.unwrap();
        assert_eq!(
            backend.value_at("events"),
            Some(json!([null, { "title": "One", "savedUsers": ["u1"] }, { "title": "Two" }]))
        );

        backend.set("events/4/title", json!("Five")).await.unwrap();
        assert_eq!(backend.value_at("events/3"), None);
        assert_eq!(backend.value_at("events/4/title"), Some(json!("Five")));

        backend.set("events/4", Value::Null).await.unwrap();
        backend.set("events/1/savedUsers", json!([])).await.unwrap();
        assert_eq!(
            backend.value_at("events"),
            Some(json!([null, { "title": "One" }, { "title": "Two" }]))
        );
    }

    #[tokio::test]
    async fn injected_failures() {
        let backend = MemoryBackend::new();
        backend.fail_path("events");
        assert!(backend.get("events").await.is_err());
        assert!(backend.get("users").await.unwrap().is_none());

        backend.set_unreachable(true);
        assert!(matches!(
            backend.get("users").await,
            Err(BackendError::Transport(_))
        ));
    }
}
