use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bue_db::{EventStore, EventStream, StorageError};
use bue_types::Event;
use futures_util::Stream;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::Connectivity;
use crate::gateway::RemoteEventGateway;

/// Result of one background refresh pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No connectivity; the remote was not contacted.
    Offline,
    /// Remote read succeeded and `count` events were written to the cache.
    CacheWritten { count: usize },
    /// Remote read failed; the cache was left as it was.
    RemoteFailed,
    /// Remote read succeeded but the cache write failed.
    StoreFailed,
    /// Single-item refresh found nothing remotely; the cache was left alone.
    NotFound,
}

/// Serves every read from the local cache and refreshes that cache from the
/// remote once per activation.
#[derive(Clone)]
pub struct SyncCoordinator {
    store: EventStore,
    gateway: RemoteEventGateway,
    connectivity: Arc<dyn Connectivity>,
}

impl SyncCoordinator {
    pub fn new(
        store: EventStore,
        gateway: RemoteEventGateway,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            store,
            gateway,
            connectivity,
        }
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// Live view of all cached events. The first item is whatever the cache
    /// holds right now; fresher data arrives as the background refresh
    /// writes through the cache. Remote failures never reach the stream.
    pub fn observe_events(&self) -> Observation<Vec<Event>> {
        let stream = self.store.get_all_events();
        debug!("Activation: local stream subscribed");

        let this = self.clone();
        let refresh = tokio::spawn(async move { this.refresh_all().await });

        Observation::new(stream, refresh)
    }

    /// Single-event counterpart of [`observe_events`](Self::observe_events).
    pub fn observe_event(&self, id: &str) -> Observation<Option<Event>> {
        let stream = self.store.get_event_by_id(id);

        let this = self.clone();
        let id = id.to_string();
        let refresh = tokio::spawn(async move { this.refresh_event(&id).await });

        Observation::new(stream, refresh)
    }

    /// One fetch-and-write-back pass over the whole collection.
    pub async fn refresh_all(&self) -> RefreshOutcome {
        if !self.connectivity.is_online() {
            debug!("Offline, serving cached events only");
            return RefreshOutcome::Offline;
        }

        debug!("Activation: fetching remote events");
        match self.gateway.fetch_all_events().await {
            Ok(events) => self.write_back(&events),
            Err(e) => {
                warn!("Remote refresh failed, keeping cached events: {}", e);
                RefreshOutcome::RemoteFailed
            }
        }
    }

    pub async fn refresh_event(&self, id: &str) -> RefreshOutcome {
        if !self.connectivity.is_online() {
            return RefreshOutcome::Offline;
        }

        match self.gateway.fetch_event_by_id(id).await {
            Ok(Some(event)) => self.write_back(std::slice::from_ref(&event)),
            Ok(None) => RefreshOutcome::NotFound,
            Err(e) => {
                warn!("Remote refresh of event {} failed: {}", id, e);
                RefreshOutcome::RemoteFailed
            }
        }
    }

    fn write_back(&self, events: &[Event]) -> RefreshOutcome {
        match self.store.upsert_events(events) {
            Ok(()) => {
                info!("Cached {} events from remote", events.len());
                RefreshOutcome::CacheWritten {
                    count: events.len(),
                }
            }
            Err(e) => {
                warn!("Failed to cache remote events: {}", e);
                RefreshOutcome::StoreFailed
            }
        }
    }
}

/// A subscription handed out by [`SyncCoordinator`]. Yields cache
/// snapshots; dropping it unsubscribes but lets the refresh finish.
pub struct Observation<T> {
    stream: EventStream<T>,
    refresh: Option<JoinHandle<RefreshOutcome>>,
}

impl<T> Observation<T> {
    fn new(stream: EventStream<T>, refresh: JoinHandle<RefreshOutcome>) -> Self {
        Self {
            stream,
            refresh: Some(refresh),
        }
    }

    /// Waits for this activation's refresh pass. Returns `None` if it was
    /// already awaited.
    pub async fn wait_refresh(&mut self) -> Option<RefreshOutcome> {
        let handle = self.refresh.take()?;
        match handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!("Refresh task did not complete: {}", e);
                Some(RefreshOutcome::RemoteFailed)
            }
        }
    }
}

impl<T> Stream for Observation<T> {
    type Item = Result<T, StorageError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.stream.as_mut().poll_next(cx)
    }
}
