//! Live trip subscription
//!
//! A [`SnapshotSource`] pushes the full matching document set every time
//! the collection changes. [`TripFeed`] turns that stream into
//! `{trips, loading, error}` state observable through a watch channel.

use async_trait::async_trait;
use log::{debug, error, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use fleet_trips_realtime::{ChangeFeedClient, CollectionChanges};

use crate::error::Error;
use crate::store::TripStore;
use crate::trip::{TripDocument, TripFilter};

/// One push from a live query
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotEvent {
    /// The complete set of matching documents
    Snapshot(Vec<TripDocument>),
    /// Listener failure
    Error(String),
}

/// Live query over the trips collection.
///
/// The listener stays open until the returned receiver is dropped or it
/// has sent a [`SnapshotEvent::Error`], which is always the last event.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn listen(&self, filter: &TripFilter) -> Result<mpsc::Receiver<SnapshotEvent>, Error>;
}

/// Snapshot source backed by the document store and its change feed.
///
/// Lists the collection once, then again after every change notification.
#[derive(Clone)]
pub struct RealtimeSnapshotSource {
    store: TripStore,
    change_feed: ChangeFeedClient,
}

impl RealtimeSnapshotSource {
    pub fn new(store: TripStore, change_feed: ChangeFeedClient) -> Self {
        Self { store, change_feed }
    }

    /// Binding over the whole collection. A filtered binding is evaluated
    /// against the new row only, so a trip leaving the filtered set would
    /// never notify; predicates are applied by the re-list instead.
    fn changes(&self) -> CollectionChanges {
        CollectionChanges::new(self.store.collection()).schema(self.store.schema())
    }
}

#[async_trait]
impl SnapshotSource for RealtimeSnapshotSource {
    async fn listen(&self, filter: &TripFilter) -> Result<mpsc::Receiver<SnapshotEvent>, Error> {
        let (tx, rx) = mpsc::channel(16);
        let (changed_tx, mut changed_rx) = mpsc::unbounded_channel::<()>();
        let (error_tx, mut error_rx) = mpsc::unbounded_channel::<String>();

        let topic = format!(
            "realtime:{}:{}",
            self.store.collection(),
            uuid::Uuid::new_v4().simple()
        );
        let subscriptions = self
            .change_feed
            .channel(&topic)
            .on(self.changes(), move |_| {
                let _ = changed_tx.send(());
            })
            .on_error(move |message| {
                let _ = error_tx.send(message);
            })
            .subscribe()
            .await?;

        let initial = self.store.list(filter).await?;
        tx.send(SnapshotEvent::Snapshot(initial))
            .await
            .map_err(|_| Error::listener("snapshot receiver dropped"))?;

        let store = self.store.clone();
        let filter = filter.clone();
        tokio::spawn(async move {
            let _subscriptions = subscriptions;
            loop {
                let event = tokio::select! {
                    _ = tx.closed() => break,
                    changed = changed_rx.recv() => {
                        if changed.is_none() {
                            break;
                        }
                        match store.list(&filter).await {
                            Ok(docs) => SnapshotEvent::Snapshot(docs),
                            Err(e) => {
                                warn!("Failed to refresh trips after change: {}", e);
                                SnapshotEvent::Error(e.to_string())
                            }
                        }
                    }
                    message = error_rx.recv() => match message {
                        Some(message) => SnapshotEvent::Error(message),
                        None => break,
                    },
                };
                // An error ends the listener and its subscriptions
                let failed = matches!(event, SnapshotEvent::Error(_));
                if tx.send(event).await.is_err() || failed {
                    break;
                }
            }
            debug!("Snapshot listener on '{}' stopped", topic);
        });

        Ok(rx)
    }
}

/// State exposed to consumers of a [`TripFeed`]
#[derive(Debug, Clone, PartialEq)]
pub struct FeedState {
    /// Decoded documents of the latest snapshot, newest first. Hand them to
    /// [`TripBoard::set_realtime`](crate::trip::TripBoard::set_realtime) or
    /// [`TripBoard::set_web_book`](crate::trip::TripBoard::set_web_book)
    /// for normalized trips.
    pub trips: Vec<TripDocument>,
    pub loading: bool,
    pub error: Option<String>,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            trips: Vec::new(),
            loading: true,
            error: None,
        }
    }
}

/// Live trip list for one filter.
///
/// Each snapshot replaces the state. An error clears `loading` and stays
/// until the filter changes; nothing is retried. Dropping the feed closes
/// the subscription.
pub struct TripFeed {
    source: Arc<dyn SnapshotSource>,
    filter: TripFilter,
    state: watch::Receiver<FeedState>,
    task: JoinHandle<()>,
}

impl TripFeed {
    /// Start listening. Must be called within a tokio runtime.
    pub fn open(source: Arc<dyn SnapshotSource>, filter: TripFilter) -> Self {
        let (tx, rx) = watch::channel(FeedState::default());
        let task = tokio::spawn(run(source.clone(), filter.clone(), tx));
        Self {
            source,
            filter,
            state: rx,
            task,
        }
    }

    /// Feed of web-booked trips only
    pub fn web_book(source: Arc<dyn SnapshotSource>) -> Self {
        Self::open(source, TripFilter::web_book_only())
    }

    pub fn filter(&self) -> &TripFilter {
        &self.filter
    }

    /// Replace the filter, resubscribing only when it differs
    pub fn set_filter(&mut self, filter: TripFilter) {
        if filter == self.filter {
            return;
        }
        debug!("Trip feed filter changed to {:?}", filter);
        *self = Self::open(self.source.clone(), filter);
    }

    /// Current state
    pub fn state(&self) -> FeedState {
        self.state.borrow().clone()
    }

    /// A receiver notified on every state change
    pub fn watch(&self) -> watch::Receiver<FeedState> {
        self.state.clone()
    }

    /// Wait for the next state change
    pub async fn changed(&mut self) -> Result<FeedState, Error> {
        self.state
            .changed()
            .await
            .map_err(|_| Error::listener("trip feed closed"))?;
        Ok(self.state.borrow_and_update().clone())
    }
}

impl Drop for TripFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(source: Arc<dyn SnapshotSource>, filter: TripFilter, state: watch::Sender<FeedState>) {
    let mut events = match source.listen(&filter).await {
        Ok(events) => events,
        Err(e) => {
            error!("Failed to open trip listener: {}", e);
            state.send_modify(|s| {
                s.loading = false;
                s.error = Some(e.to_string());
            });
            return;
        }
    };

    while let Some(event) = events.recv().await {
        match event {
            SnapshotEvent::Snapshot(trips) => {
                debug!("Trip snapshot with {} documents", trips.len());
                state.send_replace(FeedState {
                    trips,
                    loading: false,
                    error: None,
                });
            }
            SnapshotEvent::Error(message) => {
                error!("Trip listener error: {}", message);
                state.send_modify(|s| {
                    s.loading = false;
                    s.error = Some(message);
                });
                break;
            }
        }
    }
}
