//! Fleet trips client library
//!
//! Aggregates trips from the document store, the web-book portal, the
//! inbound webhook, manual entry and CSV imports, keeps a live view of the
//! trips collection, and talks to Wialon for unit telematics.

pub mod config;
pub mod error;
pub mod feed;
pub mod fetch;
pub mod store;
pub mod trip;
pub mod wialon;

use log::warn;
use reqwest::Client;
use std::sync::Arc;

use fleet_trips_realtime::{ChangeFeedClient, ChangeFeedOptions};

use crate::config::ClientOptions;
use crate::feed::{RealtimeSnapshotSource, SnapshotSource, TripFeed};
use crate::store::TripStore;
use crate::trip::TripFilter;
use crate::wialon::WialonSession;

/// Entry point for the fleet trips backend
pub struct FleetClient {
    /// Base URL of the backend project
    pub url: String,
    /// API key of the backend project
    pub key: String,
    /// HTTP client shared by the store and Wialon sessions
    pub http_client: Client,
    /// Client options
    pub options: ClientOptions,
}

impl FleetClient {
    /// Create a client with default options
    ///
    /// # Example
    ///
    /// ```
    /// use fleet_trips::FleetClient;
    ///
    /// let client = FleetClient::new("https://your-project.example.com", "your-anon-key");
    /// let store = client.trips();
    /// ```
    pub fn new(url: &str, key: &str) -> Self {
        Self::new_with_options(url, key, ClientOptions::default())
    }

    /// Create a client with custom options
    ///
    /// # Example
    ///
    /// ```
    /// use fleet_trips::{FleetClient, config::ClientOptions};
    ///
    /// let options = ClientOptions::default().with_trips_collection("trips_v2");
    /// let client = FleetClient::new_with_options(
    ///     "https://your-project.example.com",
    ///     "your-anon-key",
    ///     options
    /// );
    /// ```
    pub fn new_with_options(url: &str, key: &str, options: ClientOptions) -> Self {
        let mut builder = Client::builder();
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build().unwrap_or_else(|e| {
            warn!("Falling back to default HTTP client: {}", e);
            Client::new()
        });

        Self {
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            http_client,
            options,
        }
    }

    /// Client for the trips collection
    pub fn trips(&self) -> TripStore {
        TripStore::new(
            &self.url,
            &self.key,
            &self.options.trips_collection,
            self.http_client.clone(),
        )
        .with_schema(&self.options.db_schema)
        .with_webhook_path(&self.options.webhook_path)
    }

    /// A new change feed connection. Clones share the connection.
    pub fn change_feed(&self) -> ChangeFeedClient {
        let options = ChangeFeedOptions {
            heartbeat_interval: self.options.heartbeat_interval.as_millis() as u64,
            connect_timeout: self.options.connect_timeout.as_millis() as u64,
        };
        ChangeFeedClient::new_with_options(&self.url, &self.key, options)
    }

    /// Snapshot source over the trips collection and its change feed
    pub fn snapshot_source(&self) -> Arc<dyn SnapshotSource> {
        Arc::new(RealtimeSnapshotSource::new(self.trips(), self.change_feed()))
    }

    /// Open a live trip feed. Must be called within a tokio runtime.
    pub fn trip_feed(&self, filter: TripFilter) -> TripFeed {
        TripFeed::open(self.snapshot_source(), filter)
    }

    /// A new, uninitialized Wialon session
    pub fn wialon(&self) -> WialonSession {
        WialonSession::new(&self.options.wialon_url, self.http_client.clone())
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::config::ClientOptions;
    pub use crate::error::Error;
    pub use crate::feed::{FeedState, SnapshotEvent, SnapshotSource, TripFeed};
    pub use crate::store::{StatusUpdate, TripStore};
    pub use crate::trip::{
        CostBreakdown, NewTrip, Trip, TripBoard, TripDocument, TripFilter, TripSource, TripStatus,
    };
    pub use crate::wialon::{WialonSession, WialonUnit};
    pub use crate::FleetClient;
}
