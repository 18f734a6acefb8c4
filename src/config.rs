//! Configuration options for the fleet trips client

use std::time::Duration;

/// Configuration options for the fleet trips client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// The collection holding trip documents
    pub trips_collection: String,

    /// The database schema of the trips collection
    pub db_schema: String,

    /// Base URL of the Wialon Remote API
    pub wialon_url: String,

    /// Path of the endpoint serving webhook-ingested trips
    pub webhook_path: String,

    /// Interval between change feed heartbeats
    pub heartbeat_interval: Duration,

    /// How long a subscription waits for the change feed socket
    pub connect_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(30)),
            trips_collection: "trips".to_string(),
            db_schema: "public".to_string(),
            wialon_url: "https://hst-api.wialon.com".to_string(),
            webhook_path: "/api/webhook-trips".to_string(),
            heartbeat_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientOptions {
    /// Defaults overlaid with `FLEET_TRIPS_COLLECTION`, `FLEET_WIALON_URL`
    /// and `FLEET_REQUEST_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let mut options = Self::default();
        if let Some(collection) = lookup("FLEET_TRIPS_COLLECTION") {
            options.trips_collection = collection;
        }
        if let Some(url) = lookup("FLEET_WIALON_URL") {
            options.wialon_url = url;
        }
        if let Some(secs) = lookup("FLEET_REQUEST_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(0) => options.request_timeout = None,
                Ok(secs) => options.request_timeout = Some(Duration::from_secs(secs)),
                Err(_) => log::warn!("Ignoring invalid FLEET_REQUEST_TIMEOUT_SECS={}", secs),
            }
        }
        options
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the trips collection
    pub fn with_trips_collection(mut self, value: &str) -> Self {
        self.trips_collection = value.to_string();
        self
    }

    /// Set the database schema
    pub fn with_db_schema(mut self, value: &str) -> Self {
        self.db_schema = value.to_string();
        self
    }

    /// Set the Wialon Remote API base URL
    pub fn with_wialon_url(mut self, value: &str) -> Self {
        self.wialon_url = value.to_string();
        self
    }

    /// Set the webhook trips endpoint path
    pub fn with_webhook_path(mut self, value: &str) -> Self {
        self.webhook_path = value.to_string();
        self
    }

    /// Set the change feed heartbeat interval
    pub fn with_heartbeat_interval(mut self, value: Duration) -> Self {
        self.heartbeat_interval = value;
        self
    }

    /// Set the change feed connect timeout
    pub fn with_connect_timeout(mut self, value: Duration) -> Self {
        self.connect_timeout = value;
        self
    }
}
