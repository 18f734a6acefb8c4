//! Error handling for the fleet trips client

use std::fmt;
use thiserror::Error;

use fleet_trips_realtime::ChangeFeedError;

/// Unified error type for the fleet trips client
#[derive(Error, Debug)]
pub enum Error {
    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// CSV reader errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Change feed errors
    #[error("Change feed error: {0}")]
    ChangeFeed(#[from] ChangeFeedError),

    /// Non-2xx HTTP responses
    #[error("Request failed with status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Document store request errors
    #[error("Store error: {0}")]
    Store(String),

    /// Live trip listener errors
    #[error("Listener error: {0}")]
    Listener(String),

    /// Trip import errors
    #[error("Import error: {0}")]
    Import(String),

    /// Wialon session state errors (not initialized, unit missing, ...)
    #[error("Wialon session error: {0}")]
    Session(String),

    /// Errors reported by the Wialon Remote API
    #[error("Wialon error {code}: {message}")]
    Wialon { code: i64, message: String },

    /// General errors
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Create a new store error
    pub fn store<T: fmt::Display>(msg: T) -> Self {
        Error::Store(msg.to_string())
    }

    /// Create a new listener error
    pub fn listener<T: fmt::Display>(msg: T) -> Self {
        Error::Listener(msg.to_string())
    }

    /// Create a new import error
    pub fn import<T: fmt::Display>(msg: T) -> Self {
        Error::Import(msg.to_string())
    }

    /// Create a new session error
    pub fn session<T: fmt::Display>(msg: T) -> Self {
        Error::Session(msg.to_string())
    }

    /// Create a Wialon error from the vendor's numeric code
    pub fn wialon(code: i64) -> Self {
        Error::Wialon {
            code,
            message: crate::wialon::error_text(code).to_string(),
        }
    }

    /// Create a new general error
    pub fn general<T: fmt::Display>(msg: T) -> Self {
        Error::General(msg.to_string())
    }
}
