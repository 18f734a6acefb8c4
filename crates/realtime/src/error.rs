use thiserror::Error;

/// Errors raised by the change feed client
#[derive(Error, Debug)]
pub enum ChangeFeedError {
    #[error("WebSocket error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Subscription error: {0}")]
    SubscriptionError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),
}

impl From<tokio::sync::mpsc::error::SendError<tokio_tungstenite::tungstenite::Message>>
    for ChangeFeedError
{
    fn from(
        err: tokio::sync::mpsc::error::SendError<tokio_tungstenite::tungstenite::Message>,
    ) -> Self {
        ChangeFeedError::ConnectionError(format!(
            "Failed to send message to socket task: {}",
            err
        ))
    }
}
