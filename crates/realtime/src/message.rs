use serde::{Deserialize, Serialize};

/// Protocol event names used on the socket
pub(crate) mod events {
    pub const JOIN: &str = "phx_join";
    pub const LEAVE: &str = "phx_leave";
    pub const REPLY: &str = "phx_reply";
    pub const ERROR: &str = "phx_error";
    pub const CLOSE: &str = "phx_close";
    pub const HEARTBEAT: &str = "heartbeat";
    pub const CHANGES: &str = "postgres_changes";
}

/// A full frame received or sent over the websocket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(rename = "ref", default)]
    pub message_ref: serde_json::Value,
}

/// Kind of collection change a binding listens for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeEvent {
    #[serde(rename = "INSERT")]
    Insert,
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "DELETE")]
    Delete,
    #[serde(rename = "*")]
    All,
}

impl std::fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeEvent::Insert => "INSERT",
            ChangeEvent::Update => "UPDATE",
            ChangeEvent::Delete => "DELETE",
            ChangeEvent::All => "*",
        };
        write!(f, "{}", s)
    }
}

/// Change notification handed to subscription callbacks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePayload {
    /// The change body (`record`, `old_record`, `table`, ...)
    pub data: serde_json::Value,
    /// `INSERT`, `UPDATE` or `DELETE`
    pub event_type: Option<String>,
    pub timestamp: Option<String>,
}

impl ChangePayload {
    /// Build from the payload of a `postgres_changes` frame
    pub(crate) fn from_frame(payload: &serde_json::Value) -> Self {
        // the service nests the change under `data`; older servers do not
        let data = payload.get("data").unwrap_or(payload).clone();
        let event_type = data
            .get("type")
            .or_else(|| data.get("eventType"))
            .and_then(|v| v.as_str())
            .map(String::from);
        let timestamp = data
            .get("commit_timestamp")
            .and_then(|v| v.as_str())
            .map(String::from);
        Self {
            data,
            event_type,
            timestamp,
        }
    }

    /// The record after the change, if the service sent one
    pub fn record(&self) -> Option<&serde_json::Value> {
        self.data.get("record").or_else(|| self.data.get("new"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_change_payload_nested() {
        let payload = json!({
            "data": {
                "type": "UPDATE",
                "table": "trips",
                "commit_timestamp": "2025-07-16T08:30:00Z",
                "record": { "id": "t-1" }
            },
            "ids": [1]
        });
        let change = ChangePayload::from_frame(&payload);
        assert_eq!(change.event_type.as_deref(), Some("UPDATE"));
        assert_eq!(change.timestamp.as_deref(), Some("2025-07-16T08:30:00Z"));
        assert_eq!(change.record().and_then(|r| r["id"].as_str()), Some("t-1"));
    }

    #[test]
    fn test_change_payload_flat() {
        let payload = json!({ "eventType": "DELETE", "old": { "id": "t-2" } });
        let change = ChangePayload::from_frame(&payload);
        assert_eq!(change.event_type.as_deref(), Some("DELETE"));
        assert!(change.record().is_none());
    }

    #[test]
    fn test_message_without_ref() {
        let msg: RealtimeMessage =
            serde_json::from_str(r#"{"topic":"phoenix","event":"phx_reply","payload":{}}"#)
                .unwrap();
        assert!(msg.message_ref.is_null());
    }
}
