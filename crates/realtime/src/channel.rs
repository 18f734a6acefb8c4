use crate::client::{ChangeFeedClient, ConnectionState};
use crate::error::ChangeFeedError;
use crate::filters::{ChangeFilter, FilterOperator};
use crate::message::{events, ChangeEvent, ChangePayload, RealtimeMessage};
use log::{debug, trace, warn};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{timeout, Duration};

/// Change binding for one collection
#[derive(Debug, Clone, Serialize)]
pub struct CollectionChanges {
    schema: String,
    table: String,
    event: ChangeEvent,
    filter: Option<ChangeFilter>,
}

impl CollectionChanges {
    /// Listen to every change on `table` in the `public` schema
    pub fn new(table: &str) -> Self {
        Self {
            schema: "public".to_string(),
            table: table.to_string(),
            event: ChangeEvent::All,
            filter: None,
        }
    }

    pub fn schema(mut self, schema: &str) -> Self {
        self.schema = schema.to_string();
        self
    }

    pub fn event(mut self, event: ChangeEvent) -> Self {
        self.event = event;
        self
    }

    /// Restrict the binding to matching rows.
    ///
    /// The service accepts a single filter per binding, so a later call
    /// replaces an earlier one.
    pub fn filter(mut self, filter: ChangeFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn eq(self, column: &str, value: impl ToString) -> Self {
        self.filter(ChangeFilter::new(column, FilterOperator::Eq, value))
    }

    pub fn neq(self, column: &str, value: impl ToString) -> Self {
        self.filter(ChangeFilter::new(column, FilterOperator::Neq, value))
    }

    pub fn in_values<T: ToString>(self, column: &str, values: &[T]) -> Self {
        let joined = values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.filter(ChangeFilter::new(column, FilterOperator::In, joined))
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub(crate) fn to_binding(&self) -> serde_json::Value {
        let mut binding = json!({
            "event": self.event.to_string(),
            "schema": self.schema,
            "table": self.table,
        });
        if let Some(filter) = &self.filter {
            binding["filter"] = json!(filter.to_filter_string());
        }
        binding
    }
}

type ChangeCallback = Box<dyn Fn(ChangePayload) + Send + Sync>;
type ErrorCallback = Box<dyn Fn(String) + Send + Sync>;

/// Callbacks registered against one topic
pub(crate) struct Channel {
    topic: String,
    callbacks: RwLock<HashMap<String, ChangeCallback>>,
    error_callbacks: RwLock<HashMap<String, ErrorCallback>>,
}

impl Channel {
    fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            callbacks: RwLock::new(HashMap::new()),
            error_callbacks: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn topic(&self) -> &str {
        &self.topic
    }

    /// Drop the callback registered under `id`; true when nothing is left
    pub(crate) async fn remove(&self, id: &str) -> bool {
        let mut callbacks = self.callbacks.write().await;
        let mut error_callbacks = self.error_callbacks.write().await;
        callbacks.remove(id);
        error_callbacks.remove(id);
        callbacks.is_empty() && error_callbacks.is_empty()
    }

    pub(crate) async fn notify_error(&self, message: &str) {
        let error_callbacks = self.error_callbacks.read().await;
        for callback in error_callbacks.values() {
            (callback)(message.to_string());
        }
    }

    pub(crate) async fn handle_message(&self, message: RealtimeMessage) {
        match message.event.as_str() {
            events::CHANGES => {
                let payload = ChangePayload::from_frame(&message.payload);
                let callbacks = self.callbacks.read().await;
                trace!(
                    "Dispatching {:?} change to {} callbacks on '{}'",
                    payload.event_type,
                    callbacks.len(),
                    self.topic
                );
                // every binding on the topic sees every change
                for callback in callbacks.values() {
                    (callback)(payload.clone());
                }
            }
            events::REPLY => {
                let status = message.payload.get("status").and_then(|s| s.as_str());
                if status == Some("error") {
                    let reason = message
                        .payload
                        .get("response")
                        .and_then(|r| r.get("reason"))
                        .and_then(|r| r.as_str())
                        .unwrap_or("join rejected");
                    warn!("Channel '{}' rejected: {}", self.topic, reason);
                    self.notify_error(reason).await;
                } else {
                    debug!("Channel '{}' reply: {:?}", self.topic, status);
                }
            }
            events::ERROR => {
                warn!("Channel '{}' received phx_error: {}", self.topic, message.payload);
                self.notify_error("channel error").await;
            }
            events::CLOSE => {
                debug!("Channel '{}' closed by server", self.topic);
            }
            other => {
                trace!("Ignoring event '{}' on channel '{}'", other, self.topic);
            }
        }
    }
}

/// Handle for one registered callback; dropping it unsubscribes
pub struct Subscription {
    id: String,
    channel: Arc<Channel>,
    client: ChangeFeedClient,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn topic(&self) -> &str {
        self.channel.topic()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let id = self.id.clone();
        let channel = self.channel.clone();
        let client = self.client.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = client.release(&channel, &id).await {
                        debug!("Unsubscribe of {} on '{}' failed: {}", id, channel.topic(), e);
                    }
                });
            }
            Err(_) => warn!(
                "Subscription {} dropped outside a runtime; channel '{}' not left",
                self.id,
                self.channel.topic()
            ),
        }
    }
}

/// Collects bindings and callbacks, then joins the channel
pub struct ChannelBuilder<'a> {
    client: &'a ChangeFeedClient,
    topic: String,
    bindings: Vec<(String, CollectionChanges, ChangeCallback)>,
    error_callbacks: Vec<(String, ErrorCallback)>,
}

impl<'a> ChannelBuilder<'a> {
    pub(crate) fn new(client: &'a ChangeFeedClient, topic: &str) -> Self {
        Self {
            client,
            topic: topic.to_string(),
            bindings: Vec::new(),
            error_callbacks: Vec::new(),
        }
    }

    /// Register a callback for changes matching `changes`
    pub fn on<F>(mut self, changes: CollectionChanges, callback: F) -> Self
    where
        F: Fn(ChangePayload) + Send + Sync + 'static,
    {
        let id = uuid::Uuid::new_v4().to_string();
        self.bindings.push((id, changes, Box::new(callback)));
        self
    }

    /// Register a callback for channel errors and connection loss
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        let id = uuid::Uuid::new_v4().to_string();
        self.error_callbacks.push((id, Box::new(callback)));
        self
    }

    /// Connect if needed, register the callbacks and join the channel
    pub async fn subscribe(self) -> Result<Vec<Subscription>, ChangeFeedError> {
        if self.bindings.is_empty() {
            return Err(ChangeFeedError::SubscriptionError(format!(
                "no change bindings registered for '{}'",
                self.topic
            )));
        }

        if self.client.connection_state().await != ConnectionState::Connected {
            let wait = Duration::from_millis(self.client.options.connect_timeout);
            match timeout(wait, self.client.connect()).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(ChangeFeedError::ConnectionError(format!(
                        "Timeout connecting after {:?}",
                        wait
                    )))
                }
            }
        }

        let channel = {
            let mut channels = self.client.channels.write().await;
            channels
                .entry(self.topic.clone())
                .or_insert_with(|| Arc::new(Channel::new(&self.topic)))
                .clone()
        };

        let mut bindings = Vec::new();
        let mut subscriptions = Vec::new();

        for (id, changes, callback) in self.bindings {
            bindings.push(changes.to_binding());
            channel.callbacks.write().await.insert(id.clone(), callback);
            subscriptions.push(Subscription {
                id,
                channel: channel.clone(),
                client: self.client.clone(),
            });
        }

        for (id, callback) in self.error_callbacks {
            channel
                .error_callbacks
                .write()
                .await
                .insert(id.clone(), callback);
            subscriptions.push(Subscription {
                id,
                channel: channel.clone(),
                client: self.client.clone(),
            });
        }

        let mut payload = json!({
            "config": {
                "postgres_changes": bindings,
            }
        });
        if let Some(token) = self.client.access_token.read().await.as_ref() {
            payload["access_token"] = json!(token);
        }

        let message = json!({
            "topic": self.topic,
            "event": events::JOIN,
            "payload": payload,
            "ref": self.client.next_ref(),
        });
        debug!("Joining channel '{}'", self.topic);
        self.client.send_message(message).await?;

        Ok(subscriptions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_without_filter() {
        let binding = CollectionChanges::new("trips").to_binding();
        assert_eq!(binding["event"], "*");
        assert_eq!(binding["schema"], "public");
        assert_eq!(binding["table"], "trips");
        assert!(binding.get("filter").is_none());
    }

    #[test]
    fn test_binding_last_filter_wins() {
        let binding = CollectionChanges::new("trips")
            .event(ChangeEvent::Update)
            .eq("status", "active")
            .eq("importSource", "web_book")
            .to_binding();
        assert_eq!(binding["event"], "UPDATE");
        assert_eq!(binding["filter"], "importSource=eq.web_book");
    }

    #[tokio::test]
    async fn test_handle_changes_and_errors() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let channel = Channel::new("realtime:trips");
        let changes = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));

        let counter = changes.clone();
        channel.callbacks.write().await.insert(
            "a".to_string(),
            Box::new(move |_: ChangePayload| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let counter = errors.clone();
        channel.error_callbacks.write().await.insert(
            "b".to_string(),
            Box::new(move |_: String| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let frame = |event: &str, payload: serde_json::Value| RealtimeMessage {
            topic: "realtime:trips".to_string(),
            event: event.to_string(),
            payload,
            message_ref: serde_json::Value::Null,
        };

        channel
            .handle_message(frame(events::CHANGES, json!({"data": {"type": "INSERT"}})))
            .await;
        channel
            .handle_message(frame(events::REPLY, json!({"status": "ok", "response": {}})))
            .await;
        channel
            .handle_message(frame(
                events::REPLY,
                json!({"status": "error", "response": {"reason": "denied"}}),
            ))
            .await;
        channel.handle_message(frame(events::ERROR, json!({}))).await;

        assert_eq!(changes.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 2);

        assert!(!channel.remove("a").await);
        assert!(channel.remove("b").await);
    }
}
