//! Trip documents through the REST document store

use chrono::{DateTime, Utc};
use log::debug;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::Error;
use crate::fetch::Fetch;
use crate::trip::{timestamp, CostBreakdown, TripDocument, TripFilter, WebhookTrip};

/// `importSource` value of web-booked documents
pub const WEB_BOOK_SOURCE: &str = "web_book";

/// Delivery milestone recorded on a trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    Shipped,
    Delivered,
}

/// Client for the trips collection
#[derive(Debug, Clone)]
pub struct TripStore {
    url: String,
    key: String,
    collection: String,
    schema: String,
    webhook_path: String,
    client: Client,
}

impl TripStore {
    pub fn new(url: &str, key: &str, collection: &str, client: Client) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            collection: collection.to_string(),
            schema: "public".to_string(),
            webhook_path: "/api/webhook-trips".to_string(),
            client,
        }
    }

    pub fn with_schema(mut self, schema: &str) -> Self {
        self.schema = schema.to_string();
        self
    }

    pub fn with_webhook_path(mut self, path: &str) -> Self {
        self.webhook_path = path.to_string();
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    fn collection_url(&self) -> String {
        format!("{}/rest/v1/{}", self.url, self.collection)
    }

    fn request<'a>(&'a self, fetch: Fetch<'a>) -> Fetch<'a> {
        fetch
            .api_key(&self.key)
            .header("Accept-Profile", self.schema.as_str())
            .header("Content-Profile", self.schema.as_str())
    }

    /// Query parameters for a filtered listing, newest first
    pub fn query_params(filter: &TripFilter) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        if filter.only_web_book {
            params.push(("importSource".to_string(), format!("eq.{}", WEB_BOOK_SOURCE)));
        }
        if let Some(status) = &filter.status {
            params.push(("status".to_string(), format!("eq.{}", status)));
        }
        params.push(("order".to_string(), "updatedAt.desc".to_string()));
        params
    }

    /// Every document matching `filter`
    pub async fn list(&self, filter: &TripFilter) -> Result<Vec<TripDocument>, Error> {
        let url = self.collection_url();
        let docs = self
            .request(Fetch::get(&self.client, &url))
            .query(Self::query_params(filter))
            .execute::<Vec<TripDocument>>()
            .await?;
        debug!("Listed {} trips from {}", docs.len(), self.collection);
        Ok(docs)
    }

    pub async fn get(&self, id: &str) -> Result<Option<TripDocument>, Error> {
        let url = self.collection_url();
        let docs = self
            .request(Fetch::get(&self.client, &url))
            .query_param("select", "*")
            .query_param("id", &format!("eq.{}", id))
            .query_param("limit", "1")
            .execute::<Vec<TripDocument>>()
            .await?;
        Ok(docs.into_iter().next())
    }

    /// Insert a document and return the stored row
    pub async fn insert(&self, doc: &TripDocument) -> Result<TripDocument, Error> {
        let url = self.collection_url();
        let rows = self
            .request(Fetch::post(&self.client, &url))
            .header("Prefer", "return=representation")
            .json(doc)?
            .execute::<Vec<TripDocument>>()
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| Error::store("Insert returned no rows"))
    }

    /// Replace the cost breakdown and set `totalCost` to its sum
    pub async fn update_costs(
        &self,
        id: &str,
        breakdown: &CostBreakdown,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        let body = json!({
            "costBreakdown": breakdown,
            "totalCost": breakdown.total(),
            "updatedAt": timestamp(now),
        });
        self.patch(id, &body).await
    }

    /// Record a delivery milestone.
    ///
    /// Delivering also marks the trip shipped and completes it.
    pub async fn update_status(
        &self,
        id: &str,
        update: StatusUpdate,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        let at = timestamp(now);
        let mut body = Map::new();
        match update {
            StatusUpdate::Shipped => {
                body.insert("shippedStatus".into(), Value::Bool(true));
                body.insert("shippedAt".into(), Value::String(at.clone()));
            }
            StatusUpdate::Delivered => {
                body.insert("shippedStatus".into(), Value::Bool(true));
                body.insert("deliveredStatus".into(), Value::Bool(true));
                body.insert("deliveredAt".into(), Value::String(at.clone()));
                body.insert("status".into(), Value::String("completed".into()));
            }
        }
        if let Some(notes) = notes {
            body.insert("statusNotes".into(), Value::String(notes.to_string()));
        }
        body.insert("updatedAt".into(), Value::String(at));
        self.patch(id, &Value::Object(body)).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), Error> {
        let url = self.collection_url();
        self.request(Fetch::delete(&self.client, &url))
            .query_param("id", &format!("eq.{}", id))
            .execute_empty()
            .await
    }

    /// Trips received by the inbound webhook
    pub async fn webhook_trips(&self) -> Result<Vec<WebhookTrip>, Error> {
        let url = format!("{}{}", self.url, self.webhook_path);
        self.request(Fetch::get(&self.client, &url))
            .execute::<Vec<WebhookTrip>>()
            .await
    }

    async fn patch<T: Serialize>(&self, id: &str, body: &T) -> Result<(), Error> {
        let url = self.collection_url();
        self.request(Fetch::patch(&self.client, &url))
            .header("Prefer", "return=minimal")
            .query_param("id", &format!("eq.{}", id))
            .json(body)?
            .execute_empty()
            .await
    }
}
