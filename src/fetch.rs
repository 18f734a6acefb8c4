//! JSON request wrapper shared by the trip store and Wialon sessions

use crate::error::Error;
use log::{debug, trace};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use url::Url;

/// A pending JSON request.
///
/// Non-2xx responses become [`Error::Status`] carrying the response body.
pub struct Fetch<'a> {
    client: &'a Client,
    method: Method,
    url: String,
    query: Vec<(String, String)>,
    headers: Vec<(&'static str, String)>,
    body: Option<Vec<u8>>,
}

impl<'a> Fetch<'a> {
    pub fn get(client: &'a Client, url: &str) -> Self {
        Self::new(client, Method::GET, url)
    }

    pub fn post(client: &'a Client, url: &str) -> Self {
        Self::new(client, Method::POST, url)
    }

    pub fn patch(client: &'a Client, url: &str) -> Self {
        Self::new(client, Method::PATCH, url)
    }

    pub fn delete(client: &'a Client, url: &str) -> Self {
        Self::new(client, Method::DELETE, url)
    }

    fn new(client: &'a Client, method: Method, url: &str) -> Self {
        Self {
            client,
            method,
            url: url.to_string(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Send `key` as both the `apikey` header and a bearer token
    pub fn api_key(self, key: &str) -> Self {
        self.header("apikey", key)
            .header("Authorization", format!("Bearer {}", key))
    }

    pub fn query_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn query<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, Error> {
        self.body = Some(serde_json::to_vec(body)?);
        Ok(self)
    }

    fn request(&self) -> Result<RequestBuilder, Error> {
        let mut url = Url::parse(&self.url)?;
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }
        trace!("{} {}", self.method, url);

        let mut request = self
            .client
            .request(self.method.clone(), url)
            .header(CONTENT_TYPE, "application/json");
        for (name, value) in &self.headers {
            request = request.header(*name, value.as_str());
        }
        if let Some(body) = &self.body {
            request = request.body(body.clone());
        }
        Ok(request)
    }

    async fn send(self) -> Result<Response, Error> {
        let response = self.request()?.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        debug!("{} {} answered {}", self.method, self.url, status);
        Err(Error::Status { status, body })
    }

    /// Send and decode the JSON response
    pub async fn execute<T: DeserializeOwned>(self) -> Result<T, Error> {
        Ok(self.send().await?.json::<T>().await?)
    }

    /// Send and ignore the response body
    pub async fn execute_empty(self) -> Result<(), Error> {
        self.send().await.map(|_| ())
    }
}
