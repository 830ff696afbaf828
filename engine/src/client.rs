use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use crate::{Engine, IndexSchema, SearchQuery, SearchResponse, INDEX_UID};
use record::Record;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Distinguishes retryable engine failures from ones the batch writer
/// should give up on immediately (4.B, 7. ERROR HANDLING DESIGN).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine unreachable or returned a server error: {0}")]
    Transient(String),
    #[error("engine rejected the request: {0}")]
    Permanent(String),
}

/// Thin typed wrapper over the external search engine's HTTP API. Stateless
/// beyond its connection pool, so it is cheap to clone and share across
/// tasks (5. CONCURRENCY & RESOURCE MODEL).
#[derive(Clone)]
pub struct SearchEngine {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl SearchEngine {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .pool_max_idle_per_host(10)
            .build()
            .expect("failed to build engine HTTP client");

        SearchEngine {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    fn classify(status: StatusCode, body: String) -> EngineError {
        if status.is_server_error() {
            EngineError::Transient(format!("{}: {}", status, body))
        } else {
            EngineError::Permanent(format!("{}: {}", status, body))
        }
    }
}

#[async_trait::async_trait]
impl Engine for SearchEngine {
    async fn ensure_index(&self, schema: IndexSchema) -> Result<(), EngineError> {
        let create = self.authed(
            self.client
                .post(self.url("/indexes"))
                .json(&json!({"uid": INDEX_UID, "primaryKey": schema.primary_key})),
        );
        match create.send().await {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) if resp.status() == StatusCode::CONFLICT => {
                // index already exists, fall through to settings update
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(Self::classify(status, body));
            }
            Err(err) => return Err(EngineError::Transient(err.to_string())),
        }

        let settings = self.authed(
            self.client
                .patch(self.url(&format!("/indexes/{INDEX_UID}/settings")))
                .json(&json!({
                    "searchableAttributes": schema.searchable_attributes,
                    "filterableAttributes": schema.filterable_attributes,
                    "sortableAttributes": schema.sortable_attributes,
                })),
        );
        let resp = settings
            .send()
            .await
            .map_err(|err| EngineError::Transient(err.to_string()))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(Self::classify(status, body))
        }
    }

    async fn upsert_documents(&self, batch: &[Record]) -> Result<(), EngineError> {
        if batch.is_empty() {
            return Ok(());
        }

        let req = self.authed(
            self.client
                .post(self.url(&format!("/indexes/{INDEX_UID}/documents")))
                .json(batch),
        );

        let resp = req
            .send()
            .await
            .map_err(|err| EngineError::Transient(err.to_string()))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!("engine rejected batch of {}: {} {}", batch.len(), status, body);
            Err(Self::classify(status, body))
        }
    }

    async fn search(&self, query: SearchQuery) -> Result<SearchResponse, EngineError> {
        let req = self.authed(
            self.client
                .post(self.url(&format!("/indexes/{INDEX_UID}/search")))
                .json(&query),
        );

        let resp = req
            .send()
            .await
            .map_err(|err| EngineError::Transient(err.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::classify(status, body));
        }

        resp.json::<SearchResponse>()
            .await
            .map_err(|err| EngineError::Transient(err.to_string()))
    }

    async fn delete_by_filter(&self, filter: &str) -> Result<(), EngineError> {
        let req = self.authed(
            self.client
                .post(self.url(&format!("/indexes/{INDEX_UID}/documents/delete")))
                .json(&json!({"filter": filter})),
        );

        let resp = req
            .send()
            .await
            .map_err(|err| EngineError::Transient(err.to_string()))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(Self::classify(status, body))
        }
    }
}
