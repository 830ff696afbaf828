mod client;
mod schema;

pub use client::{EngineError, SearchEngine};
pub use schema::IndexSchema;

use record::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

pub const INDEX_UID: &str = "logs";

/// A query against the engine, built by the query/shape layer (4.G).
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<String>>,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facets: Option<Vec<String>>,
    #[serde(rename = "attributesToRetrieve", skip_serializing_if = "Option::is_none")]
    pub retrieve_attrs: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<Json>,
    #[serde(rename = "estimatedTotalHits", alias = "totalHits", default)]
    pub total_hits: u64,
    #[serde(rename = "facetDistribution", default)]
    pub facet_distribution: std::collections::HashMap<String, std::collections::HashMap<String, u64>>,
}

#[async_trait::async_trait]
pub trait Engine: Send + Sync {
    async fn ensure_index(&self, schema: IndexSchema) -> Result<(), EngineError>;

    async fn upsert_documents(&self, batch: &[Record]) -> Result<(), EngineError>;

    async fn search(&self, query: SearchQuery) -> Result<SearchResponse, EngineError>;

    async fn delete_by_filter(&self, filter: &str) -> Result<(), EngineError>;
}
