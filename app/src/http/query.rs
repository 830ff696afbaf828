use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use engine::{SearchQuery, SearchResponse};
use serde::Deserialize;
use serde_json::{json, Value as Json_};

use crate::http::error::ApiError;
use crate::shape::{build_filter, parse_limit, parse_since_secs, SearchParams};
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct SearchQueryParams {
    pub q: Option<String>,
    pub project: Option<String>,
    pub level: Option<String>,
    #[serde(rename = "traceId")]
    pub trace_id: Option<String>,
    pub environment: Option<String>,
    pub since: Option<String>,
    pub limit: Option<String>,
}

fn cutoff_ms(since_secs: i64) -> i64 {
    Utc::now().timestamp_millis() - since_secs * 1000
}

/// `GET /search` (4.G).
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchQueryParams>,
) -> Result<Json<Json_>, ApiError> {
    let since_secs = parse_since_secs(params.since.as_deref())?;
    let limit = parse_limit(params.limit.as_deref(), 20, 1, 100)?;

    let filter = build_filter(&SearchParams {
        project: params.project.as_deref(),
        level: params.level.as_deref(),
        trace_id: params.trace_id.as_deref(),
        environment: params.environment.as_deref(),
        since_cutoff_ms: Some(cutoff_ms(since_secs)),
        level_in: None,
    })?;

    let response = run_search(
        &state,
        SearchQuery {
            q: params.q,
            filter,
            sort: Some(vec!["timestamp:desc".to_string()]),
            limit,
            facets: Some(vec!["project".to_string(), "level".to_string()]),
            retrieve_attrs: None,
        },
    )
    .await?;

    Ok(Json(json!({
        "totalHits": response.total_hits,
        "facets": {
            "project": response.facet_distribution.get("project").cloned().unwrap_or_default(),
            "level": response.facet_distribution.get("level").cloned().unwrap_or_default(),
        },
        "hits": response.hits,
    })))
}

/// `GET /trace/:id` (4.G).
pub async fn trace(
    State(state): State<AppState>,
    Path(trace_id): Path<String>,
) -> Result<Json<Json_>, ApiError> {
    let filter = build_filter(&SearchParams {
        trace_id: Some(&trace_id),
        ..Default::default()
    })?;

    let response = run_search(
        &state,
        SearchQuery {
            q: None,
            filter,
            sort: Some(vec!["timestamp:asc".to_string()]),
            limit: 500,
            facets: None,
            retrieve_attrs: None,
        },
    )
    .await?;

    let mut projects: Vec<String> = response
        .hits
        .iter()
        .filter_map(|hit| hit.get("project").and_then(Json_::as_str))
        .map(str::to_string)
        .collect();
    projects.sort();
    projects.dedup();

    Ok(Json(json!({
        "traceId": trace_id,
        "eventCount": response.hits.len(),
        "projects": projects,
        "timeline": response.hits,
    })))
}

/// `GET /errors` (4.G).
pub async fn errors(
    State(state): State<AppState>,
    Query(params): Query<SearchQueryParams>,
) -> Result<Json<Json_>, ApiError> {
    let since_secs = parse_since_secs(params.since.as_deref())?;

    let filter = build_filter(&SearchParams {
        project: params.project.as_deref(),
        since_cutoff_ms: Some(cutoff_ms(since_secs)),
        level_in: Some(&[record::Level::Error, record::Level::Fatal]),
        ..Default::default()
    })?;

    let response = run_search(
        &state,
        SearchQuery {
            q: params.q,
            filter,
            sort: Some(vec!["timestamp:desc".to_string()]),
            limit: 30,
            facets: Some(vec!["project".to_string()]),
            retrieve_attrs: None,
        },
    )
    .await?;

    Ok(Json(json!({
        "totalErrors": response.total_hits,
        "byProject": response.facet_distribution.get("project").cloned().unwrap_or_default(),
        "recentErrors": response.hits,
    })))
}

/// `GET /projects` (4.G).
pub async fn projects(State(state): State<AppState>) -> Result<Json<Json_>, ApiError> {
    let response = run_search(
        &state,
        SearchQuery {
            q: None,
            filter: None,
            sort: None,
            limit: 0,
            facets: Some(vec![
                "project".to_string(),
                "level".to_string(),
                "environment".to_string(),
            ]),
            retrieve_attrs: None,
        },
    )
    .await?;

    Ok(Json(json!({
        "totalLogs": response.total_hits,
        "byProject": response.facet_distribution.get("project").cloned().unwrap_or_default(),
        "byLevel": response.facet_distribution.get("level").cloned().unwrap_or_default(),
        "byEnvironment": response.facet_distribution.get("environment").cloned().unwrap_or_default(),
    })))
}

/// `GET /health`.
pub async fn health() -> Json<Json_> {
    Json(json!({"status": "ok"}))
}

async fn run_search(state: &AppState, query: SearchQuery) -> Result<SearchResponse, ApiError> {
    state
        .engine
        .search(query)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))
}
