pub mod error;
pub mod ingest;
pub mod query;
pub mod ws;

#[cfg(test)]
mod tests;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the public HTTP/WS surface: permissive CORS plus one
/// `with_state`-bound router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ingest", post(ingest::post_ingest))
        .route("/search", get(query::search))
        .route("/trace/{id}", get(query::trace))
        .route("/errors", get(query::errors))
        .route("/projects", get(query::projects))
        .route("/health", get(query::health))
        .route("/ws", get(ws::upgrade))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({"error": "not found"})))
}
