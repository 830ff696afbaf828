use axum::extract::State;
use axum::Json;
use serde_json::Value as Json_;
use tracing::debug;

use crate::http::error::{ApiError, ApiJson};
use crate::ingest::ingest;
use crate::state::AppState;

/// `POST /ingest` — accepts a single record object or an array of
/// records. Framing failures (invalid JSON) are the only thing that
/// produces a non-200; per-record rejections are reported inline
/// (6. EXTERNAL INTERFACES, S1/S2).
pub async fn post_ingest(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<Json_>,
) -> Result<Json<crate::ingest::IngestOutcome>, ApiError> {
    debug!("ingest payload received: {payload}");
    let outcome = ingest(&state, &payload).await;
    Ok(Json(outcome))
}
