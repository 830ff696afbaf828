use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::shape::ShapeError;
use crate::state::AppState;

/// Every fallible handler in the HTTP surface converges on this so every
/// 4xx/5xx body has the same `{"error": "..."}` shape (4.F, 6.).
#[derive(Debug)]
pub enum ApiError {
    ClientMalformed(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::ClientMalformed(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(json!({"error": message}))).into_response()
    }
}

impl From<ShapeError> for ApiError {
    fn from(err: ShapeError) -> Self {
        ApiError::ClientMalformed(err.to_string())
    }
}

/// `Json` extractor wrapper whose rejection uses the same
/// `{"error": "..."}` envelope as every handler-level failure, instead
/// of axum's default plain-text body.
pub struct ApiJson<T>(pub T);

impl<T> FromRequest<AppState> for ApiJson<T>
where
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|err| ApiError::ClientMalformed(err.to_string()))?;
        Ok(ApiJson(value))
    }
}
