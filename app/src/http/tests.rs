use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use engine::{Engine, EngineError, IndexSchema, SearchQuery, SearchResponse};
use record::Record;
use serde_json::{json, Value as Json};
use tower::ServiceExt;

use crate::registry::SubscriberRegistry;
use crate::state::AppState;

/// In-memory stand-in for the search engine so the HTTP surface can be
/// exercised without a network call (8. TESTABLE PROPERTIES test
/// tooling supplement).
#[derive(Default)]
struct StubEngine {
    documents: Mutex<Vec<Record>>,
}

#[async_trait::async_trait]
impl Engine for StubEngine {
    async fn ensure_index(&self, _schema: IndexSchema) -> Result<(), EngineError> {
        Ok(())
    }

    async fn upsert_documents(&self, batch: &[Record]) -> Result<(), EngineError> {
        self.documents.lock().unwrap().extend_from_slice(batch);
        Ok(())
    }

    async fn search(&self, _query: SearchQuery) -> Result<SearchResponse, EngineError> {
        let hits = self
            .documents
            .lock()
            .unwrap()
            .iter()
            .map(|r| serde_json::to_value(r).unwrap())
            .collect::<Vec<_>>();
        Ok(SearchResponse {
            total_hits: hits.len() as u64,
            hits,
            facet_distribution: Default::default(),
        })
    }

    async fn delete_by_filter(&self, _filter: &str) -> Result<(), EngineError> {
        Ok(())
    }
}

fn test_state() -> (AppState, flume::Receiver<Record>) {
    let (ingest_tx, ingest_rx) = flume::bounded(64);
    let state = AppState {
        engine: Arc::new(StubEngine::default()),
        ingest_tx,
        registry: Arc::new(SubscriberRegistry::new()),
    };
    (state, ingest_rx)
}

async fn body_json(response: axum::response::Response) -> Json {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn single_post_is_accepted() {
    let (state, ingest_rx) = test_state();
    let app = crate::http::router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/ingest")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"project": "api", "level": "info", "message": "hi"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["accepted"], 1);
    assert_eq!(body["rejected"], 0);

    let persisted = ingest_rx.recv_async().await.unwrap();
    assert_eq!(persisted.project, "api");
}

#[tokio::test]
async fn batch_with_mixed_validity_reports_rejections() {
    let (state, _ingest_rx) = test_state();
    let app = crate::http::router(state);

    let payload = json!([
        {"level": "info", "project": "p", "message": "a"},
        {"level": "trace", "project": "p", "message": "b"},
        {"project": "p", "message": "c"},
    ]);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/ingest")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["accepted"], 1);
    assert_eq!(body["rejected"], 2);
    assert_eq!(body["errors"][0]["index"], 1);
    assert_eq!(body["errors"][0]["reason"], "invalid level");
    assert_eq!(body["errors"][1]["index"], 2);
    assert_eq!(body["errors"][1]["reason"], "missing level");
}

#[tokio::test]
async fn malformed_json_is_rejected_with_error_envelope() {
    let (state, _ingest_rx) = test_state();
    let app = crate::http::router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/ingest")
                .header("content-type", "application/json")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn health_reports_ok() {
    let (state, _ingest_rx) = test_state();
    let app = crate::http::router(state);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}
