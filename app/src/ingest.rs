use std::sync::Arc;

use record::{normalize, NormalizeError};
use serde::Serialize;
use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::state::AppState;

#[derive(Debug, Serialize, Default)]
pub struct RejectedEntry {
    pub index: usize,
    pub reason: &'static str,
}

#[derive(Debug, Serialize, Default)]
pub struct IngestOutcome {
    pub accepted: usize,
    pub rejected: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<RejectedEntry>,
}

fn reason(err: &NormalizeError) -> &'static str {
    match err {
        NormalizeError::MissingProject => "missing project",
        NormalizeError::MissingMessage => "missing message",
        NormalizeError::InvalidLevel => "invalid level",
        NormalizeError::MissingLevel => "missing level",
        NormalizeError::NotAnObject => "not an object",
    }
}

/// Decodes a single record or an array of records, identical across the
/// HTTP POST and WebSocket ingest paths (4.E).
pub fn decode_records(payload: &Json) -> Vec<&Json> {
    match payload.as_array() {
        Some(items) => items.iter().collect(),
        None => vec![payload],
    }
}

/// Normalizes every decoded record, broadcasts each to the subscriber
/// registry, then publishes it to the batch writer's ingest channel —
/// broadcast strictly precedes the persistence hand-off, symmetric
/// between HTTP and WebSocket ingest (5., 9. DESIGN NOTES open
/// question, resolved symmetric).
pub async fn ingest(state: &AppState, payload: &Json) -> IngestOutcome {
    let mut outcome = IngestOutcome::default();

    for (index, raw) in decode_records(payload).into_iter().enumerate() {
        match normalize(raw) {
            Ok(record) => {
                let record = Arc::new(record);
                state.registry.publish(record.clone()).await;

                if state
                    .ingest_tx
                    .send_async((*record).clone())
                    .await
                    .is_err()
                {
                    warn!("ingest channel closed, dropping record {}", record.id);
                }

                outcome.accepted += 1;
            }
            Err(err) => {
                debug!("rejecting record {index}: {err}");
                outcome.rejected += 1;
                outcome.errors.push(RejectedEntry {
                    index,
                    reason: reason(&err),
                });
            }
        }
    }

    outcome
}
