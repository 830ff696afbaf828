use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use thiserror::Error;

use crate::id::new_id;
use crate::{Level, Record};

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum NormalizeError {
    #[error("missing project")]
    MissingProject,
    #[error("missing message")]
    MissingMessage,
    #[error("invalid level")]
    InvalidLevel,
    #[error("missing level")]
    MissingLevel,
    #[error("record is not a JSON object")]
    NotAnObject,
}

/// Normalizes one decoded record (4.A Record normalization). Trusts a
/// client-supplied `id` verbatim; everything else is validated or
/// defaulted. Returns the same error whether the field is absent or
/// present-but-empty, since both mean "nothing usable was sent".
pub fn normalize(value: &Json) -> Result<Record, NormalizeError> {
    let obj = value.as_object().ok_or(NormalizeError::NotAnObject)?;

    let project = non_empty_str(obj.get("project")).ok_or(NormalizeError::MissingProject)?;
    let message = non_empty_str(obj.get("message")).ok_or(NormalizeError::MissingMessage)?;

    let level = match obj.get("level") {
        None | Some(Json::Null) => return Err(NormalizeError::MissingLevel),
        Some(Json::String(raw)) => Level::parse(raw).ok_or(NormalizeError::InvalidLevel)?,
        Some(_) => return Err(NormalizeError::InvalidLevel),
    };

    let now = Utc::now();
    let (timestamp, timestamp_ms) = reconcile_timestamp(obj, now);

    let id = match obj.get("id").and_then(Json::as_str) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => new_id(timestamp_ms.max(0) as u64),
    };

    let environment = non_empty_str(obj.get("environment")).unwrap_or_else(|| "dev".to_string());

    Ok(Record {
        id,
        timestamp,
        timestamp_ms,
        project,
        level,
        message,
        trace_id: opt_str(obj.get("traceId")),
        span_id: opt_str(obj.get("spanId")),
        parent_span_id: opt_str(obj.get("parentSpanId")),
        meta: obj.get("meta").cloned(),
        source: opt_str(obj.get("source")),
        environment,
    })
}

/// Reconciles `timestamp`/`timestampMs` so the two always agree to the
/// ms (3. DATA MODEL invariants). Precedence: both present and
/// consistent with each other is the already-normalized case (kept
/// idempotent); `timestampMs` alone wins when both are present but
/// disagree, since it is the value range filters key off.
fn reconcile_timestamp(
    obj: &serde_json::Map<String, Json>,
    now: DateTime<Utc>,
) -> (String, i64) {
    let ms_field = obj.get("timestampMs").and_then(Json::as_i64);
    let ts_field = obj.get("timestamp").and_then(Json::as_str);

    match (ms_field, ts_field) {
        (Some(ms), _) => (render(ms), ms),
        (None, Some(raw)) => match DateTime::parse_from_rfc3339(raw) {
            Ok(parsed) => {
                let ms = parsed.timestamp_millis();
                (render(ms), ms)
            }
            Err(_) => {
                let ms = now.timestamp_millis();
                (render(ms), ms)
            }
        },
        (None, None) => {
            let ms = now.timestamp_millis();
            (render(ms), ms)
        }
    }
}

fn render(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .unwrap_or_else(|| Utc::now())
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn non_empty_str(v: Option<&Json>) -> Option<String> {
    match v.and_then(Json::as_str) {
        Some(s) if !s.trim().is_empty() => Some(s.to_string()),
        _ => None,
    }
}

fn opt_str(v: Option<&Json>) -> Option<String> {
    v.and_then(Json::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_missing_project() {
        let input = json!({"level": "info", "message": "hi"});
        assert_eq!(normalize(&input), Err(NormalizeError::MissingProject));
    }

    #[test]
    fn rejects_missing_message() {
        let input = json!({"level": "info", "project": "p"});
        assert_eq!(normalize(&input), Err(NormalizeError::MissingMessage));
    }

    #[test]
    fn rejects_invalid_level() {
        let input = json!({"level": "trace", "project": "p", "message": "m"});
        assert_eq!(normalize(&input), Err(NormalizeError::InvalidLevel));
    }

    #[test]
    fn rejects_missing_level() {
        let input = json!({"project": "p", "message": "m"});
        assert_eq!(normalize(&input), Err(NormalizeError::MissingLevel));
    }

    #[test]
    fn assigns_id_and_timestamp_when_absent() {
        let input = json!({"level": "info", "project": "p", "message": "hi"});
        let record = normalize(&input).unwrap();
        assert_eq!(record.id.len(), 26);
        assert!(record.timestamp_ms > 0);
        assert!(record.timestamp.contains('T'));
        assert_eq!(record.environment, "dev");
    }

    #[test]
    fn trusts_supplied_id() {
        let input = json!({"id": "client-given-id", "level": "info", "project": "p", "message": "hi"});
        let record = normalize(&input).unwrap();
        assert_eq!(record.id, "client-given-id");
    }

    #[test]
    fn reconciles_timestamp_from_ms() {
        let input = json!({"level": "info", "project": "p", "message": "hi", "timestampMs": 1_700_000_000_000i64});
        let record = normalize(&input).unwrap();
        assert_eq!(record.timestamp_ms, 1_700_000_000_000);
        assert!(record.timestamp.starts_with("2023-11-14"));
    }

    #[test]
    fn normalization_is_idempotent() {
        let input = json!({"level": "info", "project": "p", "message": "hi", "timestampMs": 1_700_000_000_000i64, "environment": "prod"});
        let once = normalize(&input).unwrap();
        let round_tripped = serde_json::to_value(&once).unwrap();
        let twice = normalize(&round_tripped).unwrap();
        assert_eq!(once, twice);
    }
}
