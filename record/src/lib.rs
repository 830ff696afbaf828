pub mod id;
pub mod normalize;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

pub use normalize::{normalize, NormalizeError};

/// One normalized log entry, shared verbatim between the persisted copy
/// and the copy delivered to subscribers (3. DATA MODEL).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub id: String,
    pub timestamp: String,
    #[serde(rename = "timestampMs")]
    pub timestamp_ms: i64,
    pub project: String,
    pub level: Level,
    pub message: String,
    #[serde(rename = "traceId", skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(rename = "spanId", skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    #[serde(rename = "parentSpanId", skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub environment: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    pub fn parse(raw: &str) -> Option<Level> {
        match raw.to_lowercase().as_str() {
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "fatal" => Some(Level::Fatal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("debug", Level::Debug)]
    #[case("INFO", Level::Info)]
    #[case("Warn", Level::Warn)]
    #[case("error", Level::Error)]
    #[case("fatal", Level::Fatal)]
    fn parses_each_level_case_insensitively(#[case] raw: &str, #[case] expected: Level) {
        assert_eq!(Level::parse(raw), Some(expected));
    }

    #[rstest]
    #[case(Level::Debug, "debug")]
    #[case(Level::Info, "info")]
    #[case(Level::Warn, "warn")]
    #[case(Level::Error, "error")]
    #[case(Level::Fatal, "fatal")]
    fn as_str_round_trips_through_parse(#[case] level: Level, #[case] rendered: &str) {
        assert_eq!(level.as_str(), rendered);
        assert_eq!(Level::parse(rendered), Some(level));
    }

    #[test]
    fn rejects_unknown_level() {
        assert_eq!(Level::parse("trace"), None);
    }
}
