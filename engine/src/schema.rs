/// The index schema `init` and `ensure_index` apply (4.B, 4.H). Idempotent
/// to apply: re-running it against an already-configured index is a no-op
/// from the caller's perspective.
#[derive(Debug, Clone)]
pub struct IndexSchema {
    pub searchable_attributes: Vec<&'static str>,
    pub filterable_attributes: Vec<&'static str>,
    pub sortable_attributes: Vec<&'static str>,
    pub primary_key: &'static str,
}

impl Default for IndexSchema {
    fn default() -> Self {
        IndexSchema {
            searchable_attributes: vec!["message", "source", "meta", "project"],
            filterable_attributes: vec!["project", "level", "environment", "traceId", "timestampMs"],
            sortable_attributes: vec!["timestamp", "timestampMs"],
            primary_key: "id",
        }
    }
}
