use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

/// One opaque event from the input batch.
///
/// The harness never interprets an event's shape; it is decoded from the
/// batch document and handed to the handler unchanged.
pub type Event = Value;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("could not read events file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("events file is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("events document must be a JSON array, got {found}")]
    NotAnArray { found: &'static str },
}

/// An ordered batch of events decoded from a single JSON document.
///
/// The top level of the document must be a JSON array; element order is
/// preserved and defines invocation order. The batch is fully materialized
/// in memory; there is no streaming read.
#[derive(Debug, Clone, PartialEq)]
pub struct EventBatch {
    events: Vec<Event>,
}

impl EventBatch {
    /// Read and decode a batch from a file.
    pub fn from_path(path: &Path) -> Result<Self, BatchError> {
        let raw = std::fs::read_to_string(path).map_err(|source| BatchError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Decode a batch from a JSON document.
    pub fn from_json(raw: &str) -> Result<Self, BatchError> {
        match serde_json::from_str::<Value>(raw)? {
            Value::Array(events) => Ok(Self { events }),
            other => Err(BatchError::NotAnArray {
                found: json_type_name(&other),
            }),
        }
    }

    /// Build a batch from already-decoded events, keeping their order.
    pub fn from_events(events: Vec<Event>) -> Self {
        Self { events }
    }

    /// Serialize back to the JSON array document the replayer reads.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events in batch order.
    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_an_array_in_order() {
        let batch = EventBatch::from_json(r#"[{"id":1},{"id":2},{"id":3}]"#).unwrap();
        assert_eq!(batch.len(), 3);
        let ids: Vec<_> = batch.iter().map(|e| e["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn events_are_opaque() {
        // Any JSON value is a valid event, including scalars and nulls.
        let batch = EventBatch::from_json(r#"[1, "two", null, [3], {"four": 4}]"#).unwrap();
        assert_eq!(batch.len(), 5);
        assert_eq!(batch.iter().nth(1), Some(&json!("two")));
        assert_eq!(batch.iter().nth(2), Some(&Value::Null));
    }

    #[test]
    fn empty_array_is_an_empty_batch() {
        let batch = EventBatch::from_json("[]").unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn rejects_non_array_top_level() {
        let err = EventBatch::from_json(r#""not an array""#).unwrap_err();
        assert!(matches!(err, BatchError::NotAnArray { found: "a string" }));

        let err = EventBatch::from_json(r#"{"id":1}"#).unwrap_err();
        assert!(matches!(err, BatchError::NotAnArray { found: "an object" }));

        let err = EventBatch::from_json("42").unwrap_err();
        assert!(matches!(err, BatchError::NotAnArray { found: "a number" }));
    }

    #[test]
    fn rejects_invalid_json() {
        let err = EventBatch::from_json("[{").unwrap_err();
        assert!(matches!(err, BatchError::InvalidJson(_)));
    }

    #[test]
    fn missing_file_is_a_read_failure() {
        let err = EventBatch::from_path(Path::new("/no/such/events.json")).unwrap_err();
        assert!(matches!(err, BatchError::ReadFailed { .. }));
    }

    #[test]
    fn reads_a_batch_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("events.json");
        std::fs::write(&path, r#"[{"id":1},{"id":2}]"#).unwrap();

        let batch = EventBatch::from_path(&path).unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn composed_batches_round_trip() {
        let events = vec![json!({"id": 1}), json!("scalar"), json!(null)];
        let composed = EventBatch::from_events(events.clone());

        let decoded = EventBatch::from_json(&composed.to_json_string().unwrap()).unwrap();
        assert_eq!(decoded.into_events(), events);
    }
}
