//! Captured entry types shared by the sink and the inspection API

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::utils::time::format_entry_timestamp;

/// Content stored when an entry's payload cannot be serialized
const UNENCODABLE_CONTENT: &str = "\"content could not be encoded as JSON\"";

// ============================================================================
// Entry types
// ============================================================================

/// One persisted capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub batch_id: String,
    pub family_hash: Option<String>,
    pub should_display_on_index: bool,
    #[serde(rename = "type")]
    pub entry_type: String,
    /// JSON document, stored as text
    pub content: String,
    /// Local time, `YYYY-MM-DD HH:MM:SS`
    pub created_at: String,
}

impl Entry {
    /// New entry with a time-ordered id, stamped now
    pub fn new(
        batch_id: impl Into<String>,
        entry_type: impl Into<String>,
        content: &Value,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            batch_id: batch_id.into(),
            family_hash: None,
            should_display_on_index: true,
            entry_type: entry_type.into(),
            content: serde_json::to_string(content)
                .unwrap_or_else(|_| UNENCODABLE_CONTENT.to_string()),
            created_at: format_entry_timestamp(&Local::now()),
        }
    }

    /// Content parsed back into JSON, or the raw text when it is not JSON
    pub fn content_json(&self) -> Value {
        serde_json::from_str(&self.content).unwrap_or_else(|_| Value::String(self.content.clone()))
    }
}

// ============================================================================
// Query parameters
// ============================================================================

/// Filters for listing entries, newest first
#[derive(Debug, Clone, Default)]
pub struct ListEntriesParams {
    pub entry_type: Option<String>,
    pub batch_id: Option<String>,
    pub tag: Option<String>,
    pub limit: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_entry_defaults() {
        let entry = Entry::new("batch-1", "log", &json!({"message": "hi"}));
        assert_eq!(entry.batch_id, "batch-1");
        assert_eq!(entry.entry_type, "log");
        assert!(entry.family_hash.is_none());
        assert!(entry.should_display_on_index);
        assert_eq!(entry.created_at.len(), 19);
        assert_eq!(entry.content_json(), json!({"message": "hi"}));
    }

    #[test]
    fn test_ids_are_unique_and_ordered() {
        let a = Entry::new("b", "log", &json!({}));
        let b = Entry::new("b", "log", &json!({}));
        assert_ne!(a.id, b.id);
        assert!(a.id < b.id);
    }

    #[test]
    fn test_content_json_falls_back_to_text() {
        let mut entry = Entry::new("b", "log", &json!({}));
        entry.content = "not json".to_string();
        assert_eq!(entry.content_json(), json!("not json"));
    }

    #[test]
    fn test_serializes_type_field() {
        let entry = Entry::new("b", "redis", &json!({}));
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "redis");
    }
}
