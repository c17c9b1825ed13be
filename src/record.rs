use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// Fields owned by the service, never writable through API input
pub const SYSTEM_FIELDS: &[&str] = &["id", "created_at", "updated_at"];

/// Errors that can occur during Record operations
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("System field '{0}' cannot be set via API input")]
    SystemFieldNotAllowed(&'static str),
    #[error("Invalid JSON format: {0}")]
    InvalidJson(String),
}

/// A dynamic record representing one row of a resource collection.
///
/// Holds the current field values plus, for records loaded from the store,
/// the stored state they were loaded with. Updates merge validated changes
/// onto the stored state; API output folds stored system fields back in.
#[derive(Debug, Clone, Default)]
pub struct Record {
    /// State as loaded from the store (None for records being created)
    original: Option<HashMap<String, Value>>,
    /// Current field values
    fields: HashMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create record from API input JSON, rejecting system fields
    pub fn from_json(json: Value) -> Result<Self, RecordError> {
        match json {
            Value::Object(map) => {
                let mut record = Self::new();
                for (key, value) in map {
                    if let Some(field) = SYSTEM_FIELDS.iter().find(|&&f| f == key) {
                        return Err(RecordError::SystemFieldNotAllowed(field));
                    }
                    record.fields.insert(key, value);
                }
                Ok(record)
            }
            _ => Err(RecordError::InvalidJson("Expected JSON object".to_string())),
        }
    }

    /// Create record from already-screened field values
    pub fn from_validated(fields: HashMap<String, Value>) -> Self {
        Self { original: None, fields }
    }

    /// Create record from stored row data (system fields allowed)
    pub fn from_stored(data: HashMap<String, Value>) -> Self {
        Self { original: Some(data.clone()), fields: data }
    }

    /// Get field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Set field value; system fields are ignored here
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let key = key.into();
        if SYSTEM_FIELDS.contains(&key.as_str()) {
            tracing::warn!("Attempted to set system field '{}' - ignoring", key);
            return self;
        }
        self.fields.insert(key, value.into());
        self
    }

    /// Set a service-owned field (store layer only)
    pub fn set_system_field(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Merge validated changes onto the current state
    pub fn merge_changes(&mut self, changes: HashMap<String, Value>) -> &mut Self {
        for (key, value) in changes {
            self.set(key, value);
        }
        self
    }

    // ========================================
    // Standard field accessors
    // ========================================

    /// Get record ID
    pub fn id(&self) -> Option<Uuid> {
        self.get("id").and_then(|v| v.as_str()).and_then(|s| Uuid::parse_str(s).ok())
    }

    /// Set record ID (system field)
    pub fn set_id(&mut self, id: Uuid) -> &mut Self {
        self.set_system_field("id", Value::String(id.to_string()))
    }

    /// Get created_at timestamp
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.get("created_at")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Stamp created_at and updated_at on insert
    pub fn touch_created_at(&mut self) -> &mut Self {
        let now = Value::String(Utc::now().to_rfc3339());
        self.set_system_field("created_at", now.clone());
        self.set_system_field("updated_at", now)
    }

    /// Stamp updated_at on save
    pub fn touch_updated_at(&mut self) -> &mut Self {
        self.set_system_field("updated_at", Value::String(Utc::now().to_rfc3339()))
    }

    /// Get original value for a specific field (as loaded from the store)
    pub fn get_original(&self, key: &str) -> Option<&Value> {
        self.original.as_ref()?.get(key)
    }

    /// Check whether this record was loaded from the store
    pub fn is_stored(&self) -> bool {
        self.original.is_some()
    }

    // ========================================
    // Serialization
    // ========================================

    /// Convert to JSON Value (current fields only)
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    /// Convert to API output format, folding stored system fields back in
    pub fn to_api_output(&self) -> Value {
        let mut output = self.fields.clone();

        if let Some(original) = &self.original {
            for &field in SYSTEM_FIELDS {
                if let Some(value) = original.get(field) {
                    if !output.contains_key(field) {
                        output.insert(field.to_string(), value.clone());
                    }
                }
            }
        }

        Value::Object(output.into_iter().collect())
    }

    /// Convert to HashMap of current fields
    pub fn to_hashmap(&self) -> HashMap<String, Value> {
        self.fields.clone()
    }

    /// Convert Vec<Record> to API output JSON array
    pub fn to_api_output_array(records: &[Self]) -> Value {
        Value::Array(records.iter().map(|r| r.to_api_output()).collect())
    }
}

// ========================================
// Conversions
// ========================================

impl From<HashMap<String, Value>> for Record {
    fn from(map: HashMap<String, Value>) -> Self {
        Self::from_stored(map)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_stored(map.into_iter().collect())
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        record.to_json()
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Record(id: {:?}, fields: {})", self.id(), self.fields.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_rejects_system_fields() {
        let err = Record::from_json(json!({"id": "abc", "name": "x"})).unwrap_err();
        assert!(matches!(err, RecordError::SystemFieldNotAllowed("id")));
    }

    #[test]
    fn set_ignores_system_fields() {
        let mut record = Record::new();
        record.set("id", "not-allowed").set("name", "x");
        assert!(record.get("id").is_none());
        assert_eq!(record.get("name"), Some(&json!("x")));
    }

    #[test]
    fn merge_keeps_untouched_fields() {
        let mut record = Record::from_stored(HashMap::from([
            ("id".to_string(), json!("0a0b0c0d-0000-0000-0000-000000000000")),
            ("name".to_string(), json!("before")),
            ("role".to_string(), json!("admin")),
        ]));
        record.merge_changes(HashMap::from([("name".to_string(), json!("after"))]));

        assert_eq!(record.get("name"), Some(&json!("after")));
        assert_eq!(record.get("role"), Some(&json!("admin")));
        assert_eq!(record.get_original("name"), Some(&json!("before")));
    }

    #[test]
    fn api_output_includes_stored_system_fields() {
        let id = Uuid::new_v4();
        let record = Record::from_stored(HashMap::from([
            ("id".to_string(), json!(id.to_string())),
            ("name".to_string(), json!("x")),
        ]));
        let output = record.to_api_output();
        assert_eq!(output["id"], json!(id.to_string()));
        assert_eq!(record.id(), Some(id));
    }
}
