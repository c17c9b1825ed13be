use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

use crate::filter::validate_identifier;

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Failed to read schema file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse schema definition: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid schema definition: {0}")]
    Invalid(String),
}

/// Declared type of a resource field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Uuid,
    Timestamp,
    /// Any JSON value, stored as-is
    Json,
}

impl FieldType {
    /// Check a payload value against the declared type. Null always passes;
    /// presence rules are handled by required-field validation.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        if value.is_null() {
            return Ok(());
        }
        match self {
            FieldType::String => {
                value.as_str().map(|_| ()).ok_or_else(|| "Expected a string".to_string())
            }
            FieldType::Integer => {
                if value.as_i64().is_some() || value.as_u64().is_some() {
                    Ok(())
                } else {
                    Err("Expected an integer".to_string())
                }
            }
            FieldType::Number => {
                if value.is_number() {
                    Ok(())
                } else {
                    Err("Expected a number".to_string())
                }
            }
            FieldType::Boolean => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    Err("Expected a boolean".to_string())
                }
            }
            FieldType::Uuid => match value.as_str() {
                Some(s) if Uuid::parse_str(s).is_ok() => Ok(()),
                _ => Err("Expected a UUID string".to_string()),
            },
            FieldType::Timestamp => match value.as_str() {
                Some(s) if DateTime::parse_from_rfc3339(s).is_ok() => Ok(()),
                _ => Err("Expected an RFC 3339 timestamp".to_string()),
            },
            FieldType::Json => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
}

/// Field declarations for one resource collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSchema {
    pub fields: HashMap<String, FieldDef>,
}

impl ResourceSchema {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter(|(_, def)| def.required).map(|(name, _)| name.as_str())
    }
}

/// Resource schemas known to the service, loaded once at startup
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    resources: HashMap<String, ResourceSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON document: { "<resource>": { "fields": { ... } } }
    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        let resources: HashMap<String, ResourceSchema> = serde_json::from_value(value)?;

        // Resource and field names become SQL identifiers in the Postgres
        // store, so they are held to the same rules as filter columns.
        for (resource, schema) in &resources {
            validate_identifier(resource)
                .map_err(|e| SchemaError::Invalid(format!("resource '{}': {}", resource, e)))?;
            for field in schema.fields.keys() {
                validate_identifier(field).map_err(|e| {
                    SchemaError::Invalid(format!("resource '{}', field '{}': {}", resource, field, e))
                })?;
                if crate::record::SYSTEM_FIELDS.contains(&field.as_str()) {
                    return Err(SchemaError::Invalid(format!(
                        "resource '{}' declares system field '{}'",
                        resource, field
                    )));
                }
            }
        }

        Ok(Self { resources })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_value(serde_json::from_str(&raw)?)
    }

    pub fn insert(&mut self, resource: impl Into<String>, schema: ResourceSchema) -> &mut Self {
        self.resources.insert(resource.into(), schema);
        self
    }

    pub fn get(&self, resource: &str) -> Option<&ResourceSchema> {
        self.resources.get(resource)
    }

    pub fn resource_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.resources.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::from_value(json!({
            "users": {
                "fields": {
                    "name":  { "type": "string", "required": true },
                    "email": { "type": "string", "required": true },
                    "age":   { "type": "integer" }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn loads_resources_and_fields() {
        let registry = registry();
        let users = registry.get("users").unwrap();
        assert!(users.field("name").unwrap().required);
        assert!(!users.field("age").unwrap().required);
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn rejects_system_field_declarations() {
        let result = SchemaRegistry::from_value(json!({
            "users": { "fields": { "id": { "type": "uuid" } } }
        }));
        assert!(matches!(result, Err(SchemaError::Invalid(_))));
    }

    #[test]
    fn rejects_non_identifier_names() {
        let result = SchemaRegistry::from_value(json!({
            "users; drop": { "fields": {} }
        }));
        assert!(matches!(result, Err(SchemaError::Invalid(_))));
    }

    #[test]
    fn field_type_checks() {
        assert!(FieldType::String.check(&json!("x")).is_ok());
        assert!(FieldType::String.check(&json!(1)).is_err());
        assert!(FieldType::Integer.check(&json!(3)).is_ok());
        assert!(FieldType::Integer.check(&json!(3.5)).is_err());
        assert!(FieldType::Number.check(&json!(3.5)).is_ok());
        assert!(FieldType::Boolean.check(&json!(true)).is_ok());
        assert!(FieldType::Uuid.check(&json!(uuid::Uuid::new_v4().to_string())).is_ok());
        assert!(FieldType::Uuid.check(&json!("not-a-uuid")).is_err());
        assert!(FieldType::Timestamp.check(&json!("2025-01-01T00:00:00Z")).is_ok());
        assert!(FieldType::Timestamp.check(&json!("yesterday")).is_err());
        assert!(FieldType::Json.check(&json!([1, 2])).is_ok());
        // Null defers to required-field validation
        assert!(FieldType::Integer.check(&json!(null)).is_ok());
    }
}
