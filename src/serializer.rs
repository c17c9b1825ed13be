use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::record::{Record, SYSTEM_FIELDS};
use crate::schema::ResourceSchema;

/// Per-field validation messages for one payload record
pub type FieldErrors = HashMap<String, String>;

/// Aggregated validation failures for a multi-record payload, keyed by the
/// record's index in the submitted sequence. The whole payload is validated
/// before anything is persisted, so one bad record fails the lot.
#[derive(Debug, Default)]
pub struct ValidationErrors {
    pub records: BTreeMap<usize, FieldErrors>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn insert(&mut self, index: usize, errors: FieldErrors) {
        self.records.insert(index, errors);
    }
}

/// Validates payload records against a resource schema and produces the
/// in-memory records to persist. `partial` relaxes required-field checks so
/// omitted fields keep their stored values.
pub struct RecordSerializer<'a> {
    schema: &'a ResourceSchema,
    partial: bool,
}

impl<'a> RecordSerializer<'a> {
    pub fn new(schema: &'a ResourceSchema) -> Self {
        Self { schema, partial: false }
    }

    pub fn partial(schema: &'a ResourceSchema) -> Self {
        Self { schema, partial: true }
    }

    /// Validate one record for creation
    pub fn validate_one(&self, value: &Value) -> Result<Record, FieldErrors> {
        let fields = self.screen_fields(value, false)?;
        Ok(Record::from_validated(fields))
    }

    /// Validate an ordered sequence of records for creation
    pub fn validate_many(&self, values: &[Value]) -> Result<Vec<Record>, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let mut records = Vec::with_capacity(values.len());

        for (index, value) in values.iter().enumerate() {
            match self.validate_one(value) {
                Ok(record) => records.push(record),
                Err(field_errors) => errors.insert(index, field_errors),
            }
        }

        if errors.is_empty() {
            Ok(records)
        } else {
            Err(errors)
        }
    }

    /// Validate an ordered sequence of update records against the records
    /// they target. Each payload record must carry the `id` of a record in
    /// `existing`; validated changes are merged onto the stored state.
    pub fn validate_update_many(
        &self,
        values: &[Value],
        existing: &HashMap<Uuid, Record>,
    ) -> Result<Vec<Record>, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let mut records = Vec::with_capacity(values.len());

        for (index, value) in values.iter().enumerate() {
            match self.validate_update_one(value, existing) {
                Ok(record) => records.push(record),
                Err(field_errors) => errors.insert(index, field_errors),
            }
        }

        if errors.is_empty() {
            Ok(records)
        } else {
            Err(errors)
        }
    }

    fn validate_update_one(
        &self,
        value: &Value,
        existing: &HashMap<Uuid, Record>,
    ) -> Result<Record, FieldErrors> {
        let map = match value.as_object() {
            Some(map) => map,
            None => return Err(record_shape_error()),
        };

        let mut errors = FieldErrors::new();

        // `id` is the lookup key for bulk updates, not a writable field
        let target = match map.get("id") {
            None => {
                errors.insert("id".to_string(), "This field is required for bulk updates".to_string());
                None
            }
            Some(raw) => match raw.as_str().and_then(|s| Uuid::parse_str(s).ok()) {
                None => {
                    errors.insert("id".to_string(), "Expected a UUID string".to_string());
                    None
                }
                Some(id) => match existing.get(&id) {
                    None => {
                        errors.insert(
                            "id".to_string(),
                            "No record with this id in the collection".to_string(),
                        );
                        None
                    }
                    Some(record) => Some(record),
                },
            },
        };

        let changes = match self.screen_fields(value, true) {
            Ok(changes) => Some(changes),
            Err(field_errors) => {
                errors.extend(field_errors);
                None
            }
        };

        match (target, changes) {
            (Some(record), Some(changes)) if errors.is_empty() => {
                let mut updated = record.clone();
                updated.merge_changes(changes);
                Ok(updated)
            }
            _ => Err(errors),
        }
    }

    /// Validate one update payload's writable fields without resolving a
    /// target record (single-record update path; the id comes from the URL)
    pub fn validate_changes(&self, value: &Value) -> Result<HashMap<String, Value>, FieldErrors> {
        self.screen_fields(value, true)
    }

    /// Screen a payload object against the schema: unknown fields and system
    /// fields rejected, declared types checked, required fields enforced
    /// unless partial. Returns the validated writable fields.
    fn screen_fields(
        &self,
        value: &Value,
        allow_id: bool,
    ) -> Result<HashMap<String, Value>, FieldErrors> {
        let map = match value.as_object() {
            Some(map) => map,
            None => return Err(record_shape_error()),
        };

        let mut errors = FieldErrors::new();
        let mut fields = HashMap::new();

        for (key, field_value) in map {
            if key == "id" && allow_id {
                continue;
            }
            if SYSTEM_FIELDS.contains(&key.as_str()) {
                errors.insert(key.clone(), "This field is read-only".to_string());
                continue;
            }
            match self.schema.field(key) {
                None => {
                    errors.insert(key.clone(), "Unknown field".to_string());
                }
                Some(def) => match def.field_type.check(field_value) {
                    Ok(()) => {
                        fields.insert(key.clone(), field_value.clone());
                    }
                    Err(message) => {
                        errors.insert(key.clone(), message);
                    }
                },
            }
        }

        for required in self.schema.required_fields() {
            match map.get(required) {
                Some(Value::Null) => {
                    errors.insert(required.to_string(), "This field may not be null".to_string());
                }
                None if !self.partial => {
                    errors.insert(required.to_string(), "This field is required".to_string());
                }
                _ => {}
            }
        }

        if errors.is_empty() {
            Ok(fields)
        } else {
            Err(errors)
        }
    }
}

fn record_shape_error() -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.insert("_record".to_string(), "Expected a JSON object".to_string());
    errors
}
