pub mod sql;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use crate::record::Record;

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid WHERE clause: {0}")]
    InvalidWhereClause(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Invalid operator data: {0}")]
    InvalidOperatorData(String),
}

/// Filter criteria for a collection, as carried by request bodies and built
/// internally for id-targeted lookups.
///
/// The where grammar is a mongo-style subset: implicit equality
/// (`{"field": value}`), per-field operators (`$eq`, `$ne`, `$gt`, `$gte`,
/// `$lt`, `$lte`, `$like`, `$in`) and the logicals `$and`, `$or`, `$not`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterData {
    pub where_clause: Option<Value>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl FilterData {
    /// Filter on a single field equalling a value
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            where_clause: Some(Value::Object([(field.into(), value.into())].into_iter().collect())),
            ..Default::default()
        }
    }

    /// Filter on a field being one of the given values
    pub fn any_of(field: impl Into<String>, values: Vec<Value>) -> Self {
        let condition = serde_json::json!({ "$in": values });
        Self {
            where_clause: Some(Value::Object([(field.into(), condition)].into_iter().collect())),
            ..Default::default()
        }
    }

    /// True when the criteria actually narrow the collection: a non-empty
    /// where clause is present. Limit and offset bound a result set without
    /// targeting anything, so they don't count.
    pub fn narrows(&self) -> bool {
        match &self.where_clause {
            Some(Value::Object(map)) => !map.is_empty(),
            Some(_) => false,
            None => false,
        }
    }

    /// Evaluate the where clause against an in-memory record. A filter with
    /// no where clause matches everything; limit/offset are applied by the
    /// caller over the matched set.
    pub fn matches(&self, record: &Record) -> Result<bool, FilterError> {
        match &self.where_clause {
            None => Ok(true),
            Some(clause) => eval_clause(clause, record),
        }
    }
}

/// Shared identifier rules for resource names, schema fields and filter
/// columns: these all end up quoted into SQL by the Postgres store.
pub fn validate_identifier(name: &str) -> Result<(), FilterError> {
    let mut chars = name.chars();
    let first = chars
        .next()
        .ok_or_else(|| FilterError::InvalidIdentifier("name cannot be empty".to_string()))?;
    if !(first.is_alphabetic() || first == '_')
        || !name.chars().all(|c| c.is_alphanumeric() || c == '_')
    {
        return Err(FilterError::InvalidIdentifier(format!("invalid name format: {}", name)));
    }
    Ok(())
}

fn eval_clause(clause: &Value, record: &Record) -> Result<bool, FilterError> {
    let map = match clause {
        Value::Object(map) => map,
        _ => {
            return Err(FilterError::InvalidWhereClause("WHERE must be a JSON object".to_string()))
        }
    };

    // Top-level entries are AND-ed together
    for (key, value) in map {
        let matched = if key.starts_with('$') {
            eval_logical(key, value, record)?
        } else {
            eval_field(key, value, record)?
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn eval_logical(op: &str, value: &Value, record: &Record) -> Result<bool, FilterError> {
    match op {
        "$and" | "$or" => {
            let clauses = value.as_array().ok_or_else(|| {
                FilterError::InvalidOperatorData(format!("{} requires an array", op))
            })?;
            let mut any = false;
            for clause in clauses {
                let matched = eval_clause(clause, record)?;
                if op == "$and" && !matched {
                    return Ok(false);
                }
                any = any || matched;
            }
            Ok(if op == "$and" { true } else { any })
        }
        "$not" => Ok(!eval_clause(value, record)?),
        other => Err(FilterError::UnsupportedOperator(other.to_string())),
    }
}

fn eval_field(field: &str, condition: &Value, record: &Record) -> Result<bool, FilterError> {
    validate_identifier(field)?;
    let null = Value::Null;
    let actual = record.get(field).unwrap_or(&null);

    if let Value::Object(ops) = condition {
        for (op, expected) in ops {
            if !eval_op(op, actual, expected)? {
                return Ok(false);
            }
        }
        Ok(true)
    } else {
        // Implicit equality: { field: value }
        Ok(values_equal(actual, condition))
    }
}

fn eval_op(op: &str, actual: &Value, expected: &Value) -> Result<bool, FilterError> {
    match op {
        "$eq" => Ok(values_equal(actual, expected)),
        "$ne" | "$neq" => Ok(!values_equal(actual, expected)),
        "$gt" => Ok(compare(actual, expected) == Some(Ordering::Greater)),
        "$gte" => {
            Ok(matches!(compare(actual, expected), Some(Ordering::Greater) | Some(Ordering::Equal)))
        }
        "$lt" => Ok(compare(actual, expected) == Some(Ordering::Less)),
        "$lte" => {
            Ok(matches!(compare(actual, expected), Some(Ordering::Less) | Some(Ordering::Equal)))
        }
        "$like" => {
            let pattern = expected.as_str().ok_or_else(|| {
                FilterError::InvalidOperatorData("$like requires a string pattern".to_string())
            })?;
            Ok(actual.as_str().map(|s| like_match(s, pattern)).unwrap_or(false))
        }
        "$in" => {
            let values = expected.as_array().ok_or_else(|| {
                FilterError::InvalidOperatorData("$in requires an array".to_string())
            })?;
            Ok(values.iter().any(|v| values_equal(actual, v)))
        }
        other => Err(FilterError::UnsupportedOperator(other.to_string())),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    // Numbers compare by value so 2 == 2.0 regardless of JSON representation
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x == y;
    }
    a == b
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y);
    }
    // RFC 3339 timestamps order correctly as strings
    if let (Some(x), Some(y)) = (a.as_str(), b.as_str()) {
        return Some(x.cmp(y));
    }
    None
}

/// SQL LIKE semantics over in-memory strings: % matches any run, _ one char
fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    fn matches_at(text: &[char], pattern: &[char]) -> bool {
        match pattern.first() {
            None => text.is_empty(),
            Some('%') => (0..=text.len()).any(|skip| matches_at(&text[skip..], &pattern[1..])),
            Some('_') => !text.is_empty() && matches_at(&text[1..], &pattern[1..]),
            Some(c) => text.first() == Some(c) && matches_at(&text[1..], &pattern[1..]),
        }
    }

    matches_at(&text, &pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn record(fields: Value) -> Record {
        let map: HashMap<String, Value> = fields.as_object().unwrap().clone().into_iter().collect();
        Record::from_stored(map)
    }

    #[test]
    fn empty_filter_does_not_narrow() {
        assert!(!FilterData::default().narrows());
        assert!(!FilterData { where_clause: Some(json!({})), ..Default::default() }.narrows());
        assert!(!FilterData { limit: Some(10), ..Default::default() }.narrows());
        assert!(FilterData::eq("name", "x").narrows());
    }

    #[test]
    fn implicit_equality_and_operators() {
        let rec = record(json!({"name": "ada", "age": 36}));

        assert!(FilterData::eq("name", "ada").matches(&rec).unwrap());
        assert!(!FilterData::eq("name", "bob").matches(&rec).unwrap());

        let gt =
            FilterData { where_clause: Some(json!({"age": {"$gt": 30}})), ..Default::default() };
        assert!(gt.matches(&rec).unwrap());

        let range = FilterData {
            where_clause: Some(json!({"age": {"$gte": 36, "$lt": 40}})),
            ..Default::default()
        };
        assert!(range.matches(&rec).unwrap());
    }

    #[test]
    fn in_and_like() {
        let rec = record(json!({"role": "editor", "email": "ada@example.com"}));

        let any = FilterData::any_of("role", vec![json!("admin"), json!("editor")]);
        assert!(any.matches(&rec).unwrap());

        let like = FilterData {
            where_clause: Some(json!({"email": {"$like": "%@example.com"}})),
            ..Default::default()
        };
        assert!(like.matches(&rec).unwrap());

        let nope = FilterData {
            where_clause: Some(json!({"email": {"$like": "%@other.org"}})),
            ..Default::default()
        };
        assert!(!nope.matches(&rec).unwrap());
    }

    #[test]
    fn logical_operators() {
        let rec = record(json!({"name": "ada", "age": 36}));

        let or = FilterData {
            where_clause: Some(json!({"$or": [{"name": "bob"}, {"age": 36}]})),
            ..Default::default()
        };
        assert!(or.matches(&rec).unwrap());

        let not = FilterData {
            where_clause: Some(json!({"$not": {"name": "ada"}})),
            ..Default::default()
        };
        assert!(!not.matches(&rec).unwrap());
    }

    #[test]
    fn missing_field_compares_as_null() {
        let rec = record(json!({"name": "ada"}));
        let eq_null = FilterData::eq("nickname", Value::Null);
        assert!(eq_null.matches(&rec).unwrap());
        assert!(!FilterData::eq("nickname", "x").matches(&rec).unwrap());
    }

    #[test]
    fn unknown_operator_is_an_error() {
        let rec = record(json!({"age": 1}));
        let bad = FilterData {
            where_clause: Some(json!({"age": {"$regex": "x"}})),
            ..Default::default()
        };
        assert!(matches!(bad.matches(&rec), Err(FilterError::UnsupportedOperator(_))));
    }

    #[test]
    fn like_matching_rules() {
        assert!(like_match("ada@example.com", "%@example.com"));
        assert!(like_match("abc", "a_c"));
        assert!(like_match("abc", "%"));
        assert!(!like_match("abc", "a_"));
        assert!(like_match("", "%"));
    }
}
