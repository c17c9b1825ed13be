use serde_json::Value;

use super::{validate_identifier, FilterError};

/// A SQL fragment plus the positional parameters it references
#[derive(Debug, Clone)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Compiles a where clause to a parameterized Postgres WHERE fragment.
///
/// Same grammar as the in-memory evaluator; parameters are numbered from
/// `starting_param_index` so callers can prepend their own bindings.
pub struct FilterSql {
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterSql {
    pub fn generate(
        where_clause: Option<&Value>,
        starting_param_index: usize,
    ) -> Result<SqlQuery, FilterError> {
        let mut builder =
            Self { param_values: vec![], param_index: starting_param_index };
        let sql = match where_clause {
            None => "1=1".to_string(),
            Some(clause) => {
                let fragment = builder.build_clause(clause)?;
                if fragment.is_empty() {
                    "1=1".to_string()
                } else {
                    fragment
                }
            }
        };
        Ok(SqlQuery { sql, params: builder.param_values })
    }

    fn build_clause(&mut self, clause: &Value) -> Result<String, FilterError> {
        let map = match clause {
            Value::Object(map) => map,
            _ => {
                return Err(FilterError::InvalidWhereClause(
                    "WHERE must be a JSON object".to_string(),
                ))
            }
        };

        let mut conditions = vec![];
        for (key, value) in map {
            if key.starts_with('$') {
                conditions.push(self.build_logical(key, value)?);
            } else {
                conditions.push(self.build_field(key, value)?);
            }
        }
        Ok(conditions.join(" AND "))
    }

    fn build_logical(&mut self, op: &str, value: &Value) -> Result<String, FilterError> {
        match op {
            "$and" | "$or" => {
                let clauses = value.as_array().ok_or_else(|| {
                    FilterError::InvalidOperatorData(format!("{} requires an array", op))
                })?;
                let mut parts = vec![];
                for clause in clauses {
                    parts.push(format!("({})", self.build_clause(clause)?));
                }
                let joiner = if op == "$and" { " AND " } else { " OR " };
                Ok(parts.join(joiner))
            }
            "$not" => Ok(format!("NOT ({})", self.build_clause(value)?)),
            other => Err(FilterError::UnsupportedOperator(other.to_string())),
        }
    }

    fn build_field(&mut self, field: &str, condition: &Value) -> Result<String, FilterError> {
        validate_identifier(field)?;
        let column = format!("\"{}\"", field);

        if let Value::Object(ops) = condition {
            let mut parts = vec![];
            for (op, data) in ops {
                parts.push(self.build_op(&column, op, data)?);
            }
            Ok(parts.join(" AND "))
        } else {
            self.build_op(&column, "$eq", condition)
        }
    }

    fn build_op(&mut self, column: &str, op: &str, data: &Value) -> Result<String, FilterError> {
        match op {
            "$eq" => {
                if data.is_null() {
                    Ok(format!("{} IS NULL", column))
                } else {
                    Ok(format!("{} = {}", column, self.param(data.clone())))
                }
            }
            "$ne" | "$neq" => {
                if data.is_null() {
                    Ok(format!("{} IS NOT NULL", column))
                } else {
                    Ok(format!("{} <> {}", column, self.param(data.clone())))
                }
            }
            "$gt" => Ok(format!("{} > {}", column, self.param(data.clone()))),
            "$gte" => Ok(format!("{} >= {}", column, self.param(data.clone()))),
            "$lt" => Ok(format!("{} < {}", column, self.param(data.clone()))),
            "$lte" => Ok(format!("{} <= {}", column, self.param(data.clone()))),
            "$like" => Ok(format!("{} LIKE {}", column, self.param(data.clone()))),
            "$in" => {
                if let Value::Array(values) = data {
                    if values.is_empty() {
                        // Nothing can match an empty set
                        return Ok("1=0".to_string());
                    }
                    let params: Vec<String> =
                        values.iter().map(|v| self.param(v.clone())).collect();
                    Ok(format!("{} IN ({})", column, params.join(", ")))
                } else {
                    Err(FilterError::InvalidOperatorData("$in requires an array".to_string()))
                }
            }
            other => Err(FilterError::UnsupportedOperator(other.to_string())),
        }
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}
