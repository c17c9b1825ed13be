use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::{PgPool, Row};
use std::time::Duration;
use uuid::Uuid;

use super::{DataStore, StoreError};
use crate::filter::sql::FilterSql;
use crate::filter::{validate_identifier, FilterData};
use crate::record::Record;

/// Postgres-backed store. Tables are named after resources, columns after
/// schema fields; rows are read back as JSON via row_to_json so the dynamic
/// record layer never needs per-column type mapping.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(
        url: &str,
        max_connections: u32,
        connection_timeout: u64,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(connection_timeout))
            .connect(url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    fn select_sql(resource: &str, filter: &FilterData) -> Result<(String, Vec<Value>), StoreError> {
        validate_identifier(resource)?;
        let fragment = FilterSql::generate(filter.where_clause.as_ref(), 0)?;

        let mut inner = format!("SELECT * FROM \"{}\" WHERE {}", resource, fragment.sql);
        match (filter.limit, filter.offset) {
            (Some(limit), Some(offset)) => {
                inner.push_str(&format!(" LIMIT {} OFFSET {}", limit.max(0), offset.max(0)))
            }
            (Some(limit), None) => inner.push_str(&format!(" LIMIT {}", limit.max(0))),
            (None, Some(offset)) => inner.push_str(&format!(" OFFSET {}", offset.max(0))),
            (None, None) => {}
        }

        Ok((format!("SELECT row_to_json(t) AS row FROM ({}) t", inner), fragment.params))
    }

    fn record_from_row(row: &sqlx::postgres::PgRow) -> Result<Record, StoreError> {
        let value: Value = row.try_get("row")?;
        match value {
            Value::Object(map) => Ok(Record::from_stored(map.into_iter().collect())),
            _ => Err(StoreError::Query("unexpected record format".to_string())),
        }
    }

    /// Sorted (column, value) pairs for deterministic statements
    fn columns(record: &Record) -> Result<Vec<(String, Value)>, StoreError> {
        let mut columns: Vec<(String, Value)> = record.to_hashmap().into_iter().collect();
        columns.sort_by(|(a, _), (b, _)| a.cmp(b));
        for (name, _) in &columns {
            validate_identifier(name)?;
        }
        Ok(columns)
    }
}

#[async_trait]
impl DataStore for PostgresStore {
    async fn list(&self, resource: &str, filter: &FilterData) -> Result<Vec<Record>, StoreError> {
        let (sql, params) = Self::select_sql(resource, filter)?;
        let mut query = sqlx::query(&sql);
        for param in params.iter() {
            query = bind_param(query, param);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::record_from_row).collect()
    }

    async fn get(&self, resource: &str, id: Uuid) -> Result<Option<Record>, StoreError> {
        validate_identifier(resource)?;
        let sql = format!(
            "SELECT row_to_json(t) AS row FROM (SELECT * FROM \"{}\" WHERE \"id\" = $1) t",
            resource
        );
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::record_from_row).transpose()
    }

    async fn insert(&self, resource: &str, mut record: Record) -> Result<Record, StoreError> {
        validate_identifier(resource)?;
        record.set_id(Uuid::new_v4());
        record.touch_created_at();

        let columns = Self::columns(&record)?;
        let names: Vec<String> = columns.iter().map(|(n, _)| format!("\"{}\"", n)).collect();
        let placeholders: Vec<String> =
            (1..=columns.len()).map(|i| format!("${}", i)).collect();
        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            resource,
            names.join(", "),
            placeholders.join(", ")
        );

        let mut query = sqlx::query(&sql);
        for (name, value) in columns.iter() {
            query = bind_column(query, name, value);
        }
        query.execute(&self.pool).await?;

        Ok(Record::from_stored(record.to_hashmap()))
    }

    async fn update(&self, resource: &str, mut record: Record) -> Result<Record, StoreError> {
        validate_identifier(resource)?;
        let id = record
            .id()
            .ok_or_else(|| StoreError::Query("update requires a record id".to_string()))?;
        record.touch_updated_at();

        let columns: Vec<(String, Value)> =
            Self::columns(&record)?.into_iter().filter(|(name, _)| name != "id").collect();
        let assignments: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, (name, _))| format!("\"{}\" = ${}", name, i + 2))
            .collect();
        let sql = format!(
            "UPDATE \"{}\" SET {} WHERE \"id\" = $1",
            resource,
            assignments.join(", ")
        );

        let mut query = sqlx::query(&sql).bind(id);
        for (name, value) in columns.iter() {
            query = bind_column(query, name, value);
        }
        let result = query.execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Record {} not found", id)));
        }

        Ok(Record::from_stored(record.to_hashmap()))
    }

    async fn delete(&self, resource: &str, id: Uuid) -> Result<(), StoreError> {
        validate_identifier(resource)?;
        let sql = format!("DELETE FROM \"{}\" WHERE \"id\" = $1", resource);
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Record {} not found", id)));
        }
        Ok(())
    }

    async fn count(&self, resource: &str, filter: &FilterData) -> Result<i64, StoreError> {
        validate_identifier(resource)?;
        let fragment = FilterSql::generate(filter.where_clause.as_ref(), 0)?;
        let sql =
            format!("SELECT COUNT(*) AS count FROM \"{}\" WHERE {}", resource, fragment.sql);
        let mut query = sqlx::query(&sql);
        for param in fragment.params.iter() {
            query = bind_param(query, param);
        }
        let row = query.fetch_one(&self.pool).await?;
        let count: i64 = row.try_get("count")?;
        Ok(count)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

/// Bind a JSON value by its JSON type
fn bind_param<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                // Postgres doesn't have u64; cast down if safe
                q.bind(u as i64)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()), // JSONB
    }
}

/// Bind a column value, parsing service-owned fields to their SQL types
fn bind_column<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    column: &str,
    value: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match column {
        "id" => {
            let id = value.as_str().and_then(|s| Uuid::parse_str(s).ok());
            q.bind(id)
        }
        "created_at" | "updated_at" => {
            let ts = value
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc));
            q.bind(ts)
        }
        _ => bind_param(q, value),
    }
}
