use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DataStore, StoreError};
use crate::filter::FilterData;
use crate::record::Record;

type Row = HashMap<String, Value>;

/// In-process store backing the service when no database is configured.
///
/// Rows are kept per resource in insertion order; filtering reuses the same
/// where grammar the Postgres store compiles to SQL.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Row>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn row_id(row: &Row) -> Option<Uuid> {
        row.get("id").and_then(|v| v.as_str()).and_then(|s| Uuid::parse_str(s).ok())
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn list(&self, resource: &str, filter: &FilterData) -> Result<Vec<Record>, StoreError> {
        let collections = self.collections.read().await;
        let rows = collections.get(resource).map(|r| r.as_slice()).unwrap_or(&[]);

        let mut matched = Vec::new();
        for row in rows {
            let record = Record::from_stored(row.clone());
            if filter.matches(&record)? {
                matched.push(record);
            }
        }

        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let matched: Vec<Record> = match filter.limit {
            Some(limit) => {
                matched.into_iter().skip(offset).take(limit.max(0) as usize).collect()
            }
            None => matched.into_iter().skip(offset).collect(),
        };
        Ok(matched)
    }

    async fn get(&self, resource: &str, id: Uuid) -> Result<Option<Record>, StoreError> {
        let collections = self.collections.read().await;
        let rows = collections.get(resource).map(|r| r.as_slice()).unwrap_or(&[]);
        Ok(rows
            .iter()
            .find(|row| Self::row_id(row) == Some(id))
            .map(|row| Record::from_stored(row.clone())))
    }

    async fn insert(&self, resource: &str, mut record: Record) -> Result<Record, StoreError> {
        record.set_id(Uuid::new_v4());
        record.touch_created_at();

        let row = record.to_hashmap();
        let mut collections = self.collections.write().await;
        collections.entry(resource.to_string()).or_default().push(row.clone());
        Ok(Record::from_stored(row))
    }

    async fn update(&self, resource: &str, mut record: Record) -> Result<Record, StoreError> {
        let id = record
            .id()
            .ok_or_else(|| StoreError::Query("update requires a record id".to_string()))?;
        record.touch_updated_at();
        let row = record.to_hashmap();

        let mut collections = self.collections.write().await;
        let rows = collections
            .get_mut(resource)
            .ok_or_else(|| StoreError::NotFound(format!("Record {} not found", id)))?;
        let slot = rows
            .iter_mut()
            .find(|r| Self::row_id(r) == Some(id))
            .ok_or_else(|| StoreError::NotFound(format!("Record {} not found", id)))?;
        *slot = row.clone();
        Ok(Record::from_stored(row))
    }

    async fn delete(&self, resource: &str, id: Uuid) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let rows = collections
            .get_mut(resource)
            .ok_or_else(|| StoreError::NotFound(format!("Record {} not found", id)))?;
        let before = rows.len();
        rows.retain(|r| Self::row_id(r) != Some(id));
        if rows.len() == before {
            return Err(StoreError::NotFound(format!("Record {} not found", id)));
        }
        Ok(())
    }

    async fn count(&self, resource: &str, filter: &FilterData) -> Result<i64, StoreError> {
        let collections = self.collections.read().await;
        let rows = collections.get(resource).map(|r| r.as_slice()).unwrap_or(&[]);
        let mut count = 0i64;
        for row in rows {
            if filter.matches(&Record::from_stored(row.clone()))? {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
