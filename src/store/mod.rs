pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::filter::FilterData;
use crate::record::Record;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(#[from] crate::filter::FilterError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Persistence seam for resource collections.
///
/// One implementation per backend; bulk operations stay a sequential loop of
/// these single-record calls unless a hook overrides the fan-out, so any
/// atomicity guarantees live below this trait, not above it.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Records matching the filter, in stored order, with limit/offset applied
    async fn list(&self, resource: &str, filter: &FilterData) -> Result<Vec<Record>, StoreError>;

    async fn get(&self, resource: &str, id: Uuid) -> Result<Option<Record>, StoreError>;

    /// Persist a new record; the store assigns id and timestamps
    async fn insert(&self, resource: &str, record: Record) -> Result<Record, StoreError>;

    /// Persist changes to an existing record, matched by its id
    async fn update(&self, resource: &str, record: Record) -> Result<Record, StoreError>;

    async fn delete(&self, resource: &str, id: Uuid) -> Result<(), StoreError>;

    async fn count(&self, resource: &str, filter: &FilterData) -> Result<i64, StoreError>;

    /// Liveness check for the health endpoint
    async fn ping(&self) -> Result<(), StoreError>;
}
