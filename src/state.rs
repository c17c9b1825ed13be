use std::sync::Arc;

use crate::config::AppConfig;
use crate::hooks::{BulkHooks, DefaultBulkHooks};
use crate::schema::SchemaRegistry;
use crate::store::{DataStore, MemoryStore, PostgresStore};

/// Shared handler state: the persistence backend, the resource schemas and
/// the bulk extension hooks, all behind trait objects so deployments can
/// swap them without touching the handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DataStore>,
    pub schemas: Arc<SchemaRegistry>,
    pub hooks: Arc<dyn BulkHooks>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DataStore>,
        schemas: Arc<SchemaRegistry>,
        hooks: Arc<dyn BulkHooks>,
    ) -> Self {
        Self { store, schemas, hooks }
    }

    /// Build state from config: schema file, store backend (Postgres when a
    /// database URL is configured, in-memory otherwise or when DATA_STORE
    /// forces it) and the stock hooks.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let schemas = match &config.schema_file {
            Some(path) => SchemaRegistry::from_file(path)?,
            None => {
                tracing::warn!("No SCHEMA_FILE configured - no resources registered");
                SchemaRegistry::new()
            }
        };

        let force_memory =
            std::env::var("DATA_STORE").map(|v| v.eq_ignore_ascii_case("memory")).unwrap_or(false);

        let store: Arc<dyn DataStore> = match (&config.database.url, force_memory) {
            (Some(url), false) => {
                tracing::info!("Using Postgres store");
                Arc::new(
                    PostgresStore::connect(
                        url,
                        config.database.max_connections,
                        config.database.connection_timeout,
                    )
                    .await?,
                )
            }
            _ => {
                tracing::info!("Using in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(Self::new(store, Arc::new(schemas), Arc::new(DefaultBulkHooks)))
    }
}
