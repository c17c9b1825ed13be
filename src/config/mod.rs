use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub bulk: BulkConfig,
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub schema_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkConfig {
    /// When set, an object body carrying this key has the key's value treated
    /// as the data payload (pre-extracted CSV rows and similar wrapped uploads).
    pub payload_key: Option<String>,
    /// Upper bound on records accepted in one bulk payload.
    pub max_records: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_cors: bool,
    pub enable_request_logging: bool,
    /// Cap applied to list limits regardless of what the client asks for.
    pub max_limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection string. When unset the in-memory store is used.
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Environment picks the defaults, specific env vars override them
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Bulk overrides
        if let Ok(v) = env::var("BULK_PAYLOAD_KEY") {
            self.bulk.payload_key = if v.is_empty() { None } else { Some(v) };
        }
        if let Ok(v) = env::var("BULK_MAX_RECORDS") {
            self.bulk.max_records = v.parse().ok();
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_CORS") {
            self.api.enable_cors = v.parse().unwrap_or(self.api.enable_cors);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_LIMIT") {
            self.api.max_limit = v.parse().ok();
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = if v.is_empty() { None } else { Some(v) };
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout =
                v.parse().unwrap_or(self.database.connection_timeout);
        }

        if let Ok(v) = env::var("SCHEMA_FILE") {
            self.schema_file = if v.is_empty() { None } else { Some(v) };
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            bulk: BulkConfig { payload_key: None, max_records: Some(1000) },
            api: ApiConfig {
                enable_cors: true,
                enable_request_logging: true,
                max_limit: Some(1000),
            },
            database: DatabaseConfig { url: None, max_connections: 10, connection_timeout: 30 },
            schema_file: None,
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            bulk: BulkConfig { payload_key: None, max_records: Some(500) },
            api: ApiConfig {
                enable_cors: true,
                enable_request_logging: true,
                max_limit: Some(500),
            },
            database: DatabaseConfig { url: None, max_connections: 20, connection_timeout: 10 },
            schema_file: None,
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            bulk: BulkConfig { payload_key: None, max_records: Some(200) },
            api: ApiConfig {
                enable_cors: true,
                enable_request_logging: false,
                max_limit: Some(100),
            },
            database: DatabaseConfig { url: None, max_connections: 50, connection_timeout: 5 },
            schema_file: None,
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
