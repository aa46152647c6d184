/// Configuration management for the bookstore catalog
use crate::error::{CatalogError, CatalogResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Log filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "bookstore_catalog=debug,tower_http=debug";

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub queries: QueryConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
}

/// Which record store backs the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StoreBackend,
    pub database_path: PathBuf,
    pub max_connections: u32,
    /// Deadline applied to every record store operation
    pub query_timeout_ms: u64,
}

impl StorageConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

/// Query defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub default_page_size: u64,
    pub max_page_size: u64,
    /// Radius used by count-near when the caller gives none
    pub count_near_default_meters: f64,
    /// Reviews shown on the user detail view
    pub user_top_reviews: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives
    pub level: String,
    pub json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                hostname: "0.0.0.0".to_string(),
                port: 3000,
            },
            storage: StorageConfig {
                backend: StoreBackend::Sqlite,
                database_path: PathBuf::from("./data/catalog.sqlite"),
                max_connections: 10,
                query_timeout_ms: 5000,
            },
            queries: QueryConfig {
                default_page_size: 20,
                max_page_size: 100,
                count_near_default_meters: 500.0,
                user_top_reviews: 3,
            },
            logging: LoggingConfig {
                level: DEFAULT_LOG_FILTER.to_string(),
                json: false,
            },
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> CatalogResult<Self> {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        let hostname =
            env::var("CATALOG_HOSTNAME").unwrap_or_else(|_| defaults.service.hostname.clone());
        let port = env::var("CATALOG_PORT")
            .unwrap_or_else(|_| defaults.service.port.to_string())
            .parse()
            .map_err(|_| CatalogError::Configuration("Invalid port number".to_string()))?;

        let backend = match env::var("CATALOG_STORE_BACKEND")
            .unwrap_or_else(|_| "sqlite".to_string())
            .to_lowercase()
            .as_str()
        {
            "sqlite" => StoreBackend::Sqlite,
            "memory" => StoreBackend::Memory,
            other => {
                return Err(CatalogError::Configuration(format!(
                    "Unknown store backend: {}",
                    other
                )))
            }
        };
        let database_path = env::var("CATALOG_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage.database_path);
        let max_connections = env::var("CATALOG_DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(defaults.storage.max_connections);
        let query_timeout_ms = env::var("CATALOG_QUERY_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .unwrap_or(defaults.storage.query_timeout_ms);

        let default_page_size = env::var("CATALOG_DEFAULT_PAGE_SIZE")
            .unwrap_or_else(|_| "20".to_string())
            .parse()
            .unwrap_or(defaults.queries.default_page_size);
        let max_page_size = env::var("CATALOG_MAX_PAGE_SIZE")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .unwrap_or(defaults.queries.max_page_size);
        let count_near_default_meters = env::var("CATALOG_COUNT_NEAR_DEFAULT_METERS")
            .unwrap_or_else(|_| "500".to_string())
            .parse()
            .unwrap_or(defaults.queries.count_near_default_meters);
        let user_top_reviews = env::var("CATALOG_USER_TOP_REVIEWS")
            .unwrap_or_else(|_| "3".to_string())
            .parse()
            .unwrap_or(defaults.queries.user_top_reviews);

        let level = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
        let json = env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(ServerConfig {
            service: ServiceConfig { hostname, port },
            storage: StorageConfig {
                backend,
                database_path,
                max_connections,
                query_timeout_ms,
            },
            queries: QueryConfig {
                default_page_size,
                max_page_size,
                count_near_default_meters,
                user_top_reviews,
            },
            logging: LoggingConfig { level, json },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> CatalogResult<()> {
        if self.service.hostname.is_empty() {
            return Err(CatalogError::Configuration(
                "Hostname cannot be empty".to_string(),
            ));
        }

        if self.service.port == 0 {
            return Err(CatalogError::Configuration("Port cannot be 0".to_string()));
        }

        if self.storage.max_connections == 0 {
            return Err(CatalogError::Configuration(
                "Connection pool needs at least one connection".to_string(),
            ));
        }

        if self.storage.query_timeout_ms == 0 {
            return Err(CatalogError::Configuration(
                "Query timeout must be positive".to_string(),
            ));
        }

        if self.queries.default_page_size == 0 || self.queries.max_page_size == 0 {
            return Err(CatalogError::Configuration(
                "Page sizes must be positive".to_string(),
            ));
        }

        let radius = self.queries.count_near_default_meters;
        if !radius.is_finite() || radius <= 0.0 {
            return Err(CatalogError::Configuration(
                "Default count-near radius must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
