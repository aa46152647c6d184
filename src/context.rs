/// Application context and dependency injection
use crate::{
    catalog::{ranking::TopLimit, BookManager, CommentManager, UserManager},
    config::{ServerConfig, StoreBackend},
    db,
    error::CatalogResult,
    geo::LocationManager,
    store::{MemoryRecordStore, RecordStore, SqliteRecordStore},
};
use std::sync::Arc;
use tracing::info;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub store: Arc<dyn RecordStore>,
    pub books: Arc<BookManager>,
    pub users: Arc<UserManager>,
    pub comments: Arc<CommentManager>,
    pub locations: Arc<LocationManager>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> CatalogResult<Self> {
        config.validate()?;

        let store: Arc<dyn RecordStore> = match config.storage.backend {
            StoreBackend::Sqlite => {
                let pool = db::create_pool(
                    &config.storage.database_path,
                    db::DatabaseOptions {
                        max_connections: config.storage.max_connections,
                        ..Default::default()
                    },
                )
                .await?;
                db::run_migrations(&pool).await?;
                db::test_connection(&pool).await?;

                info!(path = %config.storage.database_path.display(), "sqlite_store_ready");
                Arc::new(SqliteRecordStore::new(pool, config.storage.query_timeout()))
            }
            StoreBackend::Memory => {
                info!("memory_store_ready");
                Arc::new(MemoryRecordStore::new())
            }
        };

        Self::with_store(config, store)
    }

    /// Build the context around an existing record store
    pub fn with_store(config: ServerConfig, store: Arc<dyn RecordStore>) -> CatalogResult<Self> {
        let top_reviews = TopLimit::new(config.queries.user_top_reviews)?;

        Ok(Self {
            books: Arc::new(BookManager::new(Arc::clone(&store))),
            users: Arc::new(UserManager::new(Arc::clone(&store), top_reviews)),
            comments: Arc::new(CommentManager::new(Arc::clone(&store))),
            locations: Arc::new(LocationManager::new(Arc::clone(&store))),
            config: Arc::new(config),
            store,
        })
    }
}
