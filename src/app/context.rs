use std::sync::Arc;

use crate::app::error::Result;
use crate::config::Config;
use crate::fetcher::http_fetcher::HttpFetcher;
use crate::fetcher::Fetcher;
use crate::pipeline::IngestionPipeline;
use crate::store::sqlite::SqliteStore;
use crate::store::Store;

pub struct AppContext {
    pub store: Arc<dyn Store + Send + Sync>,
    pub fetcher: Arc<dyn Fetcher + Send + Sync>,
    pub config: Config,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let db_path = config.database_path()?;
        tracing::debug!(path = %db_path.display(), "opening database");

        let store = Arc::new(SqliteStore::new(&db_path)?);
        let fetcher = Arc::new(HttpFetcher::from_config(&config.fetch)?);

        Ok(Self::with_parts(config, store, fetcher))
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        let fetcher = Arc::new(HttpFetcher::from_config(&config.fetch)?);

        Ok(Self::with_parts(config, store, fetcher))
    }

    pub fn with_parts(
        config: Config,
        store: Arc<dyn Store + Send + Sync>,
        fetcher: Arc<dyn Fetcher + Send + Sync>,
    ) -> Self {
        Self {
            store,
            fetcher,
            config,
        }
    }

    /// Pipeline sharing this context's store and fetcher. It never reads the
    /// current user.
    pub fn pipeline(&self) -> IngestionPipeline {
        IngestionPipeline::new(
            self.store.clone(),
            self.fetcher.clone(),
            self.config.fetch_timeout(),
        )
    }
}
