//! Application state shared across all request handlers

use std::sync::Arc;

use crate::config::Config;
use crate::database::init_db;
use crate::service::ShortenService;
use crate::store::{MappingStore, RedbMappingStore};

/// Cloned into every handler by axum; all fields are cheap `Arc` clones.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub service: Arc<ShortenService>,
}

impl AppState {
    /// Wires the service on top of an already opened store.
    pub fn new(config: Config, store: Arc<dyn MappingStore>) -> Self {
        let service = ShortenService::new(store, config.app_version.clone());
        Self {
            config: Arc::new(config),
            service: Arc::new(service),
        }
    }

    /// Opens (or creates) the database at `config.database_path`.
    pub fn open(config: Config) -> Result<Self, redb::Error> {
        let db = init_db(&config.database_path)?;
        let store = RedbMappingStore::new(Arc::new(db));
        Ok(Self::new(config, Arc::new(store)))
    }
}
