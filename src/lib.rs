pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod store;
pub mod ui;

pub use db::DbPool;

use config::Config;
use std::sync::Arc;

use crate::engine::{AccessPolicy, IdentityResolver, ItemEngine, UploadDir};
use crate::store::{SqliteStore, UserStore};

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub engine: ItemEngine,
    pub identity: IdentityResolver,
    pub users: Arc<dyn UserStore>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let store = Arc::new(SqliteStore::new(db.clone()));
        let uploads = Arc::new(UploadDir::new(config.server.uploads_dir.clone()));
        let timeout = config.store.timeout();

        let engine = ItemEngine::new(
            store.clone(),
            uploads,
            AccessPolicy::from(&config.auth),
            timeout,
        );
        let identity = IdentityResolver::new(store.clone(), timeout);

        Self {
            config,
            db,
            engine,
            identity,
            users: store,
        }
    }
}
