use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::icons::IconStore;

/// Shared handles threaded through every route handler. The pool is the
/// only synchronization point; nothing else here is mutable.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub icons: IconStore,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig) -> Self {
        let icons = IconStore::new(config.upload_dir.clone());
        Self {
            pool,
            config: Arc::new(config),
            icons,
        }
    }
}
