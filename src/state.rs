use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;
use crate::site::repository::DynSiteRepository;
use crate::storage::ObjectStore;
use crate::stories::repository::DynStoryRepository;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub stories: DynStoryRepository,
    pub site: DynSiteRepository,
    pub uploads: Arc<ObjectStore>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        use crate::site::repository::SqliteSiteRepository;
        use crate::stories::repository::SqliteStoryRepository;

        let uploads = Arc::new(ObjectStore::new(config.uploads_path().clone()));
        Self {
            stories: Arc::new(SqliteStoryRepository::new(db.clone())),
            site: Arc::new(SqliteSiteRepository::new(db.clone())),
            uploads,
            db,
            config,
        }
    }
}
