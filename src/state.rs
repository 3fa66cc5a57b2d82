use sea_orm::DatabaseConnection;

use crate::config::Config;
use crate::live::LiveQuizService;

/// Shared application state available to all request handlers via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Config,
    pub live: LiveQuizService,
}

impl AppState {
    #[must_use]
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        let live = LiveQuizService::new(db.clone(), &config);
        Self { db, config, live }
    }
}
