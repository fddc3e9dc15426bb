// Library root for the mood journal API

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod store;

use std::{path::PathBuf, sync::Arc};

use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::StartupError;

// Re-export commonly used types
pub use db::Database;
pub use error::ApiError;
pub use models::{CreateUserRequest, MoodEntry, MoodEntryPayload, User};
pub use store::{memory::MemoryStore, MoodStore};

/// Shared state handed to every handler through axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MoodStore>,
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn new(store: Arc<dyn MoodStore>, static_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            static_dir: static_dir.into(),
        }
    }
}

/// Connects to PostgreSQL and brings the schema up to date.
/// Callers treat any error as fatal; nothing here retries.
pub async fn init_database(config: &DatabaseConfig) -> Result<Database, StartupError> {
    info!(
        "Connecting to database at {}:{}/{} as user {}",
        config.host, config.port, config.database, config.username
    );

    let database = Database::new(config.clone())
        .await
        .map_err(StartupError::Connect)?;
    info!("Database connection established");

    database.migrate().await.map_err(StartupError::Migrate)?;

    Ok(database)
}
