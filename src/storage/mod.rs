//! Storage implementations.

use std::sync::Arc;

use tracing::info;

use crate::config::{StorageConfig, StorageType};
use crate::interfaces::LedgerStore;

pub mod helpers;
pub mod mock;
pub mod schema;
pub mod sqlite;

pub use mock::MockLedgerStore;
pub use sqlite::SqliteLedgerStore;

/// Initialize storage based on configuration.
pub async fn init_storage(
    config: &StorageConfig,
) -> Result<Arc<dyn LedgerStore>, Box<dyn std::error::Error>> {
    info!("Storage: {} at {}", config.storage_type, config.path);

    match config.storage_type {
        StorageType::Sqlite => {
            if let Some(parent) = std::path::Path::new(&config.path).parent() {
                std::fs::create_dir_all(parent)?;
            }

            let pool =
                sqlx::SqlitePool::connect(&format!("sqlite:{}?mode=rwc", config.path)).await?;

            let store = SqliteLedgerStore::new(pool);
            store.init().await?;

            Ok(Arc::new(store))
        }
        StorageType::Memory => Ok(Arc::new(MockLedgerStore::new())),
    }
}
