use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{ConnectOptions, SqlitePool};
use tracing::info;
use tracing::log::LevelFilter;

use crate::config::Config;
use crate::domain::ports::{BookingStore, NotificationService, PermissionOracle};
use crate::domain::services::booking_manager::BookingManager;
use crate::infra::repositories::memory_booking_store::MemoryBookingStore;
use crate::infra::repositories::sqlite_booking_store::SqliteBookingStore;

pub async fn bootstrap_store(config: &Config) -> Arc<dyn BookingStore> {
    match &config.database_url {
        Some(url) => {
            info!("Initializing SQLite booking store with WAL mode...");

            let opts = SqliteConnectOptions::from_str(url)
                .expect("Invalid SQLite connection string")
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(Duration::from_secs(5))
                .log_statements(LevelFilter::Debug)
                .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

            let pool = SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(opts)
                .await
                .expect("Failed to connect to SQLite");

            run_sqlite_migrations(&pool).await;

            Arc::new(SqliteBookingStore::new(pool, config.lock_timeout))
        }
        None => {
            info!("Initializing in-memory booking store...");
            Arc::new(MemoryBookingStore::new(config.lock_timeout))
        }
    }
}

pub async fn bootstrap_manager(
    config: &Config,
    oracle: Arc<dyn PermissionOracle>,
    notifier: Arc<dyn NotificationService>,
) -> BookingManager {
    let store = bootstrap_store(config).await;
    BookingManager::new(store, oracle, notifier, config.audience_tags.clone())
}

async fn run_sqlite_migrations(pool: &SqlitePool) {
    sqlx::migrate!("./migrations/sqlite")
        .run(pool)
        .await
        .expect("Failed to run SQLite migrations");
}
