mod error;
pub mod repos;
pub mod sqlite;

#[cfg(test)]
pub mod tests;

use std::sync::Arc;

pub use error::{StorageError, StorageResult};
pub use repos::*;

use crate::{config::DatabaseConfig, models::TimeoutBounds};

/// Properties store backed by SQLite.
///
/// Repositories are created once at construction time.
pub struct DbPool {
    pool: sqlx::SqlitePool,
    policies: Arc<dyn PolicyRepo>,
}

impl DbPool {
    /// Create a DbPool from an existing SQLite pool.
    /// Primarily useful for testing.
    pub fn from_sqlite(pool: sqlx::SqlitePool, bounds: TimeoutBounds) -> Self {
        let policies = Arc::new(sqlite::SqlitePolicyRepo::new(pool.clone(), bounds));
        DbPool { pool, policies }
    }

    /// Open the database described by `config`.
    ///
    /// `bounds` limits the timeouts the store accepts.
    pub async fn from_config(
        config: &DatabaseConfig,
        bounds: TimeoutBounds,
    ) -> StorageResult<Self> {
        if let Some(parent) = std::path::Path::new(&config.path).parent()
            && config.create_if_missing
            && !config.is_memory()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Internal(format!(
                    "failed to create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        // Every connection to `:memory:` opens a separate database.
        let max_connections = if config.is_memory() {
            1
        } else {
            config.max_connections
        };

        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(
                sqlx::sqlite::SqliteConnectOptions::new()
                    .filename(&config.path)
                    .create_if_missing(config.create_if_missing)
                    .journal_mode(if config.wal_mode {
                        sqlx::sqlite::SqliteJournalMode::Wal
                    } else {
                        sqlx::sqlite::SqliteJournalMode::Delete
                    })
                    .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms)),
            )
            .await?;

        Ok(Self::from_sqlite(pool, bounds))
    }

    /// Apply the embedded migrations.
    pub async fn run_migrations(&self) -> StorageResult<()> {
        tracing::info!("Running SQLite migrations");
        sqlx::migrate!("./migrations_sqlx/sqlite")
            .run(&self.pool)
            .await?;
        tracing::info!("SQLite migrations completed successfully");
        Ok(())
    }

    /// Get the channel policy repository.
    pub fn policies(&self) -> Arc<dyn PolicyRepo> {
        Arc::clone(&self.policies)
    }

    pub async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
