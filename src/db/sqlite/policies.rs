use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tokio::sync::RwLock;

use crate::{
    db::{
        error::{StorageError, StorageResult},
        repos::PolicyRepo,
    },
    models::{ChannelPolicy, TimeoutBounds},
};

/// Keeps `IN (...)` lists well under SQLite's bound-parameter limit.
const DELETE_CHUNK_SIZE: usize = 500;

pub struct SqlitePolicyRepo {
    pool: SqlitePool,
    bounds: TimeoutBounds,
    // Fair (FIFO) lock: readers share, writers are exclusive.
    lock: Arc<RwLock<()>>,
}

impl SqlitePolicyRepo {
    /// Policies written through this repo must have a timeout within `bounds`.
    pub fn new(pool: SqlitePool, bounds: TimeoutBounds) -> Self {
        Self {
            pool,
            bounds,
            lock: Arc::new(RwLock::new(())),
        }
    }

    fn parse_timestamp(secs: i64, column: &str) -> StorageResult<DateTime<Utc>> {
        DateTime::from_timestamp(secs, 0).ok_or_else(|| {
            StorageError::Internal(format!("{column} out of range: {secs}"))
        })
    }

    fn row_to_policy(row: &SqliteRow) -> StorageResult<ChannelPolicy> {
        Ok(ChannelPolicy {
            channel_id: row.get("channel_id"),
            timeout_hours: row.get("timeout_hours"),
            last_activity_at: Self::parse_timestamp(
                row.get("last_activity_at"),
                "last_activity_at",
            )?,
            next_check_at: Self::parse_timestamp(row.get("next_check_at"), "next_check_at")?,
        })
    }

    fn validate(&self, policy: &ChannelPolicy) -> StorageResult<()> {
        if policy.channel_id.is_empty() {
            return Err(StorageError::Validation(
                "channel_id cannot be empty".into(),
            ));
        }
        self.bounds.check(policy.timeout_hours).map_err(|e| match e {
            StorageError::Validation(msg) => {
                StorageError::Validation(format!("channel {}: {msg}", policy.channel_id))
            }
            other => other,
        })
    }

    async fn write_one<'e, E>(executor: E, policy: &ChannelPolicy) -> StorageResult<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO channels (channel_id, timeout_hours, last_activity_at, next_check_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (channel_id) DO UPDATE SET
                timeout_hours = excluded.timeout_hours,
                last_activity_at = excluded.last_activity_at,
                next_check_at = excluded.next_check_at
            "#,
        )
        .bind(&policy.channel_id)
        .bind(policy.timeout_hours)
        .bind(policy.last_activity_at.timestamp())
        .bind(policy.next_check_at.timestamp())
        .execute(executor)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl PolicyRepo for SqlitePolicyRepo {
    async fn get_due(&self, now: DateTime<Utc>) -> StorageResult<Vec<ChannelPolicy>> {
        let _guard = self.lock.read().await;

        let rows = sqlx::query(
            r#"
            SELECT channel_id, timeout_hours, last_activity_at, next_check_at
            FROM channels
            WHERE next_check_at < ?
            ORDER BY next_check_at ASC
            "#,
        )
        .bind(now.timestamp())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_policy).collect()
    }

    async fn get(&self, channel_id: &str) -> StorageResult<Option<ChannelPolicy>> {
        let _guard = self.lock.read().await;

        let row = sqlx::query(
            r#"
            SELECT channel_id, timeout_hours, last_activity_at, next_check_at
            FROM channels
            WHERE channel_id = ?
            "#,
        )
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_policy).transpose()
    }

    async fn list_all(&self) -> StorageResult<Vec<ChannelPolicy>> {
        let _guard = self.lock.read().await;

        let rows = sqlx::query(
            r#"
            SELECT channel_id, timeout_hours, last_activity_at, next_check_at
            FROM channels
            ORDER BY channel_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_policy).collect()
    }

    async fn upsert(&self, policy: &ChannelPolicy) -> StorageResult<()> {
        self.validate(policy)?;
        let _guard = self.lock.write().await;
        Self::write_one(&self.pool, policy).await
    }

    async fn upsert_batch(&self, policies: &[ChannelPolicy]) -> StorageResult<usize> {
        if policies.is_empty() {
            return Ok(0);
        }

        let _guard = self.lock.write().await;

        // Any failure drops the transaction, which rolls it back.
        let mut tx = self.pool.begin().await?;
        for policy in policies {
            self.validate(policy)?;
            Self::write_one(&mut *tx, policy).await?;
        }
        tx.commit().await?;

        Ok(policies.len())
    }

    async fn reschedule_batch(&self, policies: &[ChannelPolicy]) -> StorageResult<usize> {
        if policies.is_empty() {
            return Ok(0);
        }

        let _guard = self.lock.write().await;

        let mut tx = self.pool.begin().await?;
        let mut updated: u64 = 0;
        for policy in policies {
            updated += sqlx::query(
                r#"
                UPDATE channels
                SET last_activity_at = ?, next_check_at = ?
                WHERE channel_id = ?
                "#,
            )
            .bind(policy.last_activity_at.timestamp())
            .bind(policy.next_check_at.timestamp())
            .bind(&policy.channel_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }
        tx.commit().await?;

        Ok(updated as usize)
    }

    async fn delete(&self, channel_id: &str) -> StorageResult<bool> {
        let _guard = self.lock.write().await;

        let result = sqlx::query("DELETE FROM channels WHERE channel_id = ?")
            .bind(channel_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_batch(&self, channel_ids: &[String]) -> StorageResult<u64> {
        if channel_ids.is_empty() {
            return Ok(0);
        }

        let _guard = self.lock.write().await;

        let mut tx = self.pool.begin().await?;
        let mut total_deleted: u64 = 0;

        for chunk in channel_ids.chunks(DELETE_CHUNK_SIZE) {
            let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let query = format!(
                "DELETE FROM channels WHERE channel_id IN ({})",
                placeholders
            );

            let mut query_builder = sqlx::query(&query);
            for id in chunk {
                query_builder = query_builder.bind(id);
            }

            total_deleted += query_builder.execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(total_deleted)
    }
}
