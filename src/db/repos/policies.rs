use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{db::error::StorageResult, models::ChannelPolicy};

/// Persistent mapping from channel id to its retention policy.
///
/// Implementations own their concurrency discipline: reads may run
/// concurrently, mutations are serialized with each other and with reads.
#[async_trait]
pub trait PolicyRepo: Send + Sync {
    /// All policies with `next_check_at < now`.
    async fn get_due(&self, now: DateTime<Utc>) -> StorageResult<Vec<ChannelPolicy>>;

    /// Point lookup. Absence is not an error.
    async fn get(&self, channel_id: &str) -> StorageResult<Option<ChannelPolicy>>;

    /// Every tracked policy, ordered by channel id.
    async fn list_all(&self) -> StorageResult<Vec<ChannelPolicy>>;

    /// Insert or replace a policy. The timeout must lie within the
    /// configured bounds.
    async fn upsert(&self, policy: &ChannelPolicy) -> StorageResult<()>;

    /// Insert or replace several policies in one transaction.
    /// Either every row is written or none is.
    async fn upsert_batch(&self, policies: &[ChannelPolicy]) -> StorageResult<usize>;

    /// Store new scheduling state for channels that are still tracked.
    ///
    /// Only `last_activity_at` and `next_check_at` are written, in one
    /// transaction. Rows deleted since they were read stay deleted and
    /// `timeout_hours` keeps whatever value the row holds now. Returns the
    /// number of rows updated.
    async fn reschedule_batch(&self, policies: &[ChannelPolicy]) -> StorageResult<usize>;

    /// Stop tracking a channel. Returns whether a row was removed.
    async fn delete(&self, channel_id: &str) -> StorageResult<bool>;

    /// Stop tracking several channels. Missing ids are ignored.
    async fn delete_batch(&self, channel_ids: &[String]) -> StorageResult<u64>;
}
