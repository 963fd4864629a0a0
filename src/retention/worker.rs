//! Scheduler loop enforcing per-channel retention policies.
//!
//! Each pass pulls the due channels from the store, deletes their expired
//! messages, derives every channel's next state with [`settle`] and writes the
//! results back in one batch. Passes never overlap; the loop sleeps a fixed
//! interval between them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use tokio_util::sync::CancellationToken;

use super::{
    clock::Clock,
    codec::snowflake_timestamp,
    filter::{EligibilityWindow, filter_eligible},
    settle::{ChannelScan, EvictionReason, Settlement, Upcoming, settle},
};
use crate::{
    config::RetentionConfig,
    db::{PolicyRepo, StorageResult},
    models::{ChannelPolicy, Message, Snowflake},
    platform::{ChatPlatform, MessageQuery},
};

/// Results from a single pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassReport {
    /// Due channels inspected.
    pub checked: usize,
    /// Messages deleted across all channels.
    pub deleted: usize,
    /// Policies written back with a new schedule. Channels untracked while
    /// the pass ran are not counted.
    pub rescheduled: usize,
    /// Policies removed for inactivity.
    pub evicted_inactive: usize,
    /// Policies removed because the channel is gone.
    pub evicted_unreachable: usize,
    /// Channels left untouched after a transient failure.
    pub skipped: usize,
}

impl PassReport {
    pub fn evicted(&self) -> usize {
        self.evicted_inactive + self.evicted_unreachable
    }

    /// Whether the pass changed anything worth an info-level log line.
    pub fn has_changes(&self) -> bool {
        self.deleted > 0 || self.evicted() > 0
    }
}

enum ChannelOutcome {
    Settled {
        settlement: Settlement,
        deleted: usize,
    },
    Skipped,
}

/// Drives retention for every tracked channel.
pub struct RetentionScheduler {
    store: Arc<dyn PolicyRepo>,
    platform: Arc<dyn ChatPlatform>,
    clock: Arc<dyn Clock>,
    config: RetentionConfig,
}

impl RetentionScheduler {
    pub fn new(
        store: Arc<dyn PolicyRepo>,
        platform: Arc<dyn ChatPlatform>,
        clock: Arc<dyn Clock>,
        config: RetentionConfig,
    ) -> Self {
        Self {
            store,
            platform,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    /// Run one pass over the channels due at the clock's current time.
    ///
    /// Only a failure to read the due set is returned. Per-channel platform
    /// failures and failed store writes are logged; the next pass re-derives
    /// the same due set.
    pub async fn run_pass(&self) -> StorageResult<PassReport> {
        let now = self.clock.now();
        let due = self.store.get_due(now).await?;

        let mut report = PassReport {
            checked: due.len(),
            ..Default::default()
        };
        if due.is_empty() {
            return Ok(report);
        }

        let outcomes: Vec<(String, ChannelOutcome)> = stream::iter(due)
            .map(|policy| async move {
                let outcome = self.process_channel(&policy, now).await;
                (policy.channel_id, outcome)
            })
            .buffer_unordered(self.config.max_concurrent_channels)
            .collect()
            .await;

        let mut updates = Vec::new();
        let mut evictions = Vec::new();

        for (channel_id, outcome) in outcomes {
            match outcome {
                ChannelOutcome::Skipped => report.skipped += 1,
                ChannelOutcome::Settled {
                    settlement,
                    deleted,
                } => {
                    report.deleted += deleted;
                    match settlement {
                        Settlement::Reschedule(policy) => updates.push(policy),
                        Settlement::Evict(reason) => {
                            match reason {
                                EvictionReason::Inactive => report.evicted_inactive += 1,
                                EvictionReason::Unreachable => report.evicted_unreachable += 1,
                            }
                            evictions.push(channel_id);
                        }
                    }
                }
            }
        }

        if !updates.is_empty() {
            match self.store.reschedule_batch(&updates).await {
                Ok(written) => report.rescheduled = written,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        channels = updates.len(),
                        "Failed to write rescheduled channels"
                    );
                }
            }
        }

        if !evictions.is_empty()
            && let Err(e) = self.store.delete_batch(&evictions).await
        {
            tracing::error!(
                error = %e,
                channels = evictions.len(),
                "Failed to remove evicted channels"
            );
        }

        Ok(report)
    }

    async fn process_channel(
        &self,
        policy: &ChannelPolicy,
        now: DateTime<Utc>,
    ) -> ChannelOutcome {
        let channel_id = policy.channel_id.as_str();

        let window =
            match EligibilityWindow::at(now, policy.timeout(), self.config.too_old_to_delete()) {
                Ok(window) => window,
                Err(e) => {
                    tracing::warn!(
                        channel_id = %channel_id,
                        error = %e,
                        "Cannot build eligibility window, skipping channel"
                    );
                    return ChannelOutcome::Skipped;
                }
            };

        let query = MessageQuery::before(window.eligible_before, self.config.batch_size);
        let batch = match self.platform.fetch_messages(channel_id, query).await {
            Ok(batch) => batch,
            Err(e) if e.is_unavailable() => {
                tracing::warn!(
                    channel_id = %channel_id,
                    error = %e,
                    "Channel is unavailable, evicting"
                );
                return ChannelOutcome::Settled {
                    settlement: self.settle(policy, ChannelScan::Unreachable, now),
                    deleted: 0,
                };
            }
            Err(e) => {
                tracing::warn!(
                    channel_id = %channel_id,
                    error = %e,
                    "Failed to fetch messages, will retry next pass"
                );
                return ChannelOutcome::Skipped;
            }
        };

        let eligible = filter_eligible(batch, &window);
        let deleted = self.delete_eligible(channel_id, &eligible).await;

        let scan = if deleted > 0 {
            ChannelScan::Deleted(deleted)
        } else {
            ChannelScan::Idle(self.next_to_expire(channel_id, window.eligible_before).await)
        };

        ChannelOutcome::Settled {
            settlement: self.settle(policy, scan, now),
            deleted,
        }
    }

    fn settle(
        &self,
        policy: &ChannelPolicy,
        scan: ChannelScan,
        now: DateTime<Utc>,
    ) -> Settlement {
        let settlement = settle(policy, scan, now, self.config.inactivity_threshold());
        if settlement == Settlement::Evict(EvictionReason::Inactive) {
            tracing::info!(
                channel_id = %policy.channel_id,
                last_activity_at = %policy.last_activity_at,
                "Channel inactive, evicting"
            );
        }
        settlement
    }

    /// Delete `messages` and any threads started from them.
    /// Returns the number of messages deleted; a failed delete counts as none.
    async fn delete_eligible(&self, channel_id: &str, messages: &[Message]) -> usize {
        if messages.is_empty() {
            return 0;
        }

        let ids: Vec<Snowflake> = messages.iter().map(|m| m.id).collect();
        if let Err(e) = self.platform.bulk_delete(channel_id, &ids).await {
            tracing::warn!(
                channel_id = %channel_id,
                messages = ids.len(),
                error = %e,
                "Failed to delete messages"
            );
            return 0;
        }

        tracing::debug!(
            channel_id = %channel_id,
            deleted = ids.len(),
            "Deleted expired messages"
        );

        if self.config.delete_threads {
            for thread in messages.iter().filter_map(|m| m.thread.as_ref()) {
                let thread_id = thread.id.to_string();
                if let Err(e) = self.platform.delete_channel(&thread_id).await {
                    tracing::warn!(
                        channel_id = %channel_id,
                        thread_id = %thread_id,
                        error = %e,
                        "Failed to delete thread"
                    );
                }
            }
        }

        ids.len()
    }

    /// Creation time of the oldest message not yet eligible.
    async fn next_to_expire(&self, channel_id: &str, boundary: Snowflake) -> Upcoming {
        let query = MessageQuery::after(boundary, 1);
        let messages = match self.platform.fetch_messages(channel_id, query).await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(
                    channel_id = %channel_id,
                    error = %e,
                    "Failed to look up next message, will recheck next pass"
                );
                return Upcoming::Unknown;
            }
        };

        // A one-message page holds the oldest message past the cursor.
        let Some(oldest) = messages.iter().map(|m| m.id).min() else {
            return Upcoming::NoMessages;
        };

        match snowflake_timestamp(oldest) {
            Ok(created_at) => Upcoming::At(created_at),
            Err(e) => {
                tracing::warn!(
                    channel_id = %channel_id,
                    error = %e,
                    "Failed to decode next message id"
                );
                Upcoming::Unknown
            }
        }
    }
}

/// Runs the scheduler until `shutdown` is cancelled.
///
/// Cancellation is only observed between passes, so a pass that has started
/// always reaches its store write.
pub async fn start_retention_worker(
    scheduler: Arc<RetentionScheduler>,
    shutdown: CancellationToken,
) {
    let config = scheduler.config();
    tracing::info!(
        batch_size = config.batch_size,
        pass_interval_secs = config.pass_interval_secs,
        inactivity_threshold_hours = config.inactivity_threshold_hours,
        too_old_to_delete_hours = config.too_old_to_delete_hours,
        max_concurrent_channels = config.max_concurrent_channels,
        "Starting retention worker"
    );

    let interval = config.interval();

    while !shutdown.is_cancelled() {
        match scheduler.run_pass().await {
            Ok(report) => {
                if report.has_changes() {
                    tracing::info!(
                        checked = report.checked,
                        deleted = report.deleted,
                        rescheduled = report.rescheduled,
                        evicted_inactive = report.evicted_inactive,
                        evicted_unreachable = report.evicted_unreachable,
                        skipped = report.skipped,
                        "Retention pass complete"
                    );
                } else {
                    tracing::debug!(
                        checked = report.checked,
                        skipped = report.skipped,
                        "Retention pass complete, nothing deleted"
                    );
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Error running retention pass");
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    tracing::info!("Retention worker stopped");
}
