use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{StorageError, StorageResult};

/// Converts fractional hours to a duration with millisecond precision.
///
/// Saturates instead of overflowing for absurdly large inputs.
pub fn hours(value: f64) -> Duration {
    let millis = (value * 3_600_000.0).round() as i64;
    Duration::try_milliseconds(millis).unwrap_or(Duration::MAX)
}

/// Allowed range for a channel's timeout, in hours (inclusive).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeoutBounds {
    pub min_hours: f64,
    pub max_hours: f64,
}

impl TimeoutBounds {
    pub fn check(&self, timeout_hours: f64) -> StorageResult<()> {
        if !timeout_hours.is_finite() || timeout_hours <= 0.0 {
            return Err(StorageError::Validation(format!(
                "timeout must be a positive number of hours, got {timeout_hours}"
            )));
        }
        if timeout_hours < self.min_hours || timeout_hours > self.max_hours {
            return Err(StorageError::Validation(format!(
                "timeout of {timeout_hours}h is outside the allowed range [{}, {}]",
                self.min_hours, self.max_hours
            )));
        }
        Ok(())
    }
}

/// A channel's retention policy and its scheduling state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelPolicy {
    pub channel_id: String,
    /// Messages older than this many hours are eligible for deletion.
    pub timeout_hours: f64,
    /// Last time a deletion happened in this channel.
    pub last_activity_at: DateTime<Utc>,
    /// Earliest time the scheduler should look at this channel again.
    pub next_check_at: DateTime<Utc>,
}

impl ChannelPolicy {
    /// Start tracking a channel.
    ///
    /// The new policy is due on the next pass and counts as active from `now`.
    pub fn create(
        channel_id: impl Into<String>,
        timeout_hours: f64,
        now: DateTime<Utc>,
        bounds: &TimeoutBounds,
    ) -> StorageResult<Self> {
        let channel_id = channel_id.into();
        if channel_id.is_empty() {
            return Err(StorageError::Validation(
                "channel_id cannot be empty".into(),
            ));
        }
        bounds.check(timeout_hours)?;

        Ok(Self {
            channel_id,
            timeout_hours,
            last_activity_at: now,
            next_check_at: now,
        })
    }

    pub fn timeout(&self) -> Duration {
        hours(self.timeout_hours)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_check_at < now
    }

    pub fn is_inactive(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        now - self.last_activity_at > threshold
    }
}
