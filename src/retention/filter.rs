//! Deciding which fetched messages may be deleted.

use chrono::{DateTime, Duration, Utc};

use super::codec::{CodecError, boundary_before};
use crate::models::{Message, Snowflake};

/// Id range of deletable messages for one channel at one instant.
///
/// A message is inside the window when `too_old < id < eligible_before`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityWindow {
    /// Boundary id for `now - timeout`. Messages at or after it are kept.
    pub eligible_before: Snowflake,
    /// Boundary id for `now - too_old_age`. Messages at or before it are
    /// beyond the bulk-delete age limit and are left alone.
    pub too_old: Snowflake,
}

impl EligibilityWindow {
    pub fn at(
        now: DateTime<Utc>,
        timeout: Duration,
        too_old_age: Duration,
    ) -> Result<Self, CodecError> {
        Ok(Self {
            eligible_before: boundary_before(now, timeout)?,
            too_old: boundary_before(now, too_old_age)?,
        })
    }

    /// Whether `message` may be deleted.
    pub fn admits(&self, message: &Message) -> bool {
        message.id < self.eligible_before
            && message.id > self.too_old
            && !message.pinned
            && !message.is_thread_starter()
    }
}

/// Keeps the deletable messages of `batch`, preserving their order.
pub fn filter_eligible(batch: Vec<Message>, window: &EligibilityWindow) -> Vec<Message> {
    batch.into_iter().filter(|m| window.admits(m)).collect()
}
