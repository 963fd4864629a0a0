//! Per-channel state derivation after a scan.
//!
//! [`settle`] is pure: everything the platform told us about a channel during
//! a pass is folded into a [`ChannelScan`] first, so rescheduling and
//! eviction can be decided (and tested) without any I/O.

use chrono::{DateTime, Duration, Utc};

use crate::models::ChannelPolicy;

/// Creation time of the next message that will become eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upcoming {
    At(DateTime<Utc>),
    /// The channel has no message past the eligibility boundary.
    NoMessages,
    /// The lookup failed.
    Unknown,
}

/// What a pass learned about one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelScan {
    /// The platform reports the channel gone or inaccessible.
    Unreachable,
    /// At least one message was deleted.
    Deleted(usize),
    /// Nothing was deleted.
    Idle(Upcoming),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    Inactive,
    Unreachable,
}

impl EvictionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionReason::Inactive => "inactive",
            EvictionReason::Unreachable => "unreachable",
        }
    }
}

impl std::fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Reschedule(ChannelPolicy),
    Evict(EvictionReason),
}

/// Decide the next state of `policy` given what the pass at `now` found.
///
/// A rescheduled policy never has `next_check_at` earlier than `now`.
/// `t + timeout`, saturating at the latest representable time.
fn after(t: DateTime<Utc>, timeout: Duration) -> DateTime<Utc> {
    t.checked_add_signed(timeout)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub fn settle(
    policy: &ChannelPolicy,
    scan: ChannelScan,
    now: DateTime<Utc>,
    inactivity_threshold: Duration,
) -> Settlement {
    let mut updated = policy.clone();

    match scan {
        ChannelScan::Unreachable => return Settlement::Evict(EvictionReason::Unreachable),
        ChannelScan::Deleted(_) => {
            updated.last_activity_at = now;
            updated.next_check_at = now;
        }
        ChannelScan::Idle(Upcoming::At(created_at)) => {
            updated.next_check_at = after(created_at, policy.timeout()).max(now);
        }
        ChannelScan::Idle(Upcoming::NoMessages) => {
            updated.next_check_at = after(now, policy.timeout());
        }
        ChannelScan::Idle(Upcoming::Unknown) => {
            updated.next_check_at = now;
        }
    }

    if updated.is_inactive(now, inactivity_threshold) {
        return Settlement::Evict(EvictionReason::Inactive);
    }

    Settlement::Reschedule(updated)
}
