//! Retention scheduler configuration.
//!
//! # Example
//!
//! ```toml
//! [retention]
//! batch_size = 30
//! inactivity_threshold_hours = 8760
//! min_timeout_hours = 0.15
//! max_timeout_hours = 720
//! too_old_to_delete_hours = 335
//! pass_interval_secs = 3
//! ```

use serde::{Deserialize, Serialize};

use super::{ConfigError, default_true};
use crate::models::{TimeoutBounds, hours};

/// Retention scheduler configuration.
///
/// All hour values are fractional hours.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    /// Maximum number of messages fetched per channel per pass.
    /// The platform caps a single page at 100.
    /// Default: 30
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// A channel with no deletions for longer than this is dropped from the store.
    /// Default: 8760 (one year)
    #[serde(default = "default_inactivity_threshold_hours")]
    pub inactivity_threshold_hours: f64,

    /// Smallest timeout a channel may be configured with.
    /// Default: 0.15 (nine minutes)
    #[serde(default = "default_min_timeout_hours")]
    pub min_timeout_hours: f64,

    /// Largest timeout a channel may be configured with.
    /// Default: 720 (thirty days)
    #[serde(default = "default_max_timeout_hours")]
    pub max_timeout_hours: f64,

    /// Messages older than this are never submitted for deletion.
    /// Bulk deletion is refused by the platform for messages older than 14 days.
    /// Default: 335
    #[serde(default = "default_too_old_to_delete_hours")]
    pub too_old_to_delete_hours: f64,

    /// Seconds to sleep between passes.
    /// Default: 3
    #[serde(default = "default_pass_interval_secs")]
    pub pass_interval_secs: u64,

    /// Maximum number of channels processed concurrently within a pass.
    /// Default: 8
    #[serde(default = "default_max_concurrent_channels")]
    pub max_concurrent_channels: usize,

    /// Delete threads hanging off deleted messages.
    /// Default: true
    #[serde(default = "default_true")]
    pub delete_threads: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            inactivity_threshold_hours: default_inactivity_threshold_hours(),
            min_timeout_hours: default_min_timeout_hours(),
            max_timeout_hours: default_max_timeout_hours(),
            too_old_to_delete_hours: default_too_old_to_delete_hours(),
            pass_interval_secs: default_pass_interval_secs(),
            max_concurrent_channels: default_max_concurrent_channels(),
            delete_threads: true,
        }
    }
}

impl RetentionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.batch_size) {
            return Err(ConfigError::Validation(format!(
                "retention.batch_size must be between 1 and 100, got {}",
                self.batch_size
            )));
        }

        for (name, value) in [
            ("inactivity_threshold_hours", self.inactivity_threshold_hours),
            ("min_timeout_hours", self.min_timeout_hours),
            ("max_timeout_hours", self.max_timeout_hours),
            ("too_old_to_delete_hours", self.too_old_to_delete_hours),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "retention.{name} must be a positive number of hours, got {value}"
                )));
            }
        }

        if self.min_timeout_hours > self.max_timeout_hours {
            return Err(ConfigError::Validation(format!(
                "retention.min_timeout_hours ({}) cannot exceed max_timeout_hours ({})",
                self.min_timeout_hours, self.max_timeout_hours
            )));
        }

        if self.pass_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "retention.pass_interval_secs must be greater than 0".into(),
            ));
        }

        if self.max_concurrent_channels == 0 {
            return Err(ConfigError::Validation(
                "retention.max_concurrent_channels must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Sleep between passes.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.pass_interval_secs)
    }

    pub fn inactivity_threshold(&self) -> chrono::Duration {
        hours(self.inactivity_threshold_hours)
    }

    pub fn too_old_to_delete(&self) -> chrono::Duration {
        hours(self.too_old_to_delete_hours)
    }

    /// Bounds applied when a channel's timeout is configured.
    pub fn timeout_bounds(&self) -> TimeoutBounds {
        TimeoutBounds {
            min_hours: self.min_timeout_hours,
            max_hours: self.max_timeout_hours,
        }
    }
}

fn default_batch_size() -> u32 {
    30
}

fn default_inactivity_threshold_hours() -> f64 {
    8760.0 // one year
}

fn default_min_timeout_hours() -> f64 {
    0.15
}

fn default_max_timeout_hours() -> f64 {
    720.0 // 30 days
}

fn default_too_old_to_delete_hours() -> f64 {
    335.0
}

fn default_pass_interval_secs() -> u64 {
    3
}

fn default_max_concurrent_channels() -> usize {
    8
}
