//! Configuration module for the retention daemon.
//!
//! The daemon is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! [discord]
//! token = "${DISCORD_BOT_TOKEN}"
//!
//! [database]
//! path = "data/channels.db"
//!
//! [retention]
//! batch_size = 30
//! pass_interval_secs = 3
//! ```

mod database;
mod discord;
mod observability;
mod retention;

use std::{path::Path, sync::LazyLock};

pub use database::*;
pub use discord::*;
pub use observability::*;
pub use retention::*;
use serde::{Deserialize, Serialize};

/// Root configuration.
///
/// Only the `[discord]` section is mandatory; every other section falls back
/// to defaults that match a single-node deployment with a local SQLite file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HourglassConfig {
    /// Chat platform client configuration.
    pub discord: DiscordConfig,

    /// Properties store configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Retention scheduler configuration.
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Logging configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl HourglassConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;

        let config: HourglassConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&self) -> Result<(), ConfigError> {
        self.discord.validate()?;
        self.database.validate()?;
        self.retention.validate()?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

fn default_true() -> bool {
    true
}

static ENV_VAR_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

/// Expand environment variables in the format `${VAR_NAME}`.
/// Skips commented lines (lines where content before the variable is a comment).
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in ENV_VAR_PATTERN.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    // Remove trailing newline if input didn't have one
    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

/// Commented configuration written by `hourglass init`.
pub fn default_config_toml() -> &'static str {
    r#"# Hourglass retention daemon configuration

[discord]
# Bot token; sent as "Authorization: Bot <token>".
token = "${DISCORD_BOT_TOKEN}"
# api_base_url = "https://discord.com/api/v10"
# request_timeout_secs = 30

[database]
path = "data/channels.db"

[retention]
# Messages fetched per channel per pass (1-100).
batch_size = 30
# Channels with no deletions for this long stop being tracked.
inactivity_threshold_hours = 8760
# Allowed range for a channel's timeout.
min_timeout_hours = 0.15
max_timeout_hours = 720
# Discord refuses to bulk-delete messages older than 14 days.
too_old_to_delete_hours = 335
pass_interval_secs = 3

[observability.logging]
level = "info"
format = "compact"
# file = "data/log.txt"
"#
}
