use serde::{Deserialize, Serialize};

use super::{ConfigError, default_true};

/// Properties store configuration.
///
/// The store holds one row per tracked channel: its retention timeout,
/// last activity time and next scheduled check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    /// Use `:memory:` for an in-memory database (testing only).
    #[serde(default = "default_path")]
    pub path: String,

    /// Create the database file if it doesn't exist.
    #[serde(default = "default_true")]
    pub create_if_missing: bool,

    /// Run migrations on startup.
    #[serde(default = "default_true")]
    pub run_migrations: bool,

    /// Enable WAL mode for better concurrency.
    #[serde(default = "default_true")]
    pub wal_mode: bool,

    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,

    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            create_if_missing: true,
            run_migrations: true,
            wal_mode: true,
            busy_timeout_ms: default_busy_timeout(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.is_empty() {
            return Err(ConfigError::Validation(
                "SQLite path cannot be empty".into(),
            ));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn is_memory(&self) -> bool {
        self.path == ":memory:"
    }
}

fn default_path() -> String {
    "data/channels.db".to_string()
}

fn default_busy_timeout() -> u64 {
    5000 // 5 seconds
}

fn default_max_connections() -> u32 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: DatabaseConfig = toml::from_str("").unwrap();
        assert_eq!(config.path, "data/channels.db");
        assert!(config.wal_mode);
        assert!(config.run_migrations);
        assert_eq!(config.busy_timeout_ms, 5000);
        assert_eq!(config.max_connections, 5);
        assert!(!config.is_memory());
    }

    #[test]
    fn test_empty_path_rejected() {
        let config: DatabaseConfig = toml::from_str(r#"path = """#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_connections_rejected() {
        let config: DatabaseConfig = toml::from_str("max_connections = 0").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_connections"), "{err}");
    }
}
