//! Configuration for the board adapter.
//!
//! # Example
//!
//! ```
//! use corkboard_engine::AdapterConfig;
//!
//! // Minimal config (uses defaults)
//! let config = AdapterConfig::default();
//! assert_eq!(config.debounce_ms, 300);
//!
//! // Loaded from TOML, unspecified fields keep their defaults
//! let config = AdapterConfig::from_toml_str(
//!     r#"
//!     database = "/srv/board/.beads/issues.db"
//!     debounce_ms = 100
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.debounce_ms, 100);
//! assert_eq!(config.publish_max_attempts, 5);
//! ```

use corkboard_core::errors::{BoardError, ErrorKind, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the board adapter.
///
/// All fields have defaults. Timing values are tunables, not contracts:
/// they trade write latency and reload sensitivity against file-system
/// churn on the host.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdapterConfig {
    /// Explicit backing file; when absent, discovery under `search_root`
    #[serde(default)]
    pub database: Option<PathBuf>,

    /// Directory searched for `.beads/*.db`
    #[serde(default = "default_search_root")]
    pub search_root: PathBuf,

    /// Quiet window before a scheduled save runs
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Window after a publish during which a changed mtime is attributed to self
    #[serde(default = "default_self_save_guard_ms")]
    pub self_save_guard_ms: u64,

    /// Lifetime of a cached board snapshot
    #[serde(default = "default_snapshot_ttl_ms")]
    pub snapshot_ttl_ms: u64,

    /// Bounded wait on an in-flight reload: interval times attempts is the cap
    #[serde(default = "default_reload_wait_interval_ms")]
    pub reload_wait_interval_ms: u64,
    #[serde(default = "default_reload_wait_max_attempts")]
    pub reload_wait_max_attempts: u32,

    /// Bounded wait on an in-flight save before a reload or dispose
    #[serde(default = "default_save_wait_ms")]
    pub save_wait_ms: u64,

    /// Rename attempts per publish, with exponential backoff between them
    #[serde(default = "default_publish_max_attempts")]
    pub publish_max_attempts: u32,
    #[serde(default = "default_publish_initial_backoff_ms")]
    pub publish_initial_backoff_ms: u64,
    #[serde(default = "default_publish_max_backoff_ms")]
    pub publish_max_backoff_ms: u64,

    /// Id prefix for new issues when the store does not name one
    #[serde(default = "default_issue_prefix")]
    pub issue_prefix: String,

    /// Actor recorded in the audit trail
    #[serde(default = "default_actor")]
    pub actor: String,
}

fn default_search_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_debounce_ms() -> u64 {
    300
}
fn default_self_save_guard_ms() -> u64 {
    2000
}
fn default_snapshot_ttl_ms() -> u64 {
    1000
}
fn default_reload_wait_interval_ms() -> u64 {
    50
}
fn default_reload_wait_max_attempts() -> u32 {
    400
}
fn default_save_wait_ms() -> u64 {
    10_000
}
fn default_publish_max_attempts() -> u32 {
    5
}
fn default_publish_initial_backoff_ms() -> u64 {
    25
}
fn default_publish_max_backoff_ms() -> u64 {
    1000
}
fn default_issue_prefix() -> String {
    "bd".to_string()
}
fn default_actor() -> String {
    "corkboard".to_string()
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            database: None,
            search_root: default_search_root(),
            debounce_ms: default_debounce_ms(),
            self_save_guard_ms: default_self_save_guard_ms(),
            snapshot_ttl_ms: default_snapshot_ttl_ms(),
            reload_wait_interval_ms: default_reload_wait_interval_ms(),
            reload_wait_max_attempts: default_reload_wait_max_attempts(),
            save_wait_ms: default_save_wait_ms(),
            publish_max_attempts: default_publish_max_attempts(),
            publish_initial_backoff_ms: default_publish_initial_backoff_ms(),
            publish_max_backoff_ms: default_publish_max_backoff_ms(),
            issue_prefix: default_issue_prefix(),
            actor: default_actor(),
        }
    }
}

impl AdapterConfig {
    /// Config pointing at an explicit backing file
    pub fn for_database(path: impl Into<PathBuf>) -> Self {
        Self {
            database: Some(path.into()),
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document
    ///
    /// # Errors
    /// `Config` on malformed TOML, unknown keys or invalid values.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).map_err(|e| {
            BoardError::new(ErrorKind::Config)
                .with_op("load_config")
                .with_message(e.to_string())
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// `Config` if the file cannot be read or its content is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let input = std::fs::read_to_string(path).map_err(|e| {
            BoardError::new(ErrorKind::Config)
                .with_op("load_config")
                .with_message(format!("cannot read config: {}", e))
        })?;
        Self::from_toml_str(&input)
    }

    /// Reject values that would disable a bounded wait or the publish loop
    ///
    /// # Errors
    /// `Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &str, reason: &str| {
            Err(BoardError::new(ErrorKind::Config)
                .with_op("validate_config")
                .with_message(format!("{}: {}", field, reason)))
        };

        if self.reload_wait_interval_ms == 0 {
            return invalid("reload_wait_interval_ms", "must be greater than zero");
        }
        if self.reload_wait_max_attempts == 0 {
            return invalid("reload_wait_max_attempts", "must be greater than zero");
        }
        if self.save_wait_ms == 0 {
            return invalid("save_wait_ms", "must be greater than zero");
        }
        if self.publish_max_attempts == 0 {
            return invalid("publish_max_attempts", "must be greater than zero");
        }
        if self.publish_max_backoff_ms < self.publish_initial_backoff_ms {
            return invalid(
                "publish_max_backoff_ms",
                "must not be lower than publish_initial_backoff_ms",
            );
        }
        if self.issue_prefix.trim().is_empty() {
            return invalid("issue_prefix", "must not be empty");
        }
        if self.actor.trim().is_empty() {
            return invalid("actor", "must not be empty");
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn self_save_guard(&self) -> Duration {
        Duration::from_millis(self.self_save_guard_ms)
    }

    pub fn snapshot_ttl(&self) -> Duration {
        Duration::from_millis(self.snapshot_ttl_ms)
    }

    /// Ceiling of the bounded wait on a reload
    pub fn reload_wait_cap(&self) -> Duration {
        Duration::from_millis(self.reload_wait_interval_ms)
            .saturating_mul(self.reload_wait_max_attempts)
    }

    pub fn save_wait(&self) -> Duration {
        Duration::from_millis(self.save_wait_ms)
    }
}
