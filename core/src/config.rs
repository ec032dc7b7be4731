//! Configuration for the core crate
//!
//! This module provides configuration options for the revision engine,
//! including naming limits, the join window and the version-bump policy.

use std::time::Duration;
use serde::{Serialize, Deserialize};

use crate::error::{to_config_error, Result};

/// Fully qualified name configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FqnConfig {
    /// Maximum length of a single name segment
    pub max_name_length: usize,

    /// Separator between name segments
    pub separator: char,
}

impl Default for FqnConfig {
    fn default() -> Self {
        FqnConfig {
            max_name_length: 64,
            separator: '.',
        }
    }
}

/// Join-count window configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinWindowConfig {
    /// Width of the trailing window in days, today included
    pub window_days: u32,
}

impl Default for JoinWindowConfig {
    fn default() -> Self {
        JoinWindowConfig { window_days: 30 }
    }
}

/// Which structural changes force a major version bump.
///
/// Column removal and column type changes are always major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierPolicy {
    /// Adding a column is a major update
    pub column_addition_is_major: bool,

    /// Adding or removing table constraints is a major update
    pub table_constraint_presence_is_major: bool,
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        ClassifierPolicy {
            column_addition_is_major: true,
            table_constraint_presence_is_major: true,
        }
    }
}

impl ClassifierPolicy {
    /// Treat additions as backward compatible; only removals and retypes are major
    pub fn additive_compatible() -> Self {
        ClassifierPolicy {
            column_addition_is_major: false,
            table_constraint_presence_is_major: false,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Naming rules
    pub fqn: FqnConfig,

    /// Join aggregation window
    pub joins: JoinWindowConfig,

    /// Version-bump policy
    pub classifier: ClassifierPolicy,

    /// Writes slower than this are logged at warn level
    pub slow_write_threshold: Duration,

    /// Log level
    pub log_level: String,

    /// Whether to enable debug mode
    pub debug_mode: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            fqn: FqnConfig::default(),
            joins: JoinWindowConfig::default(),
            classifier: ClassifierPolicy::default(),
            slow_write_threshold: Duration::from_millis(250),
            log_level: "info".to_string(),
            debug_mode: false,
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: &str) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config: EngineConfig = serde_json::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn to_file(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.fqn.max_name_length == 0 {
            return Err(to_config_error("max_name_length must be positive"));
        }
        if self.joins.window_days == 0 {
            return Err(to_config_error("join window must cover at least one day"));
        }
        Ok(())
    }

    /// Create a development configuration
    pub fn development() -> Self {
        let mut config = Self::default();
        config.debug_mode = true;
        config.log_level = "debug".to_string();
        config
    }

    /// Create a production configuration
    pub fn production() -> Self {
        let mut config = Self::default();
        config.debug_mode = false;
        config.log_level = "info".to_string();
        config
    }

    /// Create a testing configuration
    pub fn testing() -> Self {
        let mut config = Self::default();
        config.debug_mode = true;
        config.log_level = "debug".to_string();
        config.slow_write_threshold = Duration::from_secs(5);
        config
    }
}
