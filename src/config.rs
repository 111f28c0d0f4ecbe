//! Task store configuration.
//!
//! Configuration can be loaded from:
//! 1. TOML file (`orion-tasks.toml`)
//! 2. Environment variables (with `ORION_TASKS_` prefix)
//!
//! Environment variables override TOML configuration.
//!
//! # Example TOML Configuration
//!
//! ```toml
//! [tasks]
//! root_dir = "/var/lib/orion/tasks"
//! sync_writes = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file looked up by [`StoreConfig::load`].
pub const DEFAULT_CONFIG_FILE: &str = "orion-tasks.toml";

/// Configuration for the durable [`FileTaskStore`](crate::store::file::FileTaskStore).
///
/// # Defaults
///
/// | Setting       | Default   | Description                                   |
/// |---------------|-----------|-----------------------------------------------|
/// | `root_dir`    | `./tasks` | Directory holding one sub-directory per owner |
/// | `sync_writes` | `true`    | `fsync` each record before publishing it      |
///
/// # Examples
///
/// ```
/// use orion_tasks::StoreConfig;
///
/// let config = StoreConfig::default()
///     .with_root_dir("/tmp/orion-tasks")
///     .with_sync_writes(false);
/// assert_eq!(config.root_dir.to_str(), Some("/tmp/orion-tasks"));
/// assert!(!config.sync_writes);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory of the durable store.
    pub root_dir: PathBuf,

    /// Flush record contents to disk before the atomic rename.
    ///
    /// Without it a power loss can publish an empty file under the final
    /// name. Disable only for tests and scratch stores.
    pub sync_writes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("./tasks"),
            sync_writes: true,
        }
    }
}

impl StoreConfig {
    /// Sets the root directory.
    pub fn with_root_dir(mut self, root_dir: impl Into<PathBuf>) -> Self {
        self.root_dir = root_dir.into();
        self
    }

    /// Sets whether writes are flushed before publishing.
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    /// Load configuration from file and environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. [`DEFAULT_CONFIG_FILE`] in the working directory
    /// 3. Default values
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = if let Ok(contents) = std::fs::read_to_string(DEFAULT_CONFIG_FILE) {
            Self::from_toml(&contents)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply environment
    /// overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        let mut config = Self::from_toml(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from TOML content.
    ///
    /// Settings are read from the `[tasks]` table; a document without one
    /// yields the defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        #[derive(Deserialize)]
        struct FullConfig {
            #[serde(default)]
            tasks: StoreConfig,
        }

        let full: FullConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(full.tasks)
    }

    /// Returns the defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("ORION_TASKS_ROOT") {
            if !root.is_empty() {
                self.root_dir = PathBuf::from(root);
            }
        }

        if let Ok(sync) = std::env::var("ORION_TASKS_SYNC_WRITES") {
            if let Ok(v) = sync.parse() {
                self.sync_writes = v;
            } else {
                tracing::warn!(value = %sync, "ignoring unparsable ORION_TASKS_SYNC_WRITES");
            }
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("Failed to read config file {path}: {error}")]
    Io {
        /// Path to the config file.
        path: String,
        /// Error message.
        error: String,
    },

    /// Parse error in config file.
    #[error("Failed to parse config: {0}")]
    Parse(String),
}
