//! Configuration types for the Strata metabase
//!
//! Configuration is read from an optional TOML file and layered with
//! `STRATA__SECTION__KEY` environment variables.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "STRATA";

/// Root configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Node configuration
    pub node: NodeConfig,
    /// Metabase configuration
    pub metabase: MetabaseConfig,
    /// Logging configuration
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from `path` (if it exists) and the environment
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path).required(false))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| Error::Configuration(format!("{}: {e}", path.display())))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| Error::Configuration(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        self.metabase.validate()?;
        if self.metabase.db_file.as_os_str().is_empty() {
            return Err(Error::Configuration(
                "metabase.db_file must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Full path of the metabase database file
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.node.data_dir.join(&self.metabase.db_file)
    }
}

/// Node identity configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node name (human-readable identifier)
    pub name: String,
    /// Data directory for the metabase file
    pub data_dir: PathBuf,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "strata-meta".to_string(),
            data_dir: PathBuf::from("/var/lib/strata"),
        }
    }
}

/// Metabase engine configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MetabaseConfig {
    /// Database file name, relative to the data directory
    pub db_file: PathBuf,
    /// How concurrent uploads to one location are treated
    pub pending_object_policy: PendingObjectPolicy,
    /// Upper bound applied to positive listing limits
    pub max_list_limit: usize,
    /// Durability of write transactions
    pub durability: Durability,
}

impl Default for MetabaseConfig {
    fn default() -> Self {
        Self {
            db_file: PathBuf::from("metabase.redb"),
            pending_object_policy: PendingObjectPolicy::SinglePending,
            max_list_limit: 10_000,
            durability: Durability::Immediate,
        }
    }
}

impl MetabaseConfig {
    /// Check the engine settings
    ///
    /// A zero `max_list_limit` would turn every bounded listing into an
    /// empty page with `more` set.
    pub fn validate(&self) -> Result<()> {
        if self.max_list_limit == 0 {
            return Err(Error::Configuration(
                "metabase.max_list_limit must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Policy for `begin_object_next_version` when an upload is already pending
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingObjectPolicy {
    /// At most one pending object per location; a second begin conflicts
    #[default]
    SinglePending,
    /// Every begin gets its own version, the last commit wins
    MultiplePending,
}

/// Write transaction durability
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    /// Fsync on every commit
    #[default]
    Immediate,
    /// Persisted by a later immediate commit or clean shutdown
    Eventual,
    /// Never fsynced (tests only)
    None,
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
