//! Configuration for pgdrift.
//!
//! Looks for `.config/pgdrift.styx` in the current directory or any parent
//! directory:
//!
//! ```styx
//! instances {
//!     prod {
//!         host db.internal
//!         user drift
//!         database app
//!     }
//!     staging {
//!         host staging-db.internal
//!         port 6432
//!         user drift
//!         database app
//!     }
//! }
//! filter {
//!     include-functions false
//!     name-pattern "order*"
//! }
//! ```

use facet::Facet;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Location of the config file, relative to a project root.
pub const CONFIG_PATH: &str = ".config/pgdrift.styx";

const DEFAULT_PORT: u16 = 5432;
const DEFAULT_POOL_SIZE: usize = 4;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Facet)]
pub struct Config {
    /// Database instances, by name. Comparisons refer to instances by these names.
    #[facet(default)]
    pub instances: IndexMap<String, Instance>,

    /// Default comparison filter.
    #[facet(default)]
    pub filter: FilterConfig,
}

/// Connection settings for one server instance.
#[derive(Debug, Clone, Facet)]
#[facet(rename_all = "kebab-case")]
pub struct Instance {
    pub host: String,
    #[facet(default)]
    pub port: Option<u16>,
    pub user: String,
    #[facet(default)]
    pub password: Option<String>,
    /// The instance's home database, reachable through the pool.
    pub database: String,
    #[facet(default)]
    pub pool_size: Option<usize>,
}

impl Instance {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size.unwrap_or(DEFAULT_POOL_SIZE)
    }
}

/// Which object kinds take part in a comparison.
///
/// Every toggle left out is treated as enabled.
#[derive(Debug, Clone, Default, PartialEq, Facet)]
#[facet(rename_all = "kebab-case")]
pub struct FilterConfig {
    #[facet(default)]
    pub include_tables: Option<bool>,
    #[facet(default)]
    pub include_views: Option<bool>,
    #[facet(default)]
    pub include_functions: Option<bool>,
    #[facet(default)]
    pub include_sequences: Option<bool>,
    #[facet(default)]
    pub include_types: Option<bool>,
    #[facet(default)]
    pub include_extensions: Option<bool>,
    #[facet(default)]
    pub include_columns: Option<bool>,
    #[facet(default)]
    pub include_primary_keys: Option<bool>,
    #[facet(default)]
    pub include_foreign_keys: Option<bool>,
    #[facet(default)]
    pub include_unique_constraints: Option<bool>,
    #[facet(default)]
    pub include_check_constraints: Option<bool>,
    #[facet(default)]
    pub include_indexes: Option<bool>,
    #[facet(default)]
    pub include_triggers: Option<bool>,
    /// Glob (`order*`) or `regex:`-prefixed pattern applied to table and view names.
    #[facet(default)]
    pub name_pattern: Option<String>,
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no .config/pgdrift.styx found in current directory or any parent")]
    NotFound,

    #[error("failed to read {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },

    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
}

/// Load configuration from `.config/pgdrift.styx`, searching up the directory tree.
pub fn load() -> Result<(Config, PathBuf), ConfigError> {
    let cwd = std::env::current_dir().map_err(|e| ConfigError::Io {
        path: PathBuf::from("."),
        message: e.to_string(),
    })?;
    load_from(&cwd)
}

/// Load configuration starting from a specific directory.
pub fn load_from(start: &Path) -> Result<(Config, PathBuf), ConfigError> {
    let config_path = find_config_file(start)?;
    let content = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
        path: config_path.clone(),
        message: e.to_string(),
    })?;

    let config = parse(&content).map_err(|message| ConfigError::Parse {
        path: config_path.clone(),
        message,
    })?;

    Ok((config, config_path))
}

/// Parse configuration text.
pub fn parse(content: &str) -> Result<Config, String> {
    facet_styx::from_str(content).map_err(|e| e.to_string())
}

/// Find `.config/pgdrift.styx` by searching up the directory tree.
fn find_config_file(start: &Path) -> Result<PathBuf, ConfigError> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_PATH);
        if config_path.exists() {
            return Ok(config_path);
        }

        if !current.pop() {
            return Err(ConfigError::NotFound);
        }
    }
}
