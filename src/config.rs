use crate::core::{DbError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub schema: Option<SchemaConfig>,
    pub log: Option<LogConfig>,
}

/// Connection settings, consumed once when the connection is first opened.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub hostname: String,
    pub dbname: String,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
    /// Keep the connection open between calls
    #[serde(default = "default_persistent")]
    pub persistent: bool,
    pub busy_timeout_ms: Option<u64>,
    pub query_timeout_ms: Option<u64>,
}

fn default_persistent() -> bool {
    true
}

impl DatabaseConfig {
    /// Configuration for a private in-memory database.
    pub fn in_memory() -> Self {
        Self::for_path(":memory:")
    }

    /// Configuration for a database file on the local host.
    pub fn for_path(dbname: impl Into<String>) -> Self {
        DatabaseConfig {
            hostname: String::new(),
            dbname: dbname.into(),
            login: String::new(),
            password: String::new(),
            persistent: true,
            busy_timeout_ms: None,
            query_timeout_ms: None,
        }
    }

    /// Resolves the SQLite location: `dbname`, inside `hostname` when that
    /// names a directory rather than the local host.
    pub fn database_path(&self) -> String {
        let host = self.hostname.trim();
        if self.dbname == ":memory:" || host.is_empty() || host == "localhost" {
            self.dbname.clone()
        } else {
            Path::new(host).join(&self.dbname).to_string_lossy().into_owned()
        }
    }
}

/// Identifier allow-list settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    pub tables: Option<Vec<String>>,
}

/// Log sink settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    pub file: Option<PathBuf>,
}

impl Config {
    /// The configured table allow-list, if any.
    pub fn allowed_tables(&self) -> Option<&[String]> {
        self.schema.as_ref()?.tables.as_deref()
    }
}

/// Parses configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).map_err(|e| DbError::Config(e.to_string()))
}

/// Loads configuration from a TOML file at the given path.
///
/// # Arguments
///
/// * `path` - The file path to the TOML configuration file.
///
/// # Example
///
/// ```no_run
/// let config = thindb::config::load_config("config.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Default configuration location: `<config dir>/thindb/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("thindb").join("config.toml"))
}
