//! Configuration file parsing and structures.
//!
//! The embedding application reads a single TOML file with a `[logging]` section and one
//! table per integration under `[integrations]`. A disabled integration is never connected.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;

/// Top-level configuration structure
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub integrations: IntegrationsConfig,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target levels, e.g. `"bluecurrent::engine" = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

/// Integration configuration container
#[derive(Debug, Default, Deserialize)]
pub struct IntegrationsConfig {
    #[serde(default)]
    pub blue_current: Option<BlueCurrentConfig>,
}

/// The card used to start sessions when the user did not pick one.
pub const DEFAULT_CARD: &str = "BCU_APP";

fn default_card() -> String {
    DEFAULT_CARD.to_string()
}

fn default_entry_id() -> String {
    crate::integrations::blue_current::DOMAIN.to_string()
}

fn default_true() -> bool {
    true
}

/// Configuration for the Blue Current integration.
///
/// This is also what the setup wizard produces, so it serializes back to the same TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BlueCurrentConfig {
    /// Whether the integration is started
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// API token of the Blue Current account
    pub api_token: String,

    /// Charge card uid used when starting sessions
    #[serde(default = "default_card")]
    pub card: String,

    /// Identifier grouping every entity this integration registers
    #[serde(default = "default_entry_id")]
    pub entry_id: String,
}

impl BlueCurrentConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            enabled: true,
            api_token: api_token.into(),
            card: default_card(),
            entry_id: default_entry_id(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        contents.parse()
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s).map_err(ConfigError::Parse)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
}
