//! Bootstrap configuration loading
//!
//! Resolution priority for the config file:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. User config directory (`~/.config/crn/<module>.toml`)
//! 4. Built-in defaults (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "CRN_CONFIG";
/// Environment variable overriding `batch_secret`
pub const BATCH_SECRET_ENV_VAR: &str = "CRN_BATCH_SECRET";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// SQLite database file. Defaults to the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    /// Shared secret for batch triggers; batch routes are closed when unset
    #[serde(default)]
    pub batch_secret: Option<String>,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            bind_address: default_bind_address(),
            port: default_port(),
            logging: LoggingConfig::default(),
            batch: BatchConfig::default(),
            batch_secret: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Batch job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Record limit used when a trigger does not supply one
    #[serde(default = "default_batch_limit")]
    pub default_limit: usize,

    /// Rows fetched per store round-trip
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Property classes treated as residential (case-insensitive)
    #[serde(default = "default_residential_classes")]
    pub residential_classes: Vec<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_batch_limit(),
            page_size: default_page_size(),
            residential_classes: default_residential_classes(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5840
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_batch_limit() -> usize {
    500
}

fn default_page_size() -> usize {
    100
}

fn default_residential_classes() -> Vec<String> {
    vec!["2".to_string(), "RESIDENTIAL".to_string()]
}

impl TomlConfig {
    /// Database path, falling back to the platform data directory
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| default_data_folder().join("crn.db"))
    }

    /// Apply environment overrides that may hold secrets
    pub fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var(BATCH_SECRET_ENV_VAR) {
            if !secret.trim().is_empty() {
                self.batch_secret = Some(secret);
            }
        }
    }
}

/// Locate the config file for a module, if any exists
pub fn resolve_config_path(cli_arg: Option<&Path>, module_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }

    // Priority 3: User config directory
    dirs::config_dir()
        .map(|d| d.join("crn").join(format!("{}.toml", module_name)))
        .filter(|p| p.exists())
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Resolve and load configuration, falling back to defaults when no file exists
///
/// An explicitly named file (CLI or ENV) that cannot be read is an error; the
/// implicit user config location is best-effort.
pub fn load_config(cli_arg: Option<&Path>, module_name: &str) -> Result<TomlConfig> {
    let explicit = cli_arg.is_some() || std::env::var(CONFIG_ENV_VAR).is_ok();

    let mut config = match resolve_config_path(cli_arg, module_name) {
        Some(path) => match load_toml_config(&path) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) if explicit => return Err(e),
            Err(e) => {
                warn!("Ignoring unreadable config file: {}", e);
                TomlConfig::default()
            }
        },
        None => {
            info!("No config file found, using built-in defaults");
            TomlConfig::default()
        }
    };

    config.apply_env_overrides();
    Ok(config)
}

/// OS-dependent default data folder
fn default_data_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/crn (or /var/lib/crn for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("crn"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/crn"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("crn"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\crn"))
    } else {
        dirs::data_dir()
            .map(|d| d.join("crn"))
            .unwrap_or_else(|| PathBuf::from("./crn_data"))
    }
}
