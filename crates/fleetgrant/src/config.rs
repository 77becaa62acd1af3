//! Configuration loading and types

use std::path::{Path, PathBuf};

use fleetgrant_core::ReconcileConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration for the fleetgrant binary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
    /// Inventory service settings
    #[serde(default)]
    pub inventory: InventoryConfig,
    /// Exports file settings
    #[serde(default)]
    pub exports: ExportsConfig,
    /// Local command settings
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Reconciliation inputs
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error), overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON log lines
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Inventory service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Base URL of the query service
    #[serde(default = "default_inventory_url")]
    pub url: String,
    /// Request timeout in seconds
    #[serde(default = "default_inventory_timeout")]
    pub timeout_secs: u64,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            url: default_inventory_url(),
            timeout_secs: default_inventory_timeout(),
        }
    }
}

fn default_inventory_url() -> String {
    "http://localhost:8080/".to_string()
}

fn default_inventory_timeout() -> u64 {
    30
}

/// Where exports are written and how the export server is reloaded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportsConfig {
    /// Exports file owned by fleetgrant
    #[serde(default = "default_exports_path")]
    pub path: PathBuf,
    /// Command run after the file changes
    #[serde(default = "default_reload_command")]
    pub reload_command: String,
}

impl Default for ExportsConfig {
    fn default() -> Self {
        Self {
            path: default_exports_path(),
            reload_command: default_reload_command(),
        }
    }
}

fn default_exports_path() -> PathBuf {
    PathBuf::from("/etc/exports.d/fleetgrant.exports")
}

fn default_reload_command() -> String {
    "exportfs -ra".to_string()
}

/// Local command settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Timeout for each `psql` invocation and file edit, in seconds
    #[serde(default = "default_command_timeout")]
    pub timeout_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_command_timeout(),
        }
    }
}

fn default_command_timeout() -> u64 {
    60
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from default paths or use defaults
    ///
    /// # Errors
    /// Returns error if a config file exists but cannot be read or parsed
    pub fn load_default() -> eyre::Result<Self> {
        if let Ok(path) = std::env::var("FLEETGRANT_CONFIG") {
            return Self::load(Path::new(&path));
        }

        let mut paths = vec![
            PathBuf::from("fleetgrant.toml"),
            PathBuf::from("/etc/fleetgrant/fleetgrant.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("fleetgrant/fleetgrant.toml"));
        }

        for path in paths {
            if path.exists() {
                return Self::load(&path);
            }
        }

        tracing::warn!("no config file found, using defaults");
        Ok(Config::default())
    }
}
