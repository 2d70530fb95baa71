//! Configuration loading and root folder resolution
//!
//! Resolution follows a fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable config file never stops a service from starting;
//! it logs a warning and runs on defaults.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the data root folder
pub const ROOT_FOLDER_ENV: &str = "PATAK_ROOT_FOLDER";

/// Live stream and liveness settings (`[live]` table)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Readings older than this are swept from the live log
    pub retention_secs: u64,
    /// How often the sweep runs
    pub sweep_interval_secs: u64,
    /// A house is online when its last reading is younger than this
    pub online_window_secs: u64,
    /// Per-subscriber event buffer; a full buffer drops the subscriber
    pub subscriber_buffer: usize,
    /// SSE keep-alive comment interval
    pub keep_alive_secs: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            retention_secs: 30,
            sweep_interval_secs: 5,
            online_window_secs: 300,
            subscriber_buffer: 64,
            keep_alive_secs: 15,
        }
    }
}

/// Billing history settings (`[billing]` table)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    /// Periods shown by the web dashboard
    pub web_cycles: usize,
    /// Periods shown by the mobile app
    pub mobile_cycles: usize,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            web_cycles: 2,
            mobile_cycles: 12,
        }
    }
}

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_addr: String,
    pub port: u16,
    /// Database file name inside the root folder
    pub database_file: String,
    pub log_level: String,
    pub live: LiveConfig,
    pub billing: BillingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_addr: "0.0.0.0".to_string(),
            port: 4000,
            database_file: "patak.db".to_string(),
            log_level: "info".to_string(),
            live: LiveConfig::default(),
            billing: BillingConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Parse config text and validate it
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: TomlConfig =
            toml::from_str(text).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the services cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.live.retention_secs == 0 {
            return Err(Error::Config("live.retention_secs must be positive".to_string()));
        }
        if self.live.sweep_interval_secs == 0 {
            return Err(Error::Config("live.sweep_interval_secs must be positive".to_string()));
        }
        if self.live.subscriber_buffer == 0 {
            return Err(Error::Config("live.subscriber_buffer must be positive".to_string()));
        }
        if self.billing.web_cycles == 0 || self.billing.mobile_cycles == 0 {
            return Err(Error::Config("billing cycle counts must be positive".to_string()));
        }
        if self.database_file.trim().is_empty() {
            return Err(Error::Config("database_file must not be empty".to_string()));
        }
        Ok(())
    }

    /// Database location under a resolved root folder
    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        root_folder.join(&self.database_file)
    }
}

/// Load configuration, degrading to defaults on any problem
///
/// `explicit` is a path given on the command line; otherwise the platform
/// config locations are searched.
pub fn load_config(explicit: Option<&Path>) -> TomlConfig {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match find_config_file() {
            Ok(path) => path,
            Err(e) => {
                info!("No config file loaded ({}), using defaults", e);
                return TomlConfig::default();
            }
        },
    };

    match std::fs::read_to_string(&path) {
        Ok(text) => match TomlConfig::from_toml_str(&text) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Ignoring config file {}: {}", path.display(), e);
                TomlConfig::default()
            }
        },
        Err(e) => {
            warn!("Could not read config file {}: {}", path.display(), e);
            TomlConfig::default()
        }
    }
}

/// Root folder resolution in priority order (CLI, env, TOML, default)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config: &TomlConfig,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Get default configuration file path for the platform
fn find_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("patak").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/patak/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/patak (or /var/lib/patak for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("patak"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/patak"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("patak"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/patak"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("patak"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\patak"))
    } else {
        PathBuf::from("./patak_data")
    }
}
