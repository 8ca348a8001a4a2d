//! Configuration loading and data folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the data folder
pub const DATA_FOLDER_ENV: &str = "CASA_DATA_FOLDER";

/// Contents of the optional TOML configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the reference dataset and the `models/` artifact directory
    #[serde(default)]
    pub data_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Logging section of the TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing directive when `RUST_LOG` is not set
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

fn default_log_level() -> String {
    "info".to_string()
}

/// Result-size limits for the batch endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Rows returned by the property listing when no `limit` is given
    pub listing_default: usize,
    /// Hard cap on rows returned by the property listing
    pub listing_cap: usize,
    /// Rows returned by the clustering listing when no `limit` is given
    pub clustering_default: usize,
    /// Hard cap on rows returned by the clustering listing
    pub clustering_cap: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            listing_default: 1000,
            listing_cap: 2000,
            clustering_default: 2000,
            clustering_cap: 3000,
        }
    }
}

impl LimitsConfig {
    /// Reject limits where the default exceeds the cap
    pub fn validate(&self) -> Result<()> {
        if self.listing_default > self.listing_cap {
            return Err(Error::Config(format!(
                "limits.listing_default ({}) exceeds limits.listing_cap ({})",
                self.listing_default, self.listing_cap
            )));
        }
        if self.clustering_default > self.clustering_cap {
            return Err(Error::Config(format!(
                "limits.clustering_default ({}) exceeds limits.clustering_cap ({})",
                self.clustering_default, self.clustering_cap
            )));
        }
        Ok(())
    }
}

/// Load the TOML configuration file
///
/// With an explicit path the file must exist. Without one, the platform
/// default location is tried and a missing file falls back to defaults.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => {
                warn!("No config file found, using defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    config.limits.validate()?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Platform config file location (`<config dir>/casa/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("casa").join("config.toml"))
}

/// Data folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default
pub fn resolve_data_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.data_folder {
        return path.clone();
    }

    default_data_folder()
}

/// OS-dependent default data folder
pub fn default_data_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/casa (or /var/lib/casa for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("casa"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/casa"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("casa"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/casa"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("casa"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\casa"))
    } else {
        PathBuf::from("./casa_data")
    }
}
