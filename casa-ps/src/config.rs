//! Service configuration resolved at startup

use casa_common::config::{LimitsConfig, TomlConfig};
use std::path::{Path, PathBuf};

use crate::query::ResultLimit;

/// Reference dataset file inside the data folder
pub const DATASET_FILE_NAME: &str = "unified_houses_madrid.csv";

/// Artifact directory inside the data folder
pub const MODELS_DIR: &str = "models";

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub data_folder: PathBuf,
    pub host: String,
    pub port: u16,
    pub limits: LimitsConfig,
    pub log_level: String,
}

impl ServiceConfig {
    pub fn new(data_folder: PathBuf, host: String, port: u16, toml: &TomlConfig) -> Self {
        Self {
            data_folder,
            host,
            port,
            limits: toml.limits,
            log_level: toml.logging.level.clone(),
        }
    }

    pub fn dataset_path(&self) -> PathBuf {
        dataset_path(&self.data_folder)
    }

    pub fn models_dir(&self) -> PathBuf {
        models_dir(&self.data_folder)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn listing_limit(&self) -> ResultLimit {
        listing_limit(&self.limits)
    }

    pub fn clustering_limit(&self) -> ResultLimit {
        clustering_limit(&self.limits)
    }
}

pub fn dataset_path(data_folder: &Path) -> PathBuf {
    data_folder.join(DATASET_FILE_NAME)
}

pub fn models_dir(data_folder: &Path) -> PathBuf {
    data_folder.join(MODELS_DIR)
}

pub fn listing_limit(limits: &LimitsConfig) -> ResultLimit {
    ResultLimit::new(limits.listing_default, limits.listing_cap)
}

pub fn clustering_limit(limits: &LimitsConfig) -> ResultLimit {
    ResultLimit::new(limits.clustering_default, limits.clustering_cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_and_limits() {
        let config = ServiceConfig::new(
            PathBuf::from("/srv/casa"),
            "0.0.0.0".to_string(),
            8080,
            &TomlConfig::default(),
        );
        assert_eq!(
            config.dataset_path(),
            PathBuf::from("/srv/casa/unified_houses_madrid.csv")
        );
        assert_eq!(config.models_dir(), PathBuf::from("/srv/casa/models"));
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.listing_limit(), ResultLimit::new(1000, 2000));
        assert_eq!(config.clustering_limit(), ResultLimit::new(2000, 3000));
        assert_eq!(config.log_level, "info");
    }
}
