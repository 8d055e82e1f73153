//! Service configuration, loaded from a TOML file.
//!
//! Each component has its own table. A component whose table is missing is
//! left out of the service entirely.
//!
//! ```toml
//! [manager]
//! load_timeout_ms = 10000
//!
//! [logging]
//! level = "info"
//!
//! [statistics-storage]
//!
//! [grpc-client-factory]
//! channel_count = 2
//! ```

use crate::grpc::ClientFactorySettings;
use crate::logging::LoggingConfig;
use crate::statistics::StatisticsConfig;
use component_framework::ManagerSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub manager: ManagerSettings,
    pub logging: Option<LoggingConfig>,
    #[serde(rename = "statistics-storage")]
    pub statistics_storage: Option<StatisticsConfig>,
    #[serde(rename = "grpc-client-factory")]
    pub grpc_client_factory: Option<ClientFactorySettings>,
}

impl ServiceConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading configuration");
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}
