//! Configuration management.
//!
//! ArcBox configuration is loaded from multiple sources with the following priority:
//!
//! 1. Environment variables (ARCBOX_*)
//! 2. Configuration file (~/.config/arcbox/config.toml)
//! 3. Default values
//!
//! ## Example Configuration File
//!
//! ```toml
//! # ArcBox configuration file
//! data_dir = "~/.arcbox"
//!
//! [docker]
//! socket_path = "~/.arcbox/docker.sock"
//!
//! [usage]
//! # Object types reported when a request names none (empty = all).
//! default_types = ["container", "image", "volume"]
//!
//! [logging]
//! level = "info"
//! format = "text"
//! ```

use crate::usage::{Domain, UsageRequest};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// ArcBox configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory.
    pub data_dir: PathBuf,
    /// Docker API configuration.
    pub docker: DockerConfig,
    /// Disk usage reporting configuration.
    pub usage: UsageConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            docker: DockerConfig::default(),
            usage: UsageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from files and environment.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Environment variables (ARCBOX_*)
    /// 2. User config file (~/.config/arcbox/config.toml)
    /// 3. System config file (/etc/arcbox/config.toml)
    /// 4. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or names an
    /// unknown object type in `usage.default_types`.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(system_config_path()))
            .merge(Toml::file(user_config_path()))
            .merge(Env::prefixed("ARCBOX_").split("_"))
            .extract::<Self>()?
            .validated()
    }

    /// Loads configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or names an
    /// unknown object type in `usage.default_types`.
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("ARCBOX_").split("_"))
            .extract::<Self>()?
            .validated()
    }

    fn validated(self) -> Result<Self, figment::Error> {
        self.usage.validate()?;
        Ok(self)
    }

    /// Returns the path to the images directory.
    #[must_use]
    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join("images")
    }

    /// Returns the path to the containers directory.
    #[must_use]
    pub fn containers_dir(&self) -> PathBuf {
        self.data_dir.join("containers")
    }

    /// Returns the path to the volumes directory.
    #[must_use]
    pub fn volumes_dir(&self) -> PathBuf {
        self.data_dir.join("volumes")
    }

    /// Returns the path to the build cache directory.
    #[must_use]
    pub fn build_cache_dir(&self) -> PathBuf {
        self.data_dir.join("buildcache")
    }
}

/// Docker API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    /// Unix socket path for Docker API.
    pub socket_path: PathBuf,
    /// Enable Docker API.
    pub enabled: bool,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_docker_socket_path(),
            enabled: true,
        }
    }
}

fn default_docker_socket_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".arcbox")
        .join("docker.sock")
}

/// Disk usage reporting configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageConfig {
    /// Object types reported when a request does not name any.
    /// Empty means every known type.
    pub default_types: Vec<String>,
}

impl UsageConfig {
    /// Checks that every default type is a known object type.
    ///
    /// # Errors
    ///
    /// Returns the first unknown entry, in file order.
    pub fn validate(&self) -> Result<(), figment::Error> {
        for value in &self.default_types {
            value
                .parse::<Domain>()
                .map_err(|e| figment::Error::from(format!("usage.default_types: {e}")))?;
        }
        Ok(())
    }

    /// Applies the configured defaults to a request that names no types.
    #[must_use]
    pub fn apply_defaults(&self, request: UsageRequest) -> UsageRequest {
        if request.is_empty() && !self.default_types.is_empty() {
            UsageRequest::from_types(self.default_types.iter().cloned())
        } else {
            request
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log format (text, json).
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/var/lib"))
        .join(".arcbox")
}

fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("arcbox")
        .join("config.toml")
}

fn system_config_path() -> PathBuf {
    PathBuf::from("/etc/arcbox/config.toml")
}
