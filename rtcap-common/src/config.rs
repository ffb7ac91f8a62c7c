//! Configuration file resolution and loading
//!
//! Resolution follows a fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config directory (`<config_dir>/<app>/config.toml`)
//! 4. Built-in defaults (no file)
//!
//! A missing file is never fatal: the caller gets defaults and a warning.
//! A file that exists but does not parse is an error.

use crate::logging::LogLevel;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where a resolved configuration path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine,
    Environment,
    PlatformDefault,
}

/// Resolves the configuration file path for one application
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    app_name: String,
    env_var: String,
}

impl ConfigResolver {
    /// Create a resolver for `app_name`, honouring `env_var` as an override
    pub fn new(app_name: impl Into<String>, env_var: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            env_var: env_var.into(),
        }
    }

    /// Resolve the config path, or `None` when only built-in defaults apply
    ///
    /// Command-line and environment paths are returned even if the file does
    /// not exist, so the loader can warn about them. The platform default is
    /// only returned when the file is present.
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Option<(PathBuf, ConfigSource)> {
        if let Some(path) = cli_arg {
            return Some((path.to_path_buf(), ConfigSource::CommandLine));
        }

        if let Ok(path) = std::env::var(&self.env_var) {
            if !path.is_empty() {
                return Some((PathBuf::from(path), ConfigSource::Environment));
            }
        }

        self.platform_default()
            .filter(|path| path.exists())
            .map(|path| (path, ConfigSource::PlatformDefault))
    }

    /// Platform config file location (`~/.config/<app>/config.toml` on Linux)
    pub fn platform_default(&self) -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(&self.app_name).join("config.toml"))
    }

    /// Resolve and load the configuration, falling back to `T::default()`
    pub fn load<T>(&self, cli_arg: Option<&Path>) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        match self.resolve(cli_arg) {
            Some((path, source)) => {
                debug!("Config path {} (from {:?})", path.display(), source);
                load_toml_or_default(&path)
            }
            None => {
                info!("No config file found for {}, using built-in defaults", self.app_name);
                Ok(T::default())
            }
        }
    }
}

/// Load a TOML file into `T`; a missing file yields `T::default()`
pub fn load_toml_or_default<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        warn!("Config file {} not found, using defaults", path.display());
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Logging configuration (`[logging]` section)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Global minimum level (debug, info, warn, error)
    pub level: String,

    /// Optional log file; when set a file sink is registered
    pub file: Option<PathBuf>,

    /// Mirror log lines to stderr through the console sink
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            console: true,
        }
    }
}

impl LoggingConfig {
    /// Parse the configured level
    pub fn min_level(&self) -> Result<LogLevel> {
        self.level
            .parse()
            .map_err(|_| Error::Config(format!("Invalid log level '{}'", self.level)))
    }
}
