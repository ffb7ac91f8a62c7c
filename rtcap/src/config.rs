//! Application configuration
//!
//! Read from TOML; every section and key is optional:
//!
//! ```toml
//! [pool]
//! thread_count = 4
//! queue_size = 20
//! default_timeout_ms = 100
//! low_power_mode = true
//!
//! [recorder]
//! buffer_len = 2048
//! sample_rate = 16000
//!
//! [logging]
//! level = "info"
//! file = "/var/log/rtcap.log"
//! ```

use crate::capture::RecorderConfig;
use crate::pool::ThreadPoolConfig;
use crate::Result;
use rtcap_common::config::{ConfigResolver, LoggingConfig};
use serde::Deserialize;
use std::path::Path;

/// Application name used for the platform config directory
pub const APP_NAME: &str = "rtcap";
/// Environment variable naming a config file
pub const CONFIG_ENV_VAR: &str = "RTCAP_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pool: ThreadPoolConfig,
    pub recorder: RecorderConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Resolve and load the config file, then validate every section
    ///
    /// Order: `cli_path`, then `RTCAP_CONFIG`, then the platform config
    /// directory, then built-in defaults.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let resolver = ConfigResolver::new(APP_NAME, CONFIG_ENV_VAR);
        let config: AppConfig = resolver.load(cli_path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from a TOML string and validate
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(content).map_err(rtcap_common::Error::Toml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.pool.validate()?;
        self.recorder.validate()?;
        self.logging.min_level()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os::ExecPriority;
    use crate::Error;

    #[test]
    fn test_empty_toml_is_default() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.pool, ThreadPoolConfig::default());
        assert_eq!(config.recorder, RecorderConfig::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_sections_override() {
        let config = AppConfig::from_toml(
            r#"
            [pool]
            thread_count = 6
            default_thread_priority = "above_normal"

            [recorder]
            buffer_len = 512

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.pool.thread_count, 6);
        assert_eq!(config.pool.default_thread_priority, ExecPriority::AboveNormal);
        assert_eq!(config.pool.queue_size, 20);
        assert_eq!(config.recorder.buffer_len, 512);
        assert_eq!(config.recorder.sample_rate, 16_000);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validation_errors() {
        let err = AppConfig::from_toml("[pool]\nthread_count = 0").unwrap_err();
        assert!(matches!(err, Error::Pool(_)));

        let err = AppConfig::from_toml("[recorder]\nbuffer_len = 7").unwrap_err();
        assert!(matches!(err, Error::Capture(_)));

        let err = AppConfig::from_toml("[logging]\nlevel = \"chatty\"").unwrap_err();
        assert!(matches!(err, Error::Common(_)));
    }

    #[test]
    #[serial_test::serial]
    fn test_load_from_env_var_then_cli_wins() {
        let dir = tempfile::tempdir().unwrap();
        let env_file = dir.path().join("env.toml");
        let cli_file = dir.path().join("cli.toml");
        std::fs::write(&env_file, "[pool]\nthread_count = 3").unwrap();
        std::fs::write(&cli_file, "[pool]\nthread_count = 5").unwrap();

        std::env::set_var(CONFIG_ENV_VAR, &env_file);
        let from_env = AppConfig::load(None);
        let from_cli = AppConfig::load(Some(cli_file.as_path()));
        std::env::remove_var(CONFIG_ENV_VAR);

        assert_eq!(from_env.unwrap().pool.thread_count, 3);
        assert_eq!(from_cli.unwrap().pool.thread_count, 5);
    }
}
