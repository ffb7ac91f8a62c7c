//! Common error types for rtcap

use thiserror::Error;

/// Common result type for rtcap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the rtcap crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML file could not be parsed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Log sink registration or output error
    #[error("Logging error: {0}")]
    Logging(String),
}
