//! Leveled logging with pluggable sinks
//!
//! `tracing` is the logging front end everywhere in rtcap. This module is the
//! back end used when log lines must reach device-style outputs: a bounded
//! registry of [`LogSink`]s, each filtering on its own minimum level, fed by
//! [`SinkLayer`] from the tracing subscriber stack.
//!
//! ```ignore
//! let registry = Arc::new(SinkRegistry::new(LogLevel::Debug));
//! registry.register(Arc::new(ConsoleSink::new(LogLevel::Info)))?;
//!
//! tracing_subscriber::registry()
//!     .with(SinkLayer::new(Arc::clone(&registry)))
//!     .init();
//! ```

mod layer;
mod registry;
mod sink;

pub use layer::SinkLayer;
pub use registry::{SinkRegistry, MAX_SINKS};
pub use sink::{ConsoleSink, FileSink, LogSink, MemorySink, SinkLevel};

use std::fmt;
use std::str::FromStr;

/// Log priority level, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl LogLevel {
    /// Single-letter tag used as the line prefix (`[D]`, `[I]`, ...)
    pub fn tag(self) -> &'static str {
        match self {
            LogLevel::Debug => "[D]",
            LogLevel::Info => "[I]",
            LogLevel::Warn => "[W]",
            LogLevel::Error => "[E]",
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

impl From<&tracing::Level> for LogLevel {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE | tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::WARN => LogLevel::Warn,
            tracing::Level::ERROR => LogLevel::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" | "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}
