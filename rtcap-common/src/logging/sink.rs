//! Log sink trait and the built-in sinks

use super::LogLevel;
use crate::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};

/// A log output destination with its own minimum level
///
/// Implementations use interior mutability: sinks are shared as
/// `Arc<dyn LogSink>` between the registry and their owner.
pub trait LogSink: Send + Sync {
    /// Short name for diagnostics
    fn name(&self) -> &str;

    /// Write one already formatted line (no trailing newline)
    fn log(&self, level: LogLevel, message: &str) -> Result<()>;

    /// Change this sink's minimum level
    fn set_level(&self, level: LogLevel);

    /// Current minimum level
    fn level(&self) -> LogLevel;

    /// Release the underlying output; later writes are ignored
    fn close(&self);

    /// Whether a message at `level` passes this sink's filter
    fn should_log(&self, level: LogLevel) -> bool {
        level >= self.level()
    }
}

/// Atomic minimum-level cell shared by the built-in sinks
#[derive(Debug)]
pub struct SinkLevel(AtomicU8);

impl SinkLevel {
    pub fn new(level: LogLevel) -> Self {
        Self(AtomicU8::new(level as u8))
    }

    pub fn get(&self) -> LogLevel {
        LogLevel::from_u8(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, level: LogLevel) {
        self.0.store(level as u8, Ordering::Relaxed);
    }
}

/// Writes lines to stderr
pub struct ConsoleSink {
    level: SinkLevel,
    closed: AtomicBool,
}

impl ConsoleSink {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level: SinkLevel::new(level),
            closed: AtomicBool::new(false),
        }
    }
}

impl LogSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn log(&self, _level: LogLevel, message: &str) -> Result<()> {
        if self.closed.load(Ordering::Relaxed) {
            return Ok(());
        }
        let stderr = std::io::stderr();
        let mut out = stderr.lock();
        writeln!(out, "{}", message)?;
        Ok(())
    }

    fn set_level(&self, level: LogLevel) {
        self.level.set(level);
    }

    fn level(&self) -> LogLevel {
        self.level.get()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}

/// Appends timestamped lines to a file
pub struct FileSink {
    level: SinkLevel,
    file: Mutex<Option<File>>,
}

impl FileSink {
    /// Open (or create) `path` for appending
    pub fn open(path: impl AsRef<Path>, level: LogLevel) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::Logging(format!("cannot open {}: {}", path.display(), e)))?;

        Ok(Self {
            level: SinkLevel::new(level),
            file: Mutex::new(Some(file)),
        })
    }
}

impl LogSink for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    fn log(&self, _level: LogLevel, message: &str) -> Result<()> {
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(file) = guard.as_mut() {
            let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            writeln!(file, "{} {}", stamp, message)?;
        }
        Ok(())
    }

    fn set_level(&self, level: LogLevel) {
        self.level.set(level);
    }

    fn level(&self) -> LogLevel {
        self.level.get()
    }

    fn close(&self) {
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut file) = guard.take() {
            let _ = file.flush();
        }
    }
}

/// Keeps lines in memory; used by tests and diagnostics
pub struct MemorySink {
    level: SinkLevel,
    lines: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl MemorySink {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level: SinkLevel::new(level),
            lines: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// All captured lines, oldest first
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

impl LogSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn log(&self, _level: LogLevel, message: &str) -> Result<()> {
        if !self.is_closed() {
            self.lines
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(message.to_string());
        }
        Ok(())
    }

    fn set_level(&self, level: LogLevel) {
        self.level.set(level);
    }

    fn level(&self) -> LogLevel {
        self.level.get()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}
