//! Bounded sink registry with a global minimum level

use super::{LogLevel, LogSink};
use crate::{Error, Result};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Maximum number of sinks a registry accepts
pub const MAX_SINKS: usize = 4;

/// Fans each log line out to the registered sinks
///
/// Lines below the global minimum level are dropped before any sink sees
/// them. Each sink then applies its own level filter. Output order across
/// sinks follows registration order, and the registry lock is held for the
/// whole fan-out so concurrent lines never interleave within a sink.
pub struct SinkRegistry {
    min_level: AtomicU8,
    sinks: Mutex<Vec<Arc<dyn LogSink>>>,
    write_failures: AtomicU64,
}

impl SinkRegistry {
    pub fn new(min_level: LogLevel) -> Self {
        Self {
            min_level: AtomicU8::new(min_level as u8),
            sinks: Mutex::new(Vec::with_capacity(MAX_SINKS)),
            write_failures: AtomicU64::new(0),
        }
    }

    fn sinks(&self) -> MutexGuard<'_, Vec<Arc<dyn LogSink>>> {
        self.sinks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a sink
    ///
    /// Registering a sink that is already present succeeds without adding a
    /// second entry. Fails once [`MAX_SINKS`] sinks are registered.
    pub fn register(&self, sink: Arc<dyn LogSink>) -> Result<()> {
        let mut sinks = self.sinks();

        if sinks.iter().any(|s| same_sink(s, &sink)) {
            return Ok(());
        }

        if sinks.len() >= MAX_SINKS {
            return Err(Error::Logging(format!(
                "sink registry full ({} sinks), cannot add '{}'",
                MAX_SINKS,
                sink.name()
            )));
        }

        sinks.push(sink);
        Ok(())
    }

    /// Remove a sink; later sinks keep their relative order
    ///
    /// Returns false if the sink was not registered.
    pub fn unregister(&self, sink: &Arc<dyn LogSink>) -> bool {
        let mut sinks = self.sinks();
        match sinks.iter().position(|s| same_sink(s, sink)) {
            Some(index) => {
                sinks.remove(index);
                true
            }
            None => false,
        }
    }

    /// Close every registered sink and empty the registry
    pub fn close_all(&self) {
        let drained: Vec<_> = self.sinks().drain(..).collect();
        for sink in drained {
            sink.close();
        }
    }

    pub fn sink_count(&self) -> usize {
        self.sinks().len()
    }

    pub fn set_min_level(&self, level: LogLevel) {
        self.min_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn min_level(&self) -> LogLevel {
        LogLevel::from_u8(self.min_level.load(Ordering::Relaxed))
    }

    /// Lines a sink failed to write
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    /// Format `text` with the level prefix and write it to every sink whose
    /// own level accepts it
    ///
    /// A failing sink does not stop delivery to the others; the failure is
    /// counted in [`write_failures`](Self::write_failures).
    pub fn write(&self, level: LogLevel, text: &str) {
        if level < self.min_level() {
            return;
        }

        let line = format!("{}{}", level.tag(), text);
        let sinks = self.sinks();
        for sink in sinks.iter() {
            if sink.should_log(level) && sink.log(level, &line).is_err() {
                self.write_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl Default for SinkRegistry {
    fn default() -> Self {
        Self::new(LogLevel::Debug)
    }
}

fn same_sink(a: &Arc<dyn LogSink>, b: &Arc<dyn LogSink>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
