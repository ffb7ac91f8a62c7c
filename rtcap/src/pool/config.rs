//! Thread pool configuration (`[pool]` section)

use super::PoolError;
use crate::os::ExecPriority;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default worker count
pub const DEFAULT_THREAD_COUNT: usize = 4;
/// Default task queue capacity
pub const DEFAULT_QUEUE_SIZE: usize = 20;
/// Default submit timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 100;
/// Default worker stack size in bytes
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadPoolConfig {
    /// Number of worker threads
    pub thread_count: usize,

    /// Maximum queued (not yet running) tasks
    pub queue_size: usize,

    /// How long `submit` waits for queue space when no timeout is given
    pub default_timeout_ms: u64,

    /// Worker stack size in bytes
    pub stack_size: usize,

    /// Resume the idle thread when the pool drains
    pub low_power_mode: bool,

    /// Priority each worker returns to between tasks
    pub default_thread_priority: ExecPriority,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            thread_count: DEFAULT_THREAD_COUNT,
            queue_size: DEFAULT_QUEUE_SIZE,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            stack_size: DEFAULT_STACK_SIZE,
            low_power_mode: true,
            default_thread_priority: ExecPriority::Normal,
        }
    }
}

impl ThreadPoolConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Reject zero-valued required fields
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.thread_count == 0 {
            return Err(PoolError::InvalidConfig(
                "thread_count must be greater than 0".to_string(),
            ));
        }
        if self.queue_size == 0 {
            return Err(PoolError::InvalidConfig(
                "queue_size must be greater than 0".to_string(),
            ));
        }
        if self.stack_size == 0 {
            return Err(PoolError::InvalidConfig(
                "stack_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ThreadPoolConfig::default();
        assert_eq!(cfg.thread_count, 4);
        assert_eq!(cfg.queue_size, 20);
        assert_eq!(cfg.default_timeout(), Duration::from_millis(100));
        assert!(cfg.low_power_mode);
        assert_eq!(cfg.default_thread_priority, ExecPriority::Normal);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_zero_fields_rejected() {
        for cfg in [
            ThreadPoolConfig { thread_count: 0, ..Default::default() },
            ThreadPoolConfig { queue_size: 0, ..Default::default() },
            ThreadPoolConfig { stack_size: 0, ..Default::default() },
        ] {
            assert!(matches!(cfg.validate(), Err(PoolError::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_partial_toml() {
        let cfg: ThreadPoolConfig =
            toml::from_str("thread_count = 2\nlow_power_mode = false").unwrap();
        assert_eq!(cfg.thread_count, 2);
        assert!(!cfg.low_power_mode);
        assert_eq!(cfg.queue_size, DEFAULT_QUEUE_SIZE);
    }
}
