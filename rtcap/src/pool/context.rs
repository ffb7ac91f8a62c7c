//! Owner of the application's single live pool

use super::{PoolState, QueuePriority, SubmitError, ThreadPool, ThreadPoolConfig};
use crate::os::ExecPriority;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::error;

/// Holds at most one live [`ThreadPool`] and forwards the pool surface to it
///
/// Without a live pool `state()` reports `Stopped`, counts are 0 and
/// submissions fail with [`SubmitError::NotInitialized`].
#[derive(Default)]
pub struct PoolContext {
    pool: Mutex<Option<Arc<ThreadPool>>>,
}

impl PoolContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<ThreadPool>>> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn default_config() -> ThreadPoolConfig {
        ThreadPoolConfig::default()
    }

    /// Build a pool with the default configuration
    pub fn init(&self) -> bool {
        self.init_with_config(Self::default_config())
    }

    /// Build a pool from `config`; true if a pool is live afterwards
    ///
    /// A pool that is already live is kept and `config` is ignored.
    pub fn init_with_config(&self, config: ThreadPoolConfig) -> bool {
        let mut slot = self.slot();
        if let Some(pool) = slot.as_ref() {
            if pool.state() != PoolState::Stopped {
                return true;
            }
        }

        match ThreadPool::new(config) {
            Ok(pool) => {
                *slot = Some(Arc::new(pool));
                true
            }
            Err(e) => {
                error!("Thread pool initialization failed: {}", e);
                false
            }
        }
    }

    /// Shut down and release the live pool, if any
    pub fn deinit(&self, wait_for_tasks: bool) {
        let pool = self.slot().take();
        if let Some(pool) = pool {
            pool.deinit(wait_for_tasks);
        }
    }

    /// Shared handle to the live pool
    pub fn pool(&self) -> Option<Arc<ThreadPool>> {
        self.slot().clone()
    }

    pub fn submit<F>(
        &self,
        job: F,
        queue_priority: QueuePriority,
        exec_priority: ExecPriority,
        timeout: Option<Duration>,
    ) -> Result<(), SubmitError>
    where
        F: FnOnce() + Send + 'static,
    {
        let pool = self.pool().ok_or(SubmitError::NotInitialized)?;
        pool.submit(job, queue_priority, exec_priority, timeout)
    }

    pub fn submit_fn<A>(
        &self,
        function: Option<fn(A)>,
        arg: A,
        queue_priority: QueuePriority,
        exec_priority: ExecPriority,
        timeout: Option<Duration>,
    ) -> Result<(), SubmitError>
    where
        A: Send + 'static,
    {
        let pool = self.pool().ok_or(SubmitError::NotInitialized)?;
        pool.submit_fn(function, arg, queue_priority, exec_priority, timeout)
    }

    pub fn active_count(&self) -> u32 {
        self.pool().map_or(0, |p| p.active_count())
    }

    pub fn active_count_lockfree(&self) -> u32 {
        self.pool().map_or(0, |p| p.active_count_lockfree())
    }

    pub fn is_idle(&self) -> bool {
        self.active_count() == 0
    }

    pub fn state(&self) -> PoolState {
        self.pool().map_or(PoolState::Stopped, |p| p.state())
    }

    pub fn wait_and_suspend(&self) -> bool {
        match self.pool() {
            Some(pool) => pool.wait_and_suspend(),
            None => false,
        }
    }
}
