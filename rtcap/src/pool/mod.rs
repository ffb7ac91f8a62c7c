//! Priority worker pool
//!
//! A fixed set of named worker threads drains a bounded priority queue.
//! Tasks run to completion once dispatched; the only cancellation is
//! pool-wide shutdown, which takes effect at task boundaries.
//!
//! Locks: the task queue, the active-task count and the pool state each have
//! their own mutex. The active-count lock may be held while reading the
//! state; the state lock is never held while taking the active-count lock.

mod config;
mod context;
mod error;
mod queue;
mod task;

pub use config::{
    ThreadPoolConfig, DEFAULT_QUEUE_SIZE, DEFAULT_STACK_SIZE, DEFAULT_THREAD_COUNT,
    DEFAULT_TIMEOUT_MS,
};
pub use context::PoolContext;
pub use error::{PoolError, SubmitError};
pub use task::{Job, QueuePriority};

use crate::os::{ExecPriority, PriorityControl, ThreadLocalPriority};
use queue::TaskQueue;
use serde::Serialize;
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use task::TaskKind;
use tracing::{debug, error, info, warn};

/// Starts worker `n` running the pool's worker loop
type SpawnWorker<'a> = dyn FnMut(usize, Arc<PoolShared>) -> io::Result<JoinHandle<()>> + 'a;

/// Pool lifecycle state; only ever moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    Running,
    ShuttingDown,
    Stopped,
}

struct ActiveState {
    count: u32,
    /// Idle thread is parked in `wait_and_suspend`
    suspended: bool,
}

struct PoolShared {
    config: ThreadPoolConfig,
    queue: TaskQueue,
    state: Mutex<PoolState>,
    active: Mutex<ActiveState>,
    /// Signalled when the active count drops to zero or the idle thread is resumed
    idle: Condvar,
    /// Racy snapshot of `active.count` for interrupt-context readers
    active_snapshot: AtomicU32,
    completed: AtomicU64,
    panicked: AtomicU64,
    idle_wakeups: AtomicU64,
    /// Thread resumed when the pool drains (low-power mode only)
    idle_thread: Option<ThreadId>,
    priority: Arc<dyn PriorityControl>,
}

impl PoolShared {
    fn state(&self) -> PoolState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// RUNNING -> SHUTTING_DOWN; false if shutdown already began
    fn begin_shutdown(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != PoolState::Running {
            return false;
        }
        *state = PoolState::ShuttingDown;
        true
    }

    /// Move the state forward; never regresses
    fn advance_state(&self, next: PoolState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if next > *state {
            *state = next;
        }
    }

    fn active(&self) -> MutexGuard<'_, ActiveState> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fixed-size priority worker pool
pub struct ThreadPool {
    shared: Arc<PoolShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPool {
    /// Build a pool, spawning every worker before returning
    ///
    /// In low-power mode the calling thread becomes the idle thread that
    /// [`wait_and_suspend`](Self::wait_and_suspend) may park.
    pub fn new(config: ThreadPoolConfig) -> Result<Self, PoolError> {
        Self::with_priority_control(config, Arc::new(ThreadLocalPriority))
    }

    /// Build a pool that applies task priorities through `priority`
    pub fn with_priority_control(
        config: ThreadPoolConfig,
        priority: Arc<dyn PriorityControl>,
    ) -> Result<Self, PoolError> {
        Self::build(config, priority, &mut Self::spawn_worker)
    }

    fn spawn_worker(worker_id: usize, shared: Arc<PoolShared>) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("worker-{}", worker_id))
            .stack_size(shared.config.stack_size)
            .spawn(move || Self::worker_loop(worker_id, shared))
    }

    fn build(
        config: ThreadPoolConfig,
        priority: Arc<dyn PriorityControl>,
        spawn: &mut SpawnWorker<'_>,
    ) -> Result<Self, PoolError> {
        config.validate()?;

        let queue = TaskQueue::new(config.queue_size, config.thread_count)?;
        let idle_thread = config.low_power_mode.then(|| thread::current().id());

        let shared = Arc::new(PoolShared {
            config,
            queue,
            state: Mutex::new(PoolState::Running),
            active: Mutex::new(ActiveState {
                count: 0,
                suspended: false,
            }),
            idle: Condvar::new(),
            active_snapshot: AtomicU32::new(0),
            completed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
            idle_wakeups: AtomicU64::new(0),
            idle_thread,
            priority,
        });

        let thread_count = shared.config.thread_count;
        let mut workers = Vec::with_capacity(thread_count);
        for worker_id in 0..thread_count {
            match spawn(worker_id, Arc::clone(&shared)) {
                Ok(handle) => workers.push(handle),
                Err(source) => {
                    error!("Failed to spawn worker {}: {}", worker_id, source);
                    Self::abort_construction(&shared, workers);
                    return Err(PoolError::ThreadSpawn {
                        index: worker_id,
                        source,
                    });
                }
            }
        }

        info!(
            "Thread pool started: {} workers, queue capacity {}, low_power={}",
            thread_count, shared.config.queue_size, shared.config.low_power_mode
        );

        Ok(Self {
            shared,
            workers: Mutex::new(workers),
        })
    }

    /// Tear down the workers spawned so far after a failed construction
    fn abort_construction(shared: &Arc<PoolShared>, workers: Vec<JoinHandle<()>>) {
        shared.begin_shutdown();
        shared.queue.close();
        shared.queue.push_shutdown(workers.len());
        for handle in workers {
            let _ = handle.join();
        }
        shared.advance_state(PoolState::Stopped);
    }

    /// Queue a task
    ///
    /// Waits up to `timeout` for queue space (`None` uses the configured
    /// default, `Some(Duration::ZERO)` never waits). The task body runs on a
    /// worker at `exec_priority`.
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
        if self.shared.state() != PoolState::Running {
            return Err(SubmitError::Shutdown);
        }

        let timeout = timeout.unwrap_or_else(|| self.shared.config.default_timeout());
        let kind = TaskKind::Run {
            job: Box::new(job),
            exec_priority,
        };

        let result = self.shared.queue.push(queue_priority as u8, kind, timeout);
        if let Err(SubmitError::QueueFull) = result {
            warn!(
                "Task queue full ({} pending), {:?} task rejected",
                self.shared.queue.len(),
                queue_priority
            );
        }
        result
    }

    /// Queue `function(arg)`; an absent function is rejected
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
        let function = function.ok_or(SubmitError::InvalidArgument)?;
        self.submit(move || function(arg), queue_priority, exec_priority, timeout)
    }

    /// Shut the pool down
    ///
    /// New submissions fail with [`SubmitError::Shutdown`] from the first
    /// moment. Every task already accepted still runs: shutdown sentinels
    /// queue behind it. With `wait_for_tasks` the call waits for the queue to
    /// drain and the running tasks to finish, then joins every worker;
    /// otherwise it returns at once and the workers exit on their own.
    pub fn deinit(&self, wait_for_tasks: bool) {
        if !self.shared.begin_shutdown() {
            debug!("Thread pool deinit ignored: already {:?}", self.shared.state());
            return;
        }

        info!("Thread pool shutting down (wait_for_tasks={})", wait_for_tasks);
        self.shared.queue.close();
        self.release_suspended();

        if wait_for_tasks {
            let pending = self.shared.queue.len();
            if pending > 0 {
                info!("Draining {} queued tasks before shutdown", pending);
            }
            let mut active = self.shared.active();
            while active.count > 0 || self.shared.queue.len() > 0 {
                active = self
                    .shared
                    .idle
                    .wait(active)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }

        self.shared.queue.push_shutdown(self.shared.config.thread_count);

        let handles: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        if wait_for_tasks {
            for handle in handles {
                if handle.join().is_err() {
                    error!("Worker thread terminated abnormally");
                }
            }
        }

        self.shared.advance_state(PoolState::Stopped);
        info!(
            "Thread pool stopped ({} tasks completed, {} panicked)",
            self.completed_tasks(),
            self.panicked_tasks()
        );
    }

    /// Let a parked idle thread go; teardown must not leave it suspended
    fn release_suspended(&self) {
        let mut active = self.shared.active();
        if active.suspended {
            active.suspended = false;
            self.shared.idle.notify_all();
        }
    }

    /// Number of tasks currently executing
    pub fn active_count(&self) -> u32 {
        self.shared.active().count
    }

    /// Lock-free read of the active count; may be stale
    pub fn active_count_lockfree(&self) -> u32 {
        self.shared.active_snapshot.load(Ordering::Acquire)
    }

    pub fn is_idle(&self) -> bool {
        self.active_count() == 0
    }

    pub fn state(&self) -> PoolState {
        self.shared.state()
    }

    /// Park the idle thread while tasks are running
    ///
    /// Only the thread that constructed a low-power pool is parked; the last
    /// worker to finish resumes it. Returns true if the caller was parked.
    /// Any other caller, or an idle pool, returns false immediately.
    pub fn wait_and_suspend(&self) -> bool {
        let is_idle_thread = self.shared.idle_thread == Some(thread::current().id());
        if !is_idle_thread {
            return false;
        }

        let mut active = self.shared.active();
        if active.count == 0 || self.shared.state() != PoolState::Running {
            return false;
        }

        active.suspended = true;
        while active.suspended {
            active = self
                .shared
                .idle
                .wait(active)
                .unwrap_or_else(PoisonError::into_inner);
        }
        true
    }

    pub fn config(&self) -> &ThreadPoolConfig {
        &self.shared.config
    }

    /// Ordinary tasks waiting in the queue
    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn queue_capacity(&self) -> usize {
        self.shared.queue.capacity()
    }

    pub fn completed_tasks(&self) -> u64 {
        self.shared.completed.load(Ordering::Relaxed)
    }

    pub fn panicked_tasks(&self) -> u64 {
        self.shared.panicked.load(Ordering::Relaxed)
    }

    /// Times the idle thread was resumed by a draining pool
    pub fn idle_wakeups(&self) -> u64 {
        self.shared.idle_wakeups.load(Ordering::Relaxed)
    }

    /// Worker thread main loop
    fn worker_loop(worker_id: usize, shared: Arc<PoolShared>) {
        shared
            .priority
            .set_current(shared.config.default_thread_priority);
        debug!("Worker {} started", worker_id);

        loop {
            let task = shared.queue.pop();
            let (job, exec_priority) = match task.kind {
                TaskKind::Shutdown => break,
                TaskKind::Run { job, exec_priority } => (job, exec_priority),
            };

            let active_now = {
                let mut active = shared.active();
                active.count += 1;
                shared.active_snapshot.store(active.count, Ordering::Release);
                active.count
            };
            debug!(
                "Worker {} running task (active={}, queued={})",
                worker_id,
                active_now,
                shared.queue.len()
            );

            let base_priority = shared.priority.current();
            if exec_priority != base_priority {
                shared.priority.set_current(exec_priority);
            }

            let outcome = panic::catch_unwind(AssertUnwindSafe(job));

            if shared.priority.current() != base_priority {
                shared.priority.set_current(base_priority);
            }

            match outcome {
                Ok(()) => {
                    shared.completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(payload) => {
                    shared.panicked.fetch_add(1, Ordering::Relaxed);
                    error!(
                        "Worker {} task panicked: {}",
                        worker_id,
                        panic_message(payload.as_ref())
                    );
                }
            }

            let mut active = shared.active();
            active.count -= 1;
            shared.active_snapshot.store(active.count, Ordering::Release);
            let remaining = active.count;

            if remaining == 0 {
                if shared.config.low_power_mode
                    && active.suspended
                    && shared.state() == PoolState::Running
                {
                    active.suspended = false;
                    shared.idle_wakeups.fetch_add(1, Ordering::Relaxed);
                    debug!("Worker {} resuming idle thread", worker_id);
                }
                shared.idle.notify_all();
            }
            drop(active);

            debug!("Worker {} finished task (active={})", worker_id, remaining);
        }

        debug!("Worker {} exiting", worker_id);
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        if self.shared.state() == PoolState::Running {
            self.deinit(false);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
