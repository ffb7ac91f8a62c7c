//! Bounded priority task queue
//!
//! Capacity bounds ordinary tasks only. Shutdown sentinels are always
//! accepted so teardown cannot fail on a full queue, and they are dequeued
//! only after every ordinary task ahead of them.

use super::task::{QueuedTask, TaskKind};
use super::{PoolError, SubmitError};
use std::collections::BinaryHeap;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

struct QueueInner {
    heap: BinaryHeap<QueuedTask>,
    next_seq: u64,
    /// Ordinary (non-sentinel) entries in `heap`
    pending: usize,
    closed: bool,
}

pub(crate) struct TaskQueue {
    inner: Mutex<QueueInner>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl TaskQueue {
    /// Allocate storage for `capacity` tasks plus `sentinels` shutdown entries
    pub(crate) fn new(capacity: usize, sentinels: usize) -> Result<Self, PoolError> {
        let entries = capacity.checked_add(sentinels).ok_or_else(|| {
            PoolError::Alloc(format!(
                "task queue of {} entries plus {} sentinels overflows",
                capacity, sentinels
            ))
        })?;
        let mut heap = BinaryHeap::new();
        heap.try_reserve(entries).map_err(|e| {
            PoolError::Alloc(format!("task queue of {} entries: {}", capacity, e))
        })?;

        Ok(Self {
            inner: Mutex::new(QueueInner {
                heap,
                next_seq: 0,
                pending: 0,
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        })
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue an ordinary task, waiting up to `timeout` for space
    pub(crate) fn push(&self, rank: u8, kind: TaskKind, timeout: Duration) -> Result<(), SubmitError> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();

        loop {
            if inner.closed {
                return Err(SubmitError::Shutdown);
            }
            if inner.pending < self.capacity {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(SubmitError::QueueFull);
            }
            inner = self
                .not_full
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.pending += 1;
        inner.heap.push(QueuedTask { rank, seq, kind });
        drop(inner);

        self.not_empty.notify_one();
        Ok(())
    }

    /// Post `count` shutdown sentinels behind every queued ordinary task
    pub(crate) fn push_shutdown(&self, count: usize) {
        let mut inner = self.lock();
        for _ in 0..count {
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.heap.push(QueuedTask {
                rank: 0,
                seq,
                kind: TaskKind::Shutdown,
            });
        }
        drop(inner);
        self.not_empty.notify_all();
    }

    /// Block until an entry is available and remove the highest-ranked one
    pub(crate) fn pop(&self) -> QueuedTask {
        let mut inner = self.lock();
        loop {
            if let Some(task) = inner.heap.pop() {
                if !task.is_shutdown() {
                    inner.pending -= 1;
                    drop(inner);
                    self.not_full.notify_one();
                }
                return task;
            }
            inner = self
                .not_empty
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Reject further ordinary submissions and release blocked submitters
    pub(crate) fn close(&self) {
        self.lock().closed = true;
        self.not_full.notify_all();
    }

    /// Ordinary tasks waiting to run
    pub(crate) fn len(&self) -> usize {
        self.lock().pending
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os::ExecPriority;
    use std::sync::Arc;
    use std::thread;

    fn noop() -> TaskKind {
        TaskKind::Run {
            job: Box::new(|| {}),
            exec_priority: ExecPriority::Normal,
        }
    }

    #[test]
    fn test_full_queue_times_out() {
        let queue = TaskQueue::new(1, 0).unwrap();
        queue.push(0, noop(), Duration::ZERO).unwrap();
        assert_eq!(
            queue.push(0, noop(), Duration::ZERO),
            Err(SubmitError::QueueFull)
        );

        let start = Instant::now();
        assert_eq!(
            queue.push(0, noop(), Duration::from_millis(30)),
            Err(SubmitError::QueueFull)
        );
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_sentinels_bypass_capacity_and_queue_last() {
        let queue = TaskQueue::new(1, 2).unwrap();
        queue.push(0, noop(), Duration::ZERO).unwrap();
        queue.push_shutdown(2);

        assert!(!queue.pop().is_shutdown());
        assert_eq!(queue.len(), 0);
        assert!(queue.pop().is_shutdown());
        assert!(queue.pop().is_shutdown());
    }

    #[test]
    fn test_close_releases_blocked_submitter() {
        let queue = Arc::new(TaskQueue::new(1, 0).unwrap());
        queue.push(0, noop(), Duration::ZERO).unwrap();

        let blocked = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(0, noop(), Duration::from_secs(10)))
        };

        thread::sleep(Duration::from_millis(20));
        queue.close();
        assert_eq!(blocked.join().unwrap(), Err(SubmitError::Shutdown));
    }

    #[test]
    fn test_oversized_capacity_reports_alloc_error() {
        assert!(matches!(
            TaskQueue::new(usize::MAX, 4),
            Err(PoolError::Alloc(_))
        ));
        assert!(matches!(
            TaskQueue::new(usize::MAX / 2, 0),
            Err(PoolError::Alloc(_))
        ));
    }
}
