//! Counting semaphore with a bounded maximum count
//!
//! Mirrors an RTOS counting semaphore: `release` never blocks and fails
//! once the count is at its maximum; `acquire` blocks until a unit is
//! available. `close` wakes every waiter and makes all later calls fail,
//! which is how long-running consumers are told to exit.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct SemaphoreState {
    count: u32,
    closed: bool,
}

#[derive(Debug)]
pub struct Semaphore {
    state: Mutex<SemaphoreState>,
    available: Condvar,
    max_count: u32,
}

impl Semaphore {
    /// Create a semaphore holding `initial` units (clamped to `max_count`)
    pub fn new(max_count: u32, initial: u32) -> Self {
        let max_count = max_count.max(1);
        Self {
            state: Mutex::new(SemaphoreState {
                count: initial.min(max_count),
                closed: false,
            }),
            available: Condvar::new(),
            max_count,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SemaphoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add one unit; returns false if the count is already at its maximum
    /// or the semaphore is closed
    pub fn release(&self) -> bool {
        let mut state = self.lock();
        if state.closed || state.count >= self.max_count {
            return false;
        }
        state.count += 1;
        drop(state);
        self.available.notify_one();
        true
    }

    /// Block until a unit is available and take it
    ///
    /// Returns false once the semaphore is closed.
    pub fn acquire(&self) -> bool {
        let mut state = self.lock();
        loop {
            if state.closed {
                return false;
            }
            if state.count > 0 {
                state.count -= 1;
                return true;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wake all waiters and fail every later acquire/release
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_all();
    }

    /// Units currently available
    pub fn available(&self) -> u32 {
        self.lock().count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_release_saturates_at_max() {
        let sem = Semaphore::new(1, 0);
        assert!(sem.release());
        assert!(!sem.release());
        assert_eq!(sem.available(), 1);

        assert!(sem.acquire());
        assert_eq!(sem.available(), 0);
        assert!(sem.release());
    }

    #[test]
    fn test_initial_clamped() {
        let sem = Semaphore::new(2, 5);
        assert_eq!(sem.available(), 2);
    }

    #[test]
    fn test_acquire_blocks_until_release() {
        let sem = Arc::new(Semaphore::new(1, 0));
        let waiter = {
            let sem = Arc::clone(&sem);
            thread::spawn(move || sem.acquire())
        };

        thread::sleep(Duration::from_millis(20));
        assert!(sem.release());
        assert!(waiter.join().unwrap());
        assert_eq!(sem.available(), 0);
    }

    #[test]
    fn test_close_wakes_waiter() {
        let sem = Arc::new(Semaphore::new(1, 0));
        let waiter = {
            let sem = Arc::clone(&sem);
            thread::spawn(move || sem.acquire())
        };

        thread::sleep(Duration::from_millis(20));
        sem.close();
        assert!(!waiter.join().unwrap());
        assert!(!sem.release());
    }
}
