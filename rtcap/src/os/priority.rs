//! Per-thread execution priority
//!
//! Hosted threads cannot portably change their scheduling priority without
//! elevated rights, so the priority a worker runs a task at goes through
//! [`PriorityControl`]. The default implementation records the value per
//! thread, which task bodies can read back with [`current_priority`].

use serde::{Deserialize, Serialize};
use std::cell::Cell;

/// Thread execution priority, lowest first
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ExecPriority {
    Idle,
    Low,
    BelowNormal,
    #[default]
    Normal,
    AboveNormal,
    High,
    Realtime,
}

/// Sets and reads the calling thread's execution priority
pub trait PriorityControl: Send + Sync {
    fn set_current(&self, priority: ExecPriority);
    fn current(&self) -> ExecPriority;
}

thread_local! {
    static CURRENT_PRIORITY: Cell<ExecPriority> = const { Cell::new(ExecPriority::Normal) };
}

/// Priority recorded for the calling thread by [`ThreadLocalPriority`]
pub fn current_priority() -> ExecPriority {
    CURRENT_PRIORITY.with(Cell::get)
}

/// Records the priority in a thread-local; no scheduler change
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadLocalPriority;

impl PriorityControl for ThreadLocalPriority {
    fn set_current(&self, priority: ExecPriority) {
        CURRENT_PRIORITY.with(|p| p.set(priority));
    }

    fn current(&self) -> ExecPriority {
        current_priority()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_is_per_thread() {
        ThreadLocalPriority.set_current(ExecPriority::High);
        assert_eq!(current_priority(), ExecPriority::High);

        let other = std::thread::spawn(current_priority).join().unwrap();
        assert_eq!(other, ExecPriority::Normal);

        ThreadLocalPriority.set_current(ExecPriority::Normal);
    }

    #[test]
    fn test_priority_parses_from_toml_name() {
        #[derive(Deserialize)]
        struct Wrapper {
            priority: ExecPriority,
        }
        let w: Wrapper = toml::from_str("priority = \"above_normal\"").unwrap();
        assert_eq!(w.priority, ExecPriority::AboveNormal);
    }
}
