//! Task descriptors and their queue ordering

use crate::os::ExecPriority;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Boxed task body
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Queue priority class; higher classes are dequeued first
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum QueuePriority {
    Low = 0,
    #[default]
    Normal = 1,
    High = 2,
    Critical = 3,
}

pub(crate) enum TaskKind {
    Run {
        job: Job,
        exec_priority: ExecPriority,
    },
    Shutdown,
}

/// Queue entry: ordinary tasks before shutdown sentinels, then by rank,
/// then FIFO by sequence number
pub(crate) struct QueuedTask {
    pub(crate) rank: u8,
    pub(crate) seq: u64,
    pub(crate) kind: TaskKind,
}

impl QueuedTask {
    pub(crate) fn is_shutdown(&self) -> bool {
        matches!(self.kind, TaskKind::Shutdown)
    }
}

/// Max-heap order: sentinels last, higher rank first, then lower sequence
/// (earlier submit) first
impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .is_shutdown()
            .cmp(&self.is_shutdown())
            .then_with(|| self.rank.cmp(&other.rank))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedTask {}
