//! Host stand-ins for the RTOS primitives the pool and recorder rely on

pub mod priority;
pub mod semaphore;

pub use priority::{current_priority, ExecPriority, PriorityControl, ThreadLocalPriority};
pub use semaphore::Semaphore;
