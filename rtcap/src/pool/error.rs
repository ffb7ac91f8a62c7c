use thiserror::Error;

/// Pool construction failures
#[derive(Error, Debug)]
pub enum PoolError {
    /// A required configuration field is zero or out of range
    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),

    /// Queue storage could not be allocated
    #[error("Pool allocation failed: {0}")]
    Alloc(String),

    /// A worker thread could not be created
    #[error("Failed to spawn worker thread {index}: {source}")]
    ThreadSpawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },
}

/// Reasons a task submission is rejected
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// No capacity became available before the timeout
    #[error("task queue full")]
    QueueFull,

    /// No pool has been constructed
    #[error("thread pool not initialized")]
    NotInitialized,

    /// The function reference was absent
    #[error("invalid task argument")]
    InvalidArgument,

    /// The pool is shutting down or stopped
    #[error("thread pool is shutting down")]
    Shutdown,
}
