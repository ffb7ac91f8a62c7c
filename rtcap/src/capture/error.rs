use super::source::HardwareError;
use crate::pool::SubmitError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    /// A channel could not be configured or started
    #[error("Hardware error: {0}")]
    Hardware(#[from] HardwareError),

    /// A stream task could not be dispatched to the pool
    #[error("Failed to dispatch {task} task: {source}")]
    Dispatch {
        task: &'static str,
        #[source]
        source: SubmitError,
    },

    #[error("Invalid recorder configuration: {0}")]
    InvalidConfig(String),

    /// The recorder has been deinitialized
    #[error("Recorder is closed")]
    Closed,

    /// A block sink failed to accept output
    #[error("Block sink error: {0}")]
    Sink(String),
}
