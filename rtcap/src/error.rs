//! Error types for rtcap
//!
//! Each subsystem has its own error enum; this type gathers them for callers
//! that drive several subsystems at once.

use crate::capture::CaptureError;
use crate::pool::{PoolError, SubmitError};
use thiserror::Error;

/// Main error type for the rtcap library
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or logging setup errors
    #[error(transparent)]
    Common(#[from] rtcap_common::Error),

    /// Pool construction errors
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Task submission errors
    #[error(transparent)]
    Submit(#[from] SubmitError),

    /// Capture pipeline errors
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

/// Convenience Result type using rtcap Error
pub type Result<T> = std::result::Result<T, Error>;
