//! # rtcap common library
//!
//! Shared code for the rtcap crates:
//! - Error types
//! - Configuration file resolution and loading
//! - Leveled logging sinks fed from `tracing`

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
