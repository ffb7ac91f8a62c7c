//! # rtcap
//!
//! Priority worker pool and DMA-style streaming capture pipeline.
//!
//! - [`pool`]: bounded priority task queue drained by a fixed set of workers,
//!   with lifecycle control and low-power idle coordination
//! - [`capture`]: double-buffered two-channel recorder whose interrupt
//!   callbacks hand completed halves to pool tasks for 16-bit conversion and
//!   interleaving
//! - [`os`]: host versions of the RTOS primitives both rely on

pub mod capture;
pub mod config;
pub mod error;
pub mod os;
pub mod pool;

pub use error::{Error, Result};
