//! Streaming hardware interface
//!
//! A source runs one continuous, circular transfer per channel into a
//! [`DmaBuffer`] and reports progress through [`TransferInterrupts`]: a
//! half-transfer callback when the first half is written, a full-transfer
//! callback when the second half is written, then around again.

use super::buffer::{BufferState, CaptureBuffers, DmaBuffer};
use crossbeam::channel::{Sender, TrySendError};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Capture channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Left,
    Right,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HardwareError {
    #[error("failed to configure {channel:?} channel: {reason}")]
    Configure { channel: Channel, reason: String },

    #[error("failed to start {channel:?} transfer: {reason}")]
    Start { channel: Channel, reason: String },
}

/// Notification posted by the transfer callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEvent {
    HalfComplete,
    Complete,
}

/// Continuous double-buffering sample source
pub trait StreamingSource: Send + Sync {
    /// Prepare `channel` for continuous conversion
    fn configure_channel(&self, channel: Channel) -> Result<(), HardwareError>;

    /// Begin filling `buffer` circularly, `length` samples per cycle
    fn start_continuous(
        &self,
        channel: Channel,
        buffer: Arc<DmaBuffer>,
        length: usize,
        interrupts: TransferInterrupts,
    ) -> Result<(), HardwareError>;

    /// Halt every running transfer
    fn stop(&self);
}

/// Interrupt-side entry points into a recorder
///
/// Both callbacks are O(1) and never block: they store the buffer state and
/// try to post an event. When the event channel is full the event is dropped
/// and counted.
#[derive(Clone)]
pub struct TransferInterrupts {
    buffers: Arc<CaptureBuffers>,
    events: Sender<TransferEvent>,
    dropped: Arc<AtomicU64>,
}

impl TransferInterrupts {
    pub(crate) fn new(
        buffers: Arc<CaptureBuffers>,
        events: Sender<TransferEvent>,
        dropped: Arc<AtomicU64>,
    ) -> Self {
        Self {
            buffers,
            events,
            dropped,
        }
    }

    /// First half of the buffers has been written
    pub fn on_half_transfer(&self) {
        self.signal(BufferState::HalfFull, TransferEvent::HalfComplete);
    }

    /// Second half of the buffers has been written
    pub fn on_full_transfer(&self) {
        self.signal(BufferState::Full, TransferEvent::Complete);
    }

    #[inline]
    fn signal(&self, state: BufferState, event: TransferEvent) {
        self.buffers.state.store(state);
        if let Err(TrySendError::Full(_)) = self.events.try_send(event) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}
