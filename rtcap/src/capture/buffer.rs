//! Double-buffered capture storage
//!
//! The hardware side writes one half of each raw channel buffer while the
//! processor reads the other. Nothing locks the halves: ownership follows
//! from the transfer timing, and every element is an atomic so concurrent
//! access stays defined even if that timing is violated.

use serde::Serialize;
use std::ops::Range;
use std::sync::atomic::{AtomicI16, AtomicI32, AtomicU8, Ordering};
use std::sync::Arc;

/// Which half of the raw buffers the hardware has just completed
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferState {
    Empty = 0,
    HalfFull = 1,
    Full = 2,
}

impl BufferState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => BufferState::HalfFull,
            2 => BufferState::Full,
            _ => BufferState::Empty,
        }
    }
}

/// Atomic holder for [`BufferState`], written from interrupt context
#[derive(Debug)]
pub struct BufferStateCell(AtomicU8);

impl BufferStateCell {
    pub fn new(state: BufferState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> BufferState {
        BufferState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: BufferState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Half of a raw buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Half {
    First,
    Second,
}

impl Half {
    /// Half to process for the given state: the second half after a full
    /// transfer, otherwise the first
    pub fn for_state(state: BufferState) -> Self {
        match state {
            BufferState::Full => Half::Second,
            BufferState::HalfFull | BufferState::Empty => Half::First,
        }
    }

    /// Sample index range of this half in a buffer of `len` samples
    pub fn range(self, len: usize) -> Range<usize> {
        match self {
            Half::First => 0..len / 2,
            Half::Second => len / 2..len,
        }
    }
}

/// Raw per-channel sample buffer filled by a continuous transfer
#[derive(Debug)]
pub struct DmaBuffer {
    samples: Box<[AtomicI32]>,
}

impl DmaBuffer {
    pub fn new(len: usize) -> Self {
        Self {
            samples: (0..len).map(|_| AtomicI32::new(0)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn write(&self, index: usize, value: i32) {
        self.samples[index].store(value, Ordering::Relaxed);
    }

    #[inline]
    pub fn read(&self, index: usize) -> i32 {
        self.samples[index].load(Ordering::Relaxed)
    }

    /// Copy `values` into the buffer starting at `offset`
    pub fn write_from(&self, offset: usize, values: &[i32]) {
        for (slot, &value) in self.samples[offset..offset + values.len()].iter().zip(values) {
            slot.store(value, Ordering::Relaxed);
        }
    }
}

/// Interleaved 16-bit output, two samples (left, right) per frame
#[derive(Debug)]
pub struct OutputBuffer {
    samples: Box<[AtomicI16]>,
}

impl OutputBuffer {
    /// Output for `frames` stereo frames
    pub fn new(frames: usize) -> Self {
        Self {
            samples: (0..frames * 2).map(|_| AtomicI16::new(0)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn write(&self, index: usize, value: i16) {
        self.samples[index].store(value, Ordering::Relaxed);
    }

    #[inline]
    pub fn read(&self, index: usize) -> i16 {
        self.samples[index].load(Ordering::Relaxed)
    }

    /// Copy of the output samples in `range`
    pub fn snapshot_range(&self, range: Range<usize>) -> Vec<i16> {
        self.samples[range]
            .iter()
            .map(|s| s.load(Ordering::Relaxed))
            .collect()
    }

    pub fn snapshot(&self) -> Vec<i16> {
        self.snapshot_range(0..self.samples.len())
    }
}

/// Both raw channel buffers, the interleaved output and the transfer state
#[derive(Debug)]
pub struct CaptureBuffers {
    pub left: Arc<DmaBuffer>,
    pub right: Arc<DmaBuffer>,
    pub output: OutputBuffer,
    pub state: BufferStateCell,
}

impl CaptureBuffers {
    /// Allocate buffers of `len` samples per channel
    pub fn new(len: usize) -> Self {
        Self {
            left: Arc::new(DmaBuffer::new(len)),
            right: Arc::new(DmaBuffer::new(len)),
            output: OutputBuffer::new(len),
            state: BufferStateCell::new(BufferState::Empty),
        }
    }

    /// Samples per channel
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_selection() {
        assert_eq!(Half::for_state(BufferState::HalfFull), Half::First);
        assert_eq!(Half::for_state(BufferState::Full), Half::Second);
        assert_eq!(Half::for_state(BufferState::Empty), Half::First);

        assert_eq!(Half::First.range(2048), 0..1024);
        assert_eq!(Half::Second.range(2048), 1024..2048);
    }

    #[test]
    fn test_state_cell() {
        let cell = BufferStateCell::new(BufferState::Empty);
        cell.store(BufferState::Full);
        assert_eq!(cell.load(), BufferState::Full);
    }

    #[test]
    fn test_buffers_sized_per_channel() {
        let buffers = CaptureBuffers::new(8);
        assert_eq!(buffers.len(), 8);
        assert_eq!(buffers.right.len(), 8);
        assert_eq!(buffers.output.len(), 16);

        buffers.left.write_from(4, &[1, 2, 3, 4]);
        assert_eq!(buffers.left.read(3), 0);
        assert_eq!(buffers.left.read(7), 4);
    }
}
