//! DMA-fed stereo capture pipeline

pub mod buffer;
pub mod convert;
mod error;
pub mod recorder;
pub mod simulated;
pub mod source;
pub mod wav;

pub use buffer::{BufferState, CaptureBuffers, DmaBuffer, Half, OutputBuffer};
pub use convert::{convert_sample, interleave, interleave_range};
pub use error::CaptureError;
pub use recorder::{AudioRecorder, BlockSink, RecorderConfig, RecorderStats};
pub use simulated::SimulatedSource;
pub use source::{Channel, HardwareError, StreamingSource, TransferEvent, TransferInterrupts};
pub use wav::WavBlockSink;
