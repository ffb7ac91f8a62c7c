//! WAV file block sink

use super::recorder::{BlockSink, CHANNELS};
use super::CaptureError;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Writes interleaved 16-bit stereo blocks to a WAV file
pub struct WavBlockSink {
    writer: Option<WavWriter<BufWriter<File>>>,
    frames_written: u64,
}

impl WavBlockSink {
    pub fn create(path: impl AsRef<Path>, sample_rate: u32) -> Result<Self, CaptureError> {
        let spec = WavSpec {
            channels: CHANNELS,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let writer = WavWriter::create(path.as_ref(), spec).map_err(|e| {
            CaptureError::Sink(format!("cannot create {}: {}", path.as_ref().display(), e))
        })?;

        Ok(Self {
            writer: Some(writer),
            frames_written: 0,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl BlockSink for WavBlockSink {
    fn write_block(&mut self, samples: &[i16]) -> Result<(), CaptureError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| CaptureError::Sink("WAV file already finalized".to_string()))?;

        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| CaptureError::Sink(e.to_string()))?;
        }
        self.frames_written += (samples.len() / CHANNELS as usize) as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), CaptureError> {
        match self.writer.take() {
            Some(writer) => writer
                .finalize()
                .map_err(|e| CaptureError::Sink(e.to_string())),
            None => Ok(()),
        }
    }
}
