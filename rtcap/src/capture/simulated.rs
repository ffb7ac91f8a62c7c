//! Host-side streaming source
//!
//! Each started channel gets a filler thread that writes a sine tone into its
//! buffer one half at a time, paced at the configured sample rate. The left
//! channel is the primary: its filler raises the half/full transfer
//! callbacks, the right channel only fills.

use super::buffer::{DmaBuffer, Half};
use super::source::{Channel, HardwareError, StreamingSource, TransferInterrupts};
use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const PRIMARY_CHANNEL: Channel = Channel::Left;
/// Peak amplitude after conversion, half of full scale
const TONE_AMPLITUDE: f64 = 16_384.0;

struct Filler {
    channel: Channel,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Simulated two-channel source producing test tones
pub struct SimulatedSource {
    sample_rate: u32,
    left_hz: f64,
    right_hz: f64,
    fillers: Mutex<Vec<Filler>>,
}

impl SimulatedSource {
    /// 440 Hz on the left, 660 Hz on the right
    pub fn new(sample_rate: u32) -> Self {
        Self::with_tones(sample_rate, 440.0, 660.0)
    }

    pub fn with_tones(sample_rate: u32, left_hz: f64, right_hz: f64) -> Self {
        Self {
            sample_rate,
            left_hz,
            right_hz,
            fillers: Mutex::new(Vec::new()),
        }
    }

    fn fillers(&self) -> MutexGuard<'_, Vec<Filler>> {
        self.fillers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Channels with a running filler
    pub fn running_channels(&self) -> Vec<Channel> {
        self.fillers().iter().map(|f| f.channel).collect()
    }
}

impl StreamingSource for SimulatedSource {
    fn configure_channel(&self, channel: Channel) -> Result<(), HardwareError> {
        if self.sample_rate == 0 {
            return Err(HardwareError::Configure {
                channel,
                reason: "sample rate is zero".to_string(),
            });
        }
        debug!("Simulated {:?} channel configured at {} Hz", channel, self.sample_rate);
        Ok(())
    }

    fn start_continuous(
        &self,
        channel: Channel,
        buffer: Arc<DmaBuffer>,
        length: usize,
        interrupts: TransferInterrupts,
    ) -> Result<(), HardwareError> {
        if length < 2 || length > buffer.len() {
            return Err(HardwareError::Start {
                channel,
                reason: format!("invalid transfer length {}", length),
            });
        }

        let mut fillers = self.fillers();
        if fillers.iter().any(|f| f.channel == channel) {
            return Err(HardwareError::Start {
                channel,
                reason: "transfer already running".to_string(),
            });
        }

        let stop = Arc::new(AtomicBool::new(false));
        let tone = ToneFiller {
            buffer,
            length,
            sample_rate: self.sample_rate,
            frequency: match channel {
                Channel::Left => self.left_hz,
                Channel::Right => self.right_hz,
            },
            interrupts: (channel == PRIMARY_CHANNEL).then_some(interrupts),
            stop: Arc::clone(&stop),
        };

        let name = match channel {
            Channel::Left => "sim-left",
            Channel::Right => "sim-right",
        };
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || tone.run())
            .map_err(|e| HardwareError::Start {
                channel,
                reason: e.to_string(),
            })?;

        fillers.push(Filler {
            channel,
            stop,
            handle,
        });
        info!("Simulated {:?} transfer started ({} samples)", channel, length);
        Ok(())
    }

    fn stop(&self) {
        let fillers: Vec<Filler> = self.fillers().drain(..).collect();
        for filler in &fillers {
            filler.stop.store(true, Ordering::Release);
        }
        for filler in fillers {
            if filler.handle.join().is_err() {
                warn!("Simulated {:?} filler panicked", filler.channel);
            }
        }
    }
}

impl Drop for SimulatedSource {
    fn drop(&mut self) {
        self.stop();
    }
}

struct ToneFiller {
    buffer: Arc<DmaBuffer>,
    length: usize,
    sample_rate: u32,
    frequency: f64,
    interrupts: Option<TransferInterrupts>,
    stop: Arc<AtomicBool>,
}

impl ToneFiller {
    fn run(self) {
        let half_len = self.length / 2;
        let half_period = Duration::from_secs_f64(half_len as f64 / self.sample_rate as f64);
        let step = TAU * self.frequency / self.sample_rate as f64;

        let mut phase = 0.0_f64;
        let mut next_deadline = Instant::now() + half_period;

        'transfer: loop {
            for half in [Half::First, Half::Second] {
                for i in half.range(self.length) {
                    // 16-bit value left-justified in a 24-bit sample
                    let value = (phase.sin() * TONE_AMPLITUDE) as i32;
                    self.buffer.write(i, value << 8);
                    phase = (phase + step) % TAU;
                }

                let now = Instant::now();
                if next_deadline > now {
                    thread::sleep(next_deadline - now);
                }
                next_deadline += half_period;

                if self.stop.load(Ordering::Acquire) {
                    break 'transfer;
                }

                if let Some(interrupts) = &self.interrupts {
                    match half {
                        Half::First => interrupts.on_half_transfer(),
                        Half::Second => interrupts.on_full_transfer(),
                    }
                }
            }
        }
    }
}
