//! Stereo audio recorder
//!
//! Data flow:
//! hardware -> [`TransferInterrupts`] -> bounded event channel -> notifier
//! task -> semaphore -> processor task -> interleaved output (-> block sink)
//!
//! The notifier and processor run as long-lived tasks on the worker pool and
//! occupy two workers until [`AudioRecorder::deinit`].

use super::buffer::{BufferState, CaptureBuffers, Half};
use super::convert::interleave_range;
use super::source::{Channel, StreamingSource, TransferEvent, TransferInterrupts};
use super::CaptureError;
use crate::os::{ExecPriority, Semaphore};
use crate::pool::{QueuePriority, ThreadPool};
use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::sync::WaitGroup;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

/// Default samples per channel buffer
pub const DEFAULT_BUFFER_LEN: usize = 2048;
/// Default sample rate in Hz
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;
/// Default event channel capacity
pub const DEFAULT_EVENT_CAPACITY: usize = 10;
/// Default semaphore maximum count
pub const DEFAULT_SEMAPHORE_MAX: u32 = 1;
/// Recorder channel count
pub const CHANNELS: u16 = 2;

/// Recorder configuration (`[recorder]` section)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Raw samples per channel buffer (both halves)
    pub buffer_len: usize,
    pub sample_rate: u32,
    /// Pending transfer events before new ones are dropped
    pub event_capacity: usize,
    /// Processing hand-offs that can be pending at once
    pub semaphore_max: u32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            buffer_len: DEFAULT_BUFFER_LEN,
            sample_rate: DEFAULT_SAMPLE_RATE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            semaphore_max: DEFAULT_SEMAPHORE_MAX,
        }
    }
}

impl RecorderConfig {
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.buffer_len == 0 || self.buffer_len % 2 != 0 {
            return Err(CaptureError::InvalidConfig(format!(
                "buffer_len must be even and greater than 0 (got {})",
                self.buffer_len
            )));
        }
        if self.sample_rate == 0 {
            return Err(CaptureError::InvalidConfig(
                "sample_rate must be greater than 0".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(CaptureError::InvalidConfig(
                "event_capacity must be greater than 0".to_string(),
            ));
        }
        if self.semaphore_max == 0 {
            return Err(CaptureError::InvalidConfig(
                "semaphore_max must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Receives each interleaved half-block after conversion
pub trait BlockSink: Send {
    /// `samples` holds interleaved L/R pairs
    fn write_block(&mut self, samples: &[i16]) -> Result<(), CaptureError>;

    /// Flush and close; called once at recorder deinit
    fn finish(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }
}

/// Recorder counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecorderStats {
    /// Transfer events lost to a full event channel
    pub events_dropped: u64,
    /// Transfer events taken by the notifier
    pub events_received: u64,
    /// Semaphore releases lost because a hand-off was already pending
    pub releases_coalesced: u64,
    /// Half-blocks converted into the output buffer
    pub blocks_processed: u64,
    /// Hand-offs ignored because recording was stopped
    pub units_discarded: u64,
}

#[derive(Default)]
struct Counters {
    events_dropped: Arc<AtomicU64>,
    events_received: AtomicU64,
    releases_coalesced: AtomicU64,
    blocks_processed: AtomicU64,
    units_discarded: AtomicU64,
}

struct RecorderShared {
    buffers: Arc<CaptureBuffers>,
    recording: AtomicBool,
    semaphore: Semaphore,
    counters: Counters,
    sink: Mutex<Option<Box<dyn BlockSink>>>,
}

impl RecorderShared {
    fn sink(&self) -> MutexGuard<'_, Option<Box<dyn BlockSink>>> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Stream task handles released at deinit
struct Lifecycle {
    shutdown: Option<Sender<()>>,
    tasks: Option<WaitGroup>,
}

/// Two-channel DMA-fed recorder
pub struct AudioRecorder {
    config: RecorderConfig,
    shared: Arc<RecorderShared>,
    source: Arc<dyn StreamingSource>,
    interrupts: TransferInterrupts,
    /// Serializes start/stop/deinit
    control: Mutex<Lifecycle>,
}

impl AudioRecorder {
    /// Allocate buffers and dispatch the notifier and processor tasks
    pub fn init(
        source: Arc<dyn StreamingSource>,
        pool: &ThreadPool,
        config: RecorderConfig,
    ) -> Result<Self, CaptureError> {
        config.validate()?;
        info!("Initializing audio recorder...");

        let buffers = Arc::new(CaptureBuffers::new(config.buffer_len));
        let (event_tx, event_rx) = channel::bounded(config.event_capacity);
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);

        let shared = Arc::new(RecorderShared {
            buffers: Arc::clone(&buffers),
            recording: AtomicBool::new(false),
            semaphore: Semaphore::new(config.semaphore_max, 0),
            counters: Counters::default(),
            sink: Mutex::new(None),
        });

        let interrupts = TransferInterrupts::new(
            buffers,
            event_tx,
            Arc::clone(&shared.counters.events_dropped),
        );

        let tasks = WaitGroup::new();

        let notifier = {
            let shared = Arc::clone(&shared);
            let done = tasks.clone();
            move || {
                notifier_loop(&shared, &event_rx, &shutdown_rx);
                drop(done);
            }
        };
        pool.submit(notifier, QueuePriority::High, ExecPriority::High, None)
            .map_err(|source| {
                error!("Failed to dispatch notifier task: {}", source);
                CaptureError::Dispatch {
                    task: "notifier",
                    source,
                }
            })?;

        let processor = {
            let shared = Arc::clone(&shared);
            let done = tasks.clone();
            move || {
                processor_loop(&shared);
                drop(done);
            }
        };
        if let Err(source) = pool.submit(processor, QueuePriority::High, ExecPriority::High, None)
        {
            // The notifier may still be queued; it exits as soon as it runs
            error!("Failed to dispatch processor task: {}", source);
            drop(shutdown_tx);
            shared.semaphore.close();
            return Err(CaptureError::Dispatch {
                task: "processor",
                source,
            });
        }

        info!(
            "Audio recorder initialized: {} samples/channel, {} Hz",
            config.buffer_len, config.sample_rate
        );

        Ok(Self {
            config,
            shared,
            source,
            interrupts,
            control: Mutex::new(Lifecycle {
                shutdown: Some(shutdown_tx),
                tasks: Some(tasks),
            }),
        })
    }

    fn control(&self) -> MutexGuard<'_, Lifecycle> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach a consumer for converted half-blocks, replacing any previous one
    pub fn set_block_sink(&self, sink: Box<dyn BlockSink>) {
        *self.shared.sink() = Some(sink);
    }

    /// Configure both channels and start both transfers
    ///
    /// A no-op while already recording. On failure nothing is retried and a
    /// transfer that already started keeps running.
    pub fn start(&self) -> Result<(), CaptureError> {
        let control = self.control();
        if control.tasks.is_none() {
            return Err(CaptureError::Closed);
        }
        if self.is_recording() {
            warn!("Audio recording already started");
            return Ok(());
        }

        info!("Starting audio recording...");

        for channel in [Channel::Left, Channel::Right] {
            self.source.configure_channel(channel).map_err(|e| {
                error!("{}", e);
                CaptureError::Hardware(e)
            })?;
        }

        for channel in [Channel::Right, Channel::Left] {
            let buffer = match channel {
                Channel::Left => Arc::clone(&self.shared.buffers.left),
                Channel::Right => Arc::clone(&self.shared.buffers.right),
            };
            self.source
                .start_continuous(channel, buffer, self.config.buffer_len, self.interrupts.clone())
                .map_err(|e| {
                    error!("{}", e);
                    CaptureError::Hardware(e)
                })?;
        }

        self.shared.recording.store(true, Ordering::Release);
        drop(control);

        info!("Audio recording started");
        Ok(())
    }

    /// Halt both transfers; a no-op when not recording
    pub fn stop(&self) {
        let _control = self.control();
        self.stop_locked();
    }

    fn stop_locked(&self) {
        if !self.is_recording() {
            debug!("Audio recording not active");
            return;
        }

        info!("Stopping audio recording...");
        self.source.stop();
        self.shared.recording.store(false, Ordering::Release);
        self.shared.buffers.state.store(BufferState::Empty);
        info!("Audio recording stopped");
    }

    /// Stop recording and end both stream tasks
    ///
    /// Returns once the notifier and processor have exited, so their pool
    /// workers are free again. Later calls do nothing.
    pub fn deinit(&self) {
        let mut control = self.control();
        let Some(tasks) = control.tasks.take() else {
            return;
        };

        info!("Deinitializing audio recorder...");
        self.stop_locked();

        drop(control.shutdown.take());
        self.shared.semaphore.close();
        tasks.wait();

        if let Some(mut sink) = self.shared.sink().take() {
            if let Err(e) = sink.finish() {
                error!("Failed to finish block sink: {}", e);
            }
        }

        info!("Audio recorder deinitialized");
    }

    pub fn is_recording(&self) -> bool {
        self.shared.recording.load(Ordering::Acquire)
    }

    pub fn buffer_state(&self) -> BufferState {
        self.shared.buffers.state.load()
    }

    /// Interrupt entry points, for sources that deliver callbacks themselves
    pub fn interrupts(&self) -> TransferInterrupts {
        self.interrupts.clone()
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Copy of the whole interleaved output buffer
    pub fn output_snapshot(&self) -> Vec<i16> {
        self.shared.buffers.output.snapshot()
    }

    pub fn stats(&self) -> RecorderStats {
        let c = &self.shared.counters;
        RecorderStats {
            events_dropped: c.events_dropped.load(Ordering::Relaxed),
            events_received: c.events_received.load(Ordering::Relaxed),
            releases_coalesced: c.releases_coalesced.load(Ordering::Relaxed),
            blocks_processed: c.blocks_processed.load(Ordering::Relaxed),
            units_discarded: c.units_discarded.load(Ordering::Relaxed),
        }
    }
}

impl Drop for AudioRecorder {
    fn drop(&mut self) {
        self.deinit();
    }
}

/// Turn transfer events into semaphore releases until shutdown
fn notifier_loop(shared: &RecorderShared, events: &Receiver<TransferEvent>, shutdown: &Receiver<()>) {
    info!("Audio notifier task started");

    loop {
        let event = crossbeam::select! {
            recv(events) -> event => event.ok(),
            recv(shutdown) -> _ => None,
        };
        let Some(event) = event else { break };

        shared.counters.events_received.fetch_add(1, Ordering::Relaxed);
        debug!("Transfer event: {:?}", event);
        if !shared.semaphore.release() {
            shared.counters.releases_coalesced.fetch_add(1, Ordering::Relaxed);
        }
    }

    info!("Audio notifier task exiting");
}

/// Convert the completed half on every hand-off until the semaphore closes
fn processor_loop(shared: &RecorderShared) {
    info!("Audio processor task started");
    let buffers = &shared.buffers;
    let len = buffers.len();

    while shared.semaphore.acquire() {
        if !shared.recording.load(Ordering::Acquire) {
            shared.counters.units_discarded.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        // Half follows the state at this moment; a later interrupt may already have moved it
        let range = Half::for_state(buffers.state.load()).range(len);
        interleave_range(&buffers.left, &buffers.right, &buffers.output, range.clone());
        shared.counters.blocks_processed.fetch_add(1, Ordering::Relaxed);
        debug!("Processed samples {}..{}", range.start, range.end);

        let mut sink = shared.sink();
        if let Some(block_sink) = sink.as_mut() {
            let block = buffers.output.snapshot_range(2 * range.start..2 * range.end);
            if let Err(e) = block_sink.write_block(&block) {
                error!("Block sink failed, detaching it: {}", e);
                *sink = None;
            }
        }
    }

    info!("Audio processor task exiting");
}
