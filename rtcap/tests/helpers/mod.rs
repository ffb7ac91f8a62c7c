//! Shared helpers for rtcap integration tests
//!
//! - `hold_worker`: occupy one pool worker until released
//! - `wait_until`: poll a condition with a deadline
//! - `ManualSource`: streaming source driven by the test itself

#![allow(dead_code)]

use rtcap::capture::{Channel, DmaBuffer, HardwareError, StreamingSource, TransferInterrupts};
use rtcap::os::ExecPriority;
use rtcap::pool::{QueuePriority, ThreadPool, ThreadPoolConfig};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Pool config for tests: no idle-thread coordination unless asked for
pub fn test_pool_config(threads: usize, queue: usize) -> ThreadPoolConfig {
    ThreadPoolConfig {
        thread_count: threads,
        queue_size: queue,
        low_power_mode: false,
        ..Default::default()
    }
}

/// Submit a task that blocks its worker; returns once the task is running
///
/// The worker is released when the returned sender is used or dropped.
pub fn hold_worker(pool: &ThreadPool) -> mpsc::Sender<()> {
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    pool.submit(
        move || {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
        },
        QueuePriority::Critical,
        ExecPriority::Normal,
        Some(Duration::from_secs(1)),
    )
    .expect("gate task submit");

    started_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("gate task did not start");
    release_tx
}

/// Poll `condition` every millisecond until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// Streaming source that records calls and lets tests write samples and
/// fire transfer callbacks by hand
#[derive(Default)]
pub struct ManualSource {
    configured: Mutex<Vec<Channel>>,
    started: Mutex<Vec<Channel>>,
    buffers: Mutex<HashMap<Channel, Arc<DmaBuffer>>>,
    interrupts: Mutex<Option<TransferInterrupts>>,
    stop_calls: AtomicUsize,
    fail_configure: Mutex<Option<Channel>>,
    fail_start: Mutex<Option<Channel>>,
}

impl ManualSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_configure_on(&self, channel: Channel) {
        *self.fail_configure.lock().unwrap() = Some(channel);
    }

    pub fn fail_start_on(&self, channel: Channel) {
        *self.fail_start.lock().unwrap() = Some(channel);
    }

    /// Channels configured, in call order
    pub fn configured(&self) -> Vec<Channel> {
        self.configured.lock().unwrap().clone()
    }

    /// Channels with a running transfer, in start order
    pub fn started(&self) -> Vec<Channel> {
        self.started.lock().unwrap().clone()
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    /// Write raw samples into a started channel's buffer
    pub fn fill(&self, channel: Channel, offset: usize, samples: &[i32]) {
        let buffers = self.buffers.lock().unwrap();
        let buffer = buffers.get(&channel).expect("channel not started");
        buffer.write_from(offset, samples);
    }

    pub fn half_transfer(&self) {
        self.interrupts().on_half_transfer();
    }

    pub fn full_transfer(&self) {
        self.interrupts().on_full_transfer();
    }

    fn interrupts(&self) -> TransferInterrupts {
        self.interrupts
            .lock()
            .unwrap()
            .clone()
            .expect("no transfer started")
    }
}

impl StreamingSource for ManualSource {
    fn configure_channel(&self, channel: Channel) -> Result<(), HardwareError> {
        if *self.fail_configure.lock().unwrap() == Some(channel) {
            return Err(HardwareError::Configure {
                channel,
                reason: "injected failure".to_string(),
            });
        }
        self.configured.lock().unwrap().push(channel);
        Ok(())
    }

    fn start_continuous(
        &self,
        channel: Channel,
        buffer: Arc<DmaBuffer>,
        _length: usize,
        interrupts: TransferInterrupts,
    ) -> Result<(), HardwareError> {
        if *self.fail_start.lock().unwrap() == Some(channel) {
            return Err(HardwareError::Start {
                channel,
                reason: "injected failure".to_string(),
            });
        }
        self.buffers.lock().unwrap().insert(channel, buffer);
        *self.interrupts.lock().unwrap() = Some(interrupts);
        self.started.lock().unwrap().push(channel);
        Ok(())
    }

    fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.started.lock().unwrap().clear();
    }
}
