//! Integration tests for the audio recorder pipeline
//!
//! Most tests drive a `ManualSource` so samples and transfer callbacks are
//! under test control; the last group runs the simulated source end to end.

mod helpers;

use helpers::{hold_worker, test_pool_config, wait_until, ManualSource};
use rtcap::capture::{
    AudioRecorder, BlockSink, BufferState, CaptureError, Channel, HardwareError, RecorderConfig,
    SimulatedSource, StreamingSource,
};
use rtcap::pool::{SubmitError, ThreadPool};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

fn small_config(buffer_len: usize) -> RecorderConfig {
    RecorderConfig {
        buffer_len,
        ..Default::default()
    }
}

fn setup(buffer_len: usize) -> (ThreadPool, Arc<ManualSource>, AudioRecorder) {
    let pool = ThreadPool::new(test_pool_config(3, 8)).unwrap();
    let source = ManualSource::new();
    let recorder = AudioRecorder::init(
        Arc::clone(&source) as Arc<dyn StreamingSource>,
        &pool,
        small_config(buffer_len),
    )
    .unwrap();
    (pool, source, recorder)
}

fn teardown(pool: ThreadPool, recorder: AudioRecorder) {
    recorder.deinit();
    pool.deinit(true);
}

// ============================================================================
// Conversion and interleaving
// ============================================================================

#[test]
fn test_extreme_samples_saturate() {
    let (pool, source, recorder) = setup(8);
    recorder.start().unwrap();

    source.fill(Channel::Left, 0, &[0x7FFF_FFFF; 4]);
    source.fill(Channel::Right, 0, &[i32::MIN; 4]);
    source.half_transfer();

    assert!(wait_until(WAIT, || recorder.stats().blocks_processed == 1));
    let output = recorder.output_snapshot();
    for frame in output[..8].chunks(2) {
        assert_eq!(frame, [32767, -32768]);
    }

    teardown(pool, recorder);
}

#[test]
fn test_full_transfer_processes_second_half() {
    let (pool, source, recorder) = setup(8);
    recorder.start().unwrap();

    source.fill(Channel::Left, 4, &[0x100, 0x200, 0x300, 0x400]);
    source.fill(Channel::Right, 4, &[-0x100, -0x200, -0x300, -0x400]);
    source.full_transfer();

    assert!(wait_until(WAIT, || recorder.stats().blocks_processed == 1));
    assert_eq!(recorder.buffer_state(), BufferState::Full);
    assert_eq!(
        recorder.output_snapshot(),
        vec![0, 0, 0, 0, 0, 0, 0, 0, 1, -1, 2, -2, 3, -3, 4, -4]
    );

    teardown(pool, recorder);
}

#[test]
fn test_block_sink_receives_each_half() {
    struct Collect(Arc<Mutex<Vec<Vec<i16>>>>);

    impl BlockSink for Collect {
        fn write_block(&mut self, samples: &[i16]) -> Result<(), CaptureError> {
            self.0.lock().unwrap().push(samples.to_vec());
            Ok(())
        }
    }

    let (pool, source, recorder) = setup(4);
    let blocks = Arc::new(Mutex::new(Vec::new()));
    recorder.set_block_sink(Box::new(Collect(Arc::clone(&blocks))));
    recorder.start().unwrap();

    source.fill(Channel::Left, 0, &[0x100, 0x200]);
    source.fill(Channel::Right, 0, &[0x300, 0x400]);
    source.half_transfer();
    assert!(wait_until(WAIT, || blocks.lock().unwrap().len() == 1));

    source.fill(Channel::Left, 2, &[0x500, 0x600]);
    source.fill(Channel::Right, 2, &[0x700, 0x800]);
    source.full_transfer();
    assert!(wait_until(WAIT, || blocks.lock().unwrap().len() == 2));

    assert_eq!(
        *blocks.lock().unwrap(),
        vec![vec![1, 3, 2, 4], vec![5, 7, 6, 8]]
    );

    teardown(pool, recorder);
}

// ============================================================================
// Start / stop
// ============================================================================

#[test]
fn test_start_order_and_repeat_start_is_noop() {
    let (pool, source, recorder) = setup(8);

    recorder.start().unwrap();
    assert!(recorder.is_recording());
    assert_eq!(source.configured(), vec![Channel::Left, Channel::Right]);
    assert_eq!(source.started(), vec![Channel::Right, Channel::Left]);

    recorder.start().unwrap();
    assert_eq!(source.configured().len(), 2);
    assert_eq!(source.started().len(), 2);

    teardown(pool, recorder);
}

#[test]
fn test_stop_when_idle_is_noop() {
    let (pool, source, recorder) = setup(8);

    recorder.stop();
    assert_eq!(source.stop_calls(), 0);

    recorder.start().unwrap();
    source.half_transfer();
    recorder.stop();
    recorder.stop();
    assert_eq!(source.stop_calls(), 1);
    assert!(!recorder.is_recording());
    assert_eq!(recorder.buffer_state(), BufferState::Empty);

    teardown(pool, recorder);
}

#[test]
fn test_start_failure_leaves_sibling_running() {
    let (pool, source, recorder) = setup(8);
    source.fail_start_on(Channel::Left);

    let err = recorder.start().unwrap_err();
    assert!(matches!(
        err,
        CaptureError::Hardware(HardwareError::Start {
            channel: Channel::Left,
            ..
        })
    ));
    assert!(!recorder.is_recording());
    assert_eq!(source.started(), vec![Channel::Right]);

    teardown(pool, recorder);
}

#[test]
fn test_configure_failure_starts_nothing() {
    let (pool, source, recorder) = setup(8);
    source.fail_configure_on(Channel::Right);

    let err = recorder.start().unwrap_err();
    assert!(matches!(
        err,
        CaptureError::Hardware(HardwareError::Configure {
            channel: Channel::Right,
            ..
        })
    ));
    assert!(source.started().is_empty());
    assert!(!recorder.is_recording());

    teardown(pool, recorder);
}

#[test]
fn test_start_after_deinit_is_rejected() {
    let (pool, _source, recorder) = setup(8);
    recorder.deinit();
    assert!(matches!(recorder.start(), Err(CaptureError::Closed)));
    pool.deinit(true);
}

// ============================================================================
// Hand-off accounting
// ============================================================================

#[test]
fn test_events_beyond_capacity_are_dropped() {
    // Single worker held busy: the notifier is queued and cannot drain events
    let pool = ThreadPool::new(test_pool_config(1, 8)).unwrap();
    let gate = hold_worker(&pool);

    let source = ManualSource::new();
    let recorder = AudioRecorder::init(
        Arc::clone(&source) as Arc<dyn StreamingSource>,
        &pool,
        small_config(8),
    )
    .unwrap();

    let interrupts = recorder.interrupts();
    for _ in 0..15 {
        interrupts.on_half_transfer();
    }
    assert_eq!(recorder.stats().events_dropped, 5);

    drop(gate);
    assert!(wait_until(WAIT, || recorder.stats().events_received == 10));

    teardown(pool, recorder);
}

#[test]
fn test_handoff_discarded_when_not_recording() {
    let (pool, _source, recorder) = setup(8);

    recorder.interrupts().on_half_transfer();
    assert!(wait_until(WAIT, || recorder.stats().units_discarded == 1));
    assert_eq!(recorder.stats().blocks_processed, 0);
    assert_eq!(recorder.buffer_state(), BufferState::HalfFull);

    teardown(pool, recorder);
}

#[test]
fn test_deinit_releases_pool_workers() {
    let (pool, _source, recorder) = setup(8);
    assert!(wait_until(WAIT, || pool.active_count() == 2));

    recorder.deinit();
    assert!(wait_until(WAIT, || pool.is_idle()));
    pool.deinit(true);
}

#[test]
fn test_init_fails_when_pool_stopped() {
    let pool = ThreadPool::new(test_pool_config(2, 4)).unwrap();
    pool.deinit(true);

    let result = AudioRecorder::init(ManualSource::new(), &pool, small_config(8));
    assert!(matches!(
        result,
        Err(CaptureError::Dispatch {
            task: "notifier",
            source: SubmitError::Shutdown
        })
    ));
}

#[test]
fn test_init_fails_when_processor_cannot_queue() {
    let pool = ThreadPool::new(test_pool_config(1, 1)).unwrap();
    let gate = hold_worker(&pool);

    let result = AudioRecorder::init(ManualSource::new(), &pool, small_config(8));
    assert!(matches!(
        result,
        Err(CaptureError::Dispatch {
            task: "processor",
            source: SubmitError::QueueFull
        })
    ));

    drop(gate);
    assert!(wait_until(WAIT, || pool.is_idle() && pool.queue_len() == 0));
    pool.deinit(true);
}

#[test]
fn test_invalid_config_rejected() {
    let pool = ThreadPool::new(test_pool_config(2, 4)).unwrap();
    let result = AudioRecorder::init(ManualSource::new(), &pool, small_config(0));
    assert!(matches!(result, Err(CaptureError::InvalidConfig(_))));
    pool.deinit(true);
}

// ============================================================================
// Simulated source
// ============================================================================

#[test]
fn test_simulated_source_end_to_end() {
    let pool = ThreadPool::new(test_pool_config(3, 8)).unwrap();
    let source = Arc::new(SimulatedSource::new(16_000));
    let recorder = AudioRecorder::init(
        Arc::clone(&source) as Arc<dyn StreamingSource>,
        &pool,
        small_config(256),
    )
    .unwrap();

    recorder.start().unwrap();
    assert!(wait_until(WAIT, || recorder.stats().blocks_processed >= 4));
    recorder.stop();
    assert!(source.running_channels().is_empty());

    let output = recorder.output_snapshot();
    assert!(output.iter().any(|&s| s != 0));
    assert!(output.iter().all(|&s| (-16_384..=16_384).contains(&s)));

    teardown(pool, recorder);
}
