//! rtcap - record simulated stereo capture through the worker pool
//!
//! Builds the pool and the recorder from configuration, records until the
//! requested duration elapses or Ctrl+C arrives, then tears both down and
//! prints run statistics as JSON on stdout.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rtcap::capture::{AudioRecorder, SimulatedSource, StreamingSource, WavBlockSink};
use rtcap::config::AppConfig;
use rtcap::pool::ThreadPool;
use rtcap_common::config::LoggingConfig;
use rtcap_common::logging::{ConsoleSink, FileSink, LogLevel, LogSink, SinkLayer, SinkRegistry};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Workers permanently held by the recorder's stream tasks
const RECORDER_WORKERS: usize = 2;

/// Command-line arguments for rtcap
#[derive(Parser, Debug)]
#[command(name = "rtcap")]
#[command(about = "Record stereo capture through a priority worker pool")]
#[command(version)]
struct Args {
    /// Config file (overrides RTCAP_CONFIG and the platform default)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many seconds instead of waiting for Ctrl+C
    #[arg(short, long, env = "RTCAP_DURATION_SECS")]
    duration_secs: Option<u64>,

    /// Write the interleaved capture to this WAV file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Worker thread count (overrides [pool] thread_count)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Minimum log level (overrides [logging] level)
    #[arg(long, env = "RTCAP_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Console sink first so configuration loading is visible
    let sinks = Arc::new(SinkRegistry::new(LogLevel::Debug));
    let console: Arc<dyn LogSink> = Arc::new(ConsoleSink::new(LogLevel::Debug));
    sinks
        .register(Arc::clone(&console))
        .context("Failed to register console sink")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rtcap=debug,rtcap_common=debug".into()),
        )
        .with(SinkLayer::new(Arc::clone(&sinks)))
        .init();

    let mut config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(threads) = args.threads {
        config.pool.thread_count = threads;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate().context("Invalid configuration")?;
    apply_logging(&sinks, &console, &config.logging)?;

    info!(
        "Starting rtcap: {} workers, {} samples/channel at {} Hz",
        config.pool.thread_count, config.recorder.buffer_len, config.recorder.sample_rate
    );
    if config.pool.thread_count <= RECORDER_WORKERS {
        warn!(
            "Only {} workers configured; the recorder occupies {}, leaving none for other tasks",
            config.pool.thread_count, RECORDER_WORKERS
        );
    }

    let pool = ThreadPool::new(config.pool.clone()).context("Failed to start thread pool")?;

    let source: Arc<dyn StreamingSource> =
        Arc::new(SimulatedSource::new(config.recorder.sample_rate));
    let recorder = AudioRecorder::init(source, &pool, config.recorder.clone())
        .context("Failed to initialize audio recorder")?;

    if let Some(path) = &args.output {
        let sink = WavBlockSink::create(path, config.recorder.sample_rate)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        recorder.set_block_sink(Box::new(sink));
        info!("Writing capture to {}", path.display());
    }

    recorder.start().context("Failed to start recording")?;

    wait_for_stop(args.duration_secs.map(Duration::from_secs)).await;

    recorder.deinit();
    pool.deinit(true);

    let summary = serde_json::json!({
        "recorder": recorder.stats(),
        "pool": {
            "state": pool.state(),
            "completed_tasks": pool.completed_tasks(),
            "panicked_tasks": pool.panicked_tasks(),
        },
        "log_write_failures": sinks.write_failures(),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("Failed to encode run summary")?
    );

    info!("Shutdown complete");
    sinks.close_all();
    Ok(())
}

/// Apply the `[logging]` section to the sink registry
fn apply_logging(
    sinks: &SinkRegistry,
    console: &Arc<dyn LogSink>,
    logging: &LoggingConfig,
) -> Result<()> {
    let level = logging.min_level()?;
    sinks.set_min_level(level);
    console.set_level(level);

    if !logging.console {
        sinks.unregister(console);
    }

    if let Some(path) = &logging.file {
        let file_sink = FileSink::open(path, level)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        sinks.register(Arc::new(file_sink))?;
    }
    Ok(())
}

/// Wait for the run duration to elapse or for Ctrl+C
async fn wait_for_stop(duration: Option<Duration>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    match duration {
        Some(duration) => {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {
                    info!("Recording duration of {:?} elapsed", duration);
                },
                _ = ctrl_c => {
                    info!("Received Ctrl+C, shutting down");
                },
            }
        }
        None => {
            info!("Recording until Ctrl+C");
            ctrl_c.await;
            info!("Received Ctrl+C, shutting down");
        }
    }
}
