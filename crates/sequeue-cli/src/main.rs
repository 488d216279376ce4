use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tokio::time::{Duration, Instant, sleep};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sequeue_core::{
    FailurePolicy, HandlerError, IntervalMode, ItemHandler, QueueConfig, QueueStats,
    SequentialQueue,
};

/// Drain simulated work items through a sequential queue.
#[derive(Debug, Parser)]
#[command(name = "sequeue", version)]
struct Args {
    /// JSON queue config; flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    name: Option<String>,

    /// Minimum spacing between cycle starts, in milliseconds.
    #[arg(long)]
    interval_ms: Option<u64>,

    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Make the handler fail on items with this value.
    #[arg(long)]
    fail_on: Option<u64>,

    /// Keep draining after a handler failure instead of stopping.
    #[arg(long)]
    keep_going: bool,

    /// Work items: each one takes this many milliseconds to handle.
    #[arg(default_values_t = [500u64, 400])]
    items: Vec<u64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Compensated,
    Fixed,
}

impl From<Mode> for IntervalMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Compensated => IntervalMode::Compensated,
            Mode::Fixed => IntervalMode::Fixed,
        }
    }
}

/// Handler that sleeps for the item's value.
struct SimulatedWork {
    started: Instant,
    fail_on: Option<u64>,
}

#[async_trait]
impl ItemHandler<u64> for SimulatedWork {
    async fn handle(&self, item: &u64) -> Result<(), HandlerError> {
        let at = millis(self.started.elapsed());
        info!(item, at_ms = at, "work started");

        if self.fail_on == Some(*item) {
            return Err(HandlerError::new(format!("intentional failure on {item}")));
        }

        sleep(Duration::from_millis(*item)).await;
        info!(item, "work finished");
        Ok(())
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Serialize)]
struct Report {
    elapsed_ms: u64,
    stats: QueueStats,
}

fn load_config(args: &Args) -> anyhow::Result<QueueConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            QueueConfig::from_json_str(&json)?
        }
        None => QueueConfig::new("cli"),
    };

    if let Some(name) = &args.name {
        config.name = name.clone();
    }
    if let Some(interval_ms) = args.interval_ms {
        config.interval_ms = interval_ms;
    }
    if let Some(mode) = args.mode {
        config.interval_mode = mode.into();
    }
    if args.keep_going {
        config.on_failure = FailurePolicy::Continue;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,sequeue_core=debug".into()),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    info!(?config, items = ?args.items, "starting queue");

    let started = Instant::now();
    let queue = SequentialQueue::new(args.items.clone(), config);
    queue.on_item(SimulatedWork {
        started,
        fail_on: args.fail_on,
    });

    queue.on_done(|| info!("queue drained"));

    let result = queue.dequeue().await;

    let report = Report {
        elapsed_ms: millis(started.elapsed()),
        stats: queue.stats(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    result.context("draining queue")
}
