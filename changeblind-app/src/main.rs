//! Headless change-blindness runner.
//!
//! Drives a full session against a simulated participant and writes one JSON
//! line per finalized trial.

mod app;
mod participant;
mod sinks;

use std::path::PathBuf;

use anyhow::{Context, Result};
use changeblind_experiment::ExperimentConfig;
use changeblind_timing::{HighPrecisionTimer, ManualTimer};
use clap::Parser;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use app::App;

#[derive(Parser)]
#[command(name = "changeblind")]
#[command(version)]
#[command(about = "Change-blindness experiment runner")]
struct Cli {
    /// JSON configuration; missing fields take their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output file for trial results (JSON lines)
    #[arg(long, default_value = "results.jsonl")]
    output: PathBuf,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Probability that the simulated participant clicks the changed sphere
    #[arg(long, default_value = "0.7")]
    accuracy: f64,

    /// Pace frames against the wall clock instead of a simulated clock
    #[arg(long)]
    realtime: bool,

    /// Frame duration in milliseconds
    #[arg(long, default_value = "16")]
    frame_ms: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    let config = match &cli.config {
        Some(path) => ExperimentConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ExperimentConfig::default(),
    };
    let seed = cli.seed.unwrap_or_else(rand::random);
    info!(seed, output = %cli.output.display(), realtime = cli.realtime, "starting session");

    let summary = if cli.realtime {
        App::new(config, HighPrecisionTimer::new(), &cli.output, seed, cli.accuracy)?
            .with_frame_ms(cli.frame_ms)
            .run()?
    } else {
        App::new(config, ManualTimer::new(), &cli.output, seed, cli.accuracy)?
            .with_frame_ms(cli.frame_ms)
            .run()?
    };

    info!(
        trials = summary.trials,
        aborted = summary.aborted,
        hits = summary.hits,
        misses = summary.misses,
        no_response = summary.no_response,
        low_cues = summary.low_cues,
        high_cues = summary.high_cues,
        frames = summary.frames,
        "session finished"
    );
    if cli.realtime {
        let stats = &summary.frame_stats;
        info!(
            avg_ms = stats.average_frame_time_ns / 1e6,
            jitter_ms = stats.jitter_ns / 1e6,
            fps = stats.effective_fps,
            "frame timing"
        );
    }
    Ok(())
}
