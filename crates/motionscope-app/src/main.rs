//! MotionScope - adaptive motion-analysis pipeline
//!
//! Headless entry point: runs the pipeline over a synthetic source at a
//! fixed tick rate and optionally exports a metrics snapshot.

mod cli;

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser;
use motionscope_pipeline::{
    run_fixed_rate, ExportSnapshot, NullSink, Pipeline, PipelineConfig, SyntheticSource,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::cli::Cli;

fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    let threads = cli.threads.unwrap_or_else(num_cpus::get).max(1);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .context("failed to configure rayon thread pool")?;

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;

    info!(
        width = cli.width,
        height = cli.height,
        frames = cli.frames,
        fps = cli.fps,
        threads,
        "MotionScope starting"
    );

    let mut pipeline = Pipeline::new(config).context("failed to build pipeline")?;
    let mut source = SyntheticSource::new(cli.width, cli.height, cli.fps, Some(cli.frames));
    let mut sink = NullSink;

    let summary = run_fixed_rate(&mut pipeline, &mut source, &mut sink, cli.fps, None);
    let metrics = &pipeline.state().metrics;
    info!(
        processed = summary.processed,
        skipped = summary.skipped,
        dropped = metrics.total_dropped(),
        avg_ms = metrics.average_ms(),
        "done"
    );

    if let Some(path) = &cli.export {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        ExportSnapshot::capture(&pipeline, timestamp)
            .write_to(path)
            .with_context(|| format!("failed to write export {}", path.display()))?;
        info!(path = %path.display(), "metrics exported");
    }

    Ok(())
}
