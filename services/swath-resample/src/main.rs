//! Swath resample command.
//!
//! Resamples one raw swath band onto a projected grid described by a
//! YAML run file, writing a raw image plus a JSON header.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use swath_resample::RunConfig;
use swath_resampler::{Pipeline, RawFileSink, RunContext};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "swath-resample")]
#[command(about = "Resample satellite swath scans onto a projected grid")]
struct Args {
    /// Run file path
    run_file: PathBuf,

    /// Directory for the tile scratch file (default: next to the output)
    #[arg(long, env = "SWATH_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Keep the tile scratch file after the run
    #[arg(long)]
    keep_scratch: bool,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    summary_json: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info", env = "SWATH_LOG_LEVEL")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder().with_max_level(level).with_target(true);
    if args.log_json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    let config = RunConfig::load(&args.run_file)?;
    info!(
        run_file = %args.run_file.display(),
        lines = config.input.lines,
        samples = config.input.samples,
        scan_height = config.input.scan_height,
        kernel = %config.resampler.kernel,
        "Loaded run file"
    );

    let grid = config.build_grid().context("Failed to build output grid")?;
    info!(
        lines = grid.lines,
        samples = grid.samples,
        upper_left_x = grid.upper_left_x,
        upper_left_y = grid.upper_left_y,
        "Output grid"
    );

    let scratch_dir = args
        .scratch_dir
        .clone()
        .or_else(|| config.output.path.parent().map(|p| p.to_path_buf()))
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(std::env::temp_dir);
    let mut ctx = RunContext::new(scratch_dir);
    ctx.keep_scratch = args.keep_scratch;

    let pipeline = Pipeline::new(
        ctx,
        config.resampler.clone(),
        grid,
        config.output.projection.clone(),
    )?;
    let mut source = config.open_source()?;
    let mut geolocation = config.open_geolocation()?;
    let mut sink = RawFileSink::create(&config.output.path)
        .with_context(|| format!("Failed to create output {:?}", config.output.path))?;

    let summary = pipeline.run(&mut source, &mut geolocation, &mut sink)?;

    if let Some(path) = &args.summary_json {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write summary {:?}", path))?;
    }

    info!(
        output = %config.output.path.display(),
        bytes = sink.bytes_written(),
        pixel_hits = summary.scatter.pixel_hits,
        elapsed_ms = summary.elapsed_ms,
        "Done"
    );
    Ok(())
}
