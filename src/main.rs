use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use jankwatch::duration::format_duration;
use jankwatch::{load_trace, Replay, Report, Settings};

#[derive(Parser, Debug)]
#[command(name = "jankwatch")]
#[command(about = "Replay a recorded frame trace and report slow and frozen frames per span")]
struct Args {
    /// Path to a JSON-lines frame trace
    #[arg(short, long)]
    trace: PathBuf,

    /// Settings file (TOML); JANKWATCH_* environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the JSON report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Omit per-frame records from the report
    #[arg(long)]
    spans_only: bool,

    /// Frozen frame threshold (e.g., "700ms", "1s")
    #[arg(long)]
    frozen_threshold: Option<String>,

    /// Frame budget assumed before any frame is seen (e.g., "16.6ms", "120hz")
    #[arg(long)]
    frame_budget: Option<String>,

    /// Maximum jank frames buffered per span
    #[arg(long)]
    max_events: Option<usize>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut settings = Settings::load(args.config.as_deref())?;
    if args.spans_only {
        settings.spans_only = true;
    }
    if let Some(threshold) = args.frozen_threshold {
        settings.frozen_threshold = Some(threshold);
    }
    if let Some(budget) = args.frame_budget {
        settings.default_frame_duration = Some(budget);
    }
    if let Some(max_events) = args.max_events {
        settings.max_events = Some(max_events);
    }
    let config = settings.jank_config()?;

    let records = load_trace(&args.trace)?;
    info!(records = records.len(), trace = %args.trace.display(), "replaying trace");

    let (results, stats) = Replay::run(config, &records);
    let report = Report::new(results, stats, settings.spans_only);
    info!(
        spans = report.summary.spans,
        slow = report.summary.slow_frames,
        frozen = report.summary.frozen_frames,
        delay = %format_duration(Duration::from_nanos(report.summary.total_delay_ns)),
        "replay finished"
    );

    report
        .write(args.output.as_deref())
        .context("failed to emit report")
}

/// Log to stderr so the report on stdout stays machine readable
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}
