//! CLI entry-point for the full detection pipeline.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::{info, instrument};

use crate::{
    cli::DetectorArgs,
    config::Settings,
    signals::{self, ExportFormat, RunOptions},
};

/// Args for the `detect` sub-command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// Data directory holding `mappings/` and `raw/`; defaults to DATA_DIR.
    pub source: Option<PathBuf>,
    #[command(flatten)]
    pub detector: DetectorArgs,
    /// Output table encoding.
    #[arg(long, value_enum, default_value = "csv")]
    pub format: ExportFormat,
    /// Scan patients one at a time.
    #[arg(long)]
    pub sequential: bool,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let mut options = RunOptions::from_settings(&settings);
    if let Some(source) = args.source {
        options.source = source;
    }
    args.detector.apply(&mut options.detector)?;
    if args.sequential {
        options.detector.parallel = false;
    }
    options.format = args.format;
    info!(
        source = %options.source.display(),
        lookback_days = options.detector.window.lookback_days,
        lookahead_days = options.detector.window.lookahead_days,
        dedup = %options.detector.dedup,
        "running detection"
    );

    let summary = signals::compute(&settings, options).await?;
    info!(
        patients = summary.patients,
        total_pairs = summary.total_pairs,
        distinct_pairs = summary.distinct_pairs,
        "detection finished"
    );
    Ok(())
}
