//! CLI entry-point for loading claims without running detection.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::{info, instrument};

use crate::{config::Settings, data};

/// Args for the `ingest` sub-command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// Data directory holding `mappings/` and `raw/`; defaults to DATA_DIR.
    pub source: Option<PathBuf>,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let source = args.source.unwrap_or(settings.data_dir);
    let extract = data::load_claims(&source)
        .with_context(|| format!("loading claims from {}", source.display()))?;
    let report = &extract.report;
    info!(
        source = %source.display(),
        prescription_rows = report.prescription_rows,
        diagnosis_rows = report.diagnosis_rows,
        rejected_rows = report.rejected_rows,
        dropped_prescriptions = report.dropped_prescriptions,
        dropped_diagnoses = report.dropped_diagnoses,
        records = report.records,
        patients = report.patients,
        "ingested claims"
    );
    Ok(())
}
