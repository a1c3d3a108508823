//! CLI entry-point for inspecting a single patient.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Args as ClapArgs;
use tracing::instrument;

use crate::{
    cli::DetectorArgs,
    config::Settings,
    data,
    signals::{PatientHistory, SignalDetector},
};

/// Args for the `patient` sub-command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// Patient identifier as it appears in the claims extracts.
    #[arg(long)]
    pub id: String,
    /// Data directory holding `mappings/` and `raw/`; defaults to DATA_DIR.
    pub source: Option<PathBuf>,
    #[command(flatten)]
    pub detector: DetectorArgs,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let source = args.source.unwrap_or_else(|| settings.data_dir.clone());
    let mut extract = data::load_claims(&source)
        .with_context(|| format!("loading claims from {}", source.display()))?;
    let records = extract
        .records_by_patient
        .remove(&args.id)
        .ok_or_else(|| anyhow!("patient {} not found in {}", args.id, source.display()))?;

    let mut config = settings.detector_config();
    args.detector.apply(&mut config)?;
    let mut detector = SignalDetector::new(config);
    detector.append_history(PatientHistory::new(args.id.as_str(), records)?)?;
    for history in detector.histories() {
        for record in history.records() {
            println!("{record}");
        }
        for pair in detector.patient_pairs(history) {
            println!("signal {pair}");
        }
    }
    Ok(())
}
