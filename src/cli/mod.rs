//! Command-line interface wiring for claims-signal.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::{
    config::Settings,
    signals::{DetectorConfig, PairDedup, WindowConfig},
    SignalError,
};

pub mod detect;
pub mod ingest;
pub mod patient;

/// Top-level CLI definition.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Adverse drug event signal detection from claims data",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Parse CLI arguments from the environment.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Dispatch the selected sub-command.
    pub async fn dispatch(self, settings: Settings) -> Result<()> {
        match self.command {
            Commands::Ingest(args) => ingest::run(args, settings).await,
            Commands::Detect(args) => detect::run(args, settings).await,
            Commands::Patient(args) => patient::run(args, settings).await,
        }
    }
}

/// Supported sub-commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load and translate claims extracts, then report row accounting.
    Ingest(ingest::Args),
    /// Detect drug-condition signals and write count and leverage tables.
    Detect(detect::Args),
    /// Show one patient's ordered history and the pairs it emits.
    Patient(patient::Args),
}

/// Detector overrides shared by every sub-command that scans histories.
#[derive(Debug, Clone, Default, Args)]
pub struct DetectorArgs {
    /// Override days searched before each prescription.
    #[arg(long)]
    pub lookback_days: Option<u32>,
    /// Override days searched after each prescription.
    #[arg(long)]
    pub lookahead_days: Option<u32>,
    /// Override how recurring pairs are counted.
    #[arg(long, value_enum)]
    pub dedup: Option<PairDedup>,
}

impl DetectorArgs {
    /// Layer the flags given on the command line over `config`.
    pub fn apply(&self, config: &mut DetectorConfig) -> Result<(), SignalError> {
        let window = config.window;
        config.window = WindowConfig::new(
            self.lookback_days.unwrap_or(window.lookback_days),
            self.lookahead_days.unwrap_or(window.lookahead_days),
        )?;
        if let Some(dedup) = self.dedup {
            config.dedup = dedup;
        }
        Ok(())
    }
}
