//! Signal detection and aggregation layer.

pub mod counts;
pub mod detector;
pub mod export;
pub mod history;
pub mod leverage;

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    config::Settings,
    data::{self, IngestReport},
    error::SignalError,
};

pub use counts::{SignalCounts, SignalPair};
pub use detector::{DetectorConfig, PairDedup, SignalDetector};
pub use export::{ExportFormat, TableWriter};
pub use history::{PatientHistory, WindowConfig};

/// Everything one detection run needs besides the output location.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub source: PathBuf,
    pub detector: DetectorConfig,
    pub format: ExportFormat,
}

impl RunOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            source: settings.data_dir.clone(),
            detector: settings.detector_config(),
            format: ExportFormat::Csv,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PhaseTimings {
    pub fetch_ms: u64,
    pub detect_ms: u64,
    pub write_ms: u64,
}

/// Machine-readable record of a finished (or leverage-failed) run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub source: PathBuf,
    pub detector: DetectorConfig,
    pub format: ExportFormat,
    pub ingest: IngestReport,
    pub patients: usize,
    pub total_pairs: u64,
    pub distinct_pairs: usize,
    pub leverage_written: bool,
    pub timings: PhaseTimings,
}

/// Leverage for a counted run.
///
/// A run without patients yields an empty table rather than an error so that
/// all-excluded inputs still produce (empty) outputs.
pub fn score(
    detector: &SignalDetector,
    counts: &SignalCounts,
) -> Result<HashMap<SignalPair, f64>, SignalError> {
    if detector.histories().is_empty() {
        warn!(err = %SignalError::EmptyPopulation, "writing empty tables");
        return Ok(HashMap::new());
    }
    detector.compute_leverage(counts)
}

/// Full pipeline: ingest claims, build histories, count, score, export.
///
/// Count tables are written even when leverage is undefined; the leverage
/// table is not, and the leverage error is returned after the summary is saved.
pub fn run_pipeline(options: &RunOptions, outputs_dir: &Path) -> Result<RunSummary> {
    let started = Instant::now();
    let extract = data::load_claims(&options.source)
        .with_context(|| format!("loading claims from {}", options.source.display()))?;
    let fetch_ms = elapsed_ms(started);
    info!(elapsed_ms = fetch_ms, "fetched claims");

    let started = Instant::now();
    let mut detector = SignalDetector::new(options.detector);
    let patients = detector.build_histories(extract.records_by_patient)?;
    let counts = detector.accumulate_counts();
    let leverage = score(&detector, &counts);
    let detect_ms = elapsed_ms(started);
    info!(elapsed_ms = detect_ms, "detected drug condition pairs");

    let started = Instant::now();
    let writer = TableWriter::new(outputs_dir, options.format);
    writer.write_counts(&counts)?;
    let leverage_written = match &leverage {
        Ok(table) => {
            writer.write_leverage(table)?;
            true
        }
        Err(err) => {
            warn!(%err, "leverage table not written");
            writer.clear_leverage()?;
            false
        }
    };
    let summary = RunSummary {
        source: options.source.clone(),
        detector: options.detector,
        format: options.format,
        ingest: extract.report,
        patients,
        total_pairs: counts.total_pairs(),
        distinct_pairs: counts.pair_count().len(),
        leverage_written,
        timings: PhaseTimings {
            fetch_ms,
            detect_ms,
            write_ms: elapsed_ms(started),
        },
    };
    writer.write_summary(&summary)?;
    info!(elapsed_ms = summary.timings.write_ms, "wrote results");

    leverage.context("computing leverage")?;
    Ok(summary)
}

/// Async entry point used by the `detect` command.
pub async fn compute(settings: &Settings, options: RunOptions) -> Result<RunSummary> {
    let outputs_dir = settings.outputs_dir.clone();
    tokio::task::spawn_blocking(move || run_pipeline(&options, &outputs_dir))
        .await
        .context("detection task aborted")?
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
