//! Runtime configuration utilities for claims-signal.

use std::{env, path::PathBuf};

use anyhow::Context;
use serde::Serialize;
use tracing::warn;

use crate::signals::{history::DEFAULT_WINDOW_DAYS, DetectorConfig, PairDedup, WindowConfig};

/// Application configuration resolved from `.env` and defaults.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    /// Root folder holding `mappings/` and `raw/` claims extracts.
    pub data_dir: PathBuf,
    /// Root folder for output tables.
    pub outputs_dir: PathBuf,
    /// Days before a prescription searched for pre-existing diagnoses.
    pub lookback_days: u32,
    /// Days after a prescription searched for new diagnoses.
    pub lookahead_days: u32,
    /// Pair de-duplication policy.
    pub pair_dedup: PairDedup,
    /// Scan patients in parallel.
    pub parallel: bool,
}

impl Settings {
    /// Load configuration from environment with reasonable defaults.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let data_dir = env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));
        let outputs_dir = env::var("OUTPUTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./outputs"));
        let lookback_days = env::var("SIGNAL_LOOKBACK_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_WINDOW_DAYS);
        let lookahead_days = env::var("SIGNAL_LOOKAHEAD_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_WINDOW_DAYS);
        let pair_dedup = match env::var("SIGNAL_PAIR_DEDUP") {
            Ok(value) => value.parse::<PairDedup>().unwrap_or_else(|err| {
                warn!(%err, "falling back to no pair de-duplication");
                PairDedup::None
            }),
            Err(_) => PairDedup::None,
        };
        let parallel = env::var("SIGNAL_PARALLEL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(true);

        WindowConfig::new(lookback_days, lookahead_days).context("validating signal window")?;
        std::fs::create_dir_all(&outputs_dir).context("creating outputs dir")?;

        Ok(Self {
            data_dir,
            outputs_dir,
            lookback_days,
            lookahead_days,
            pair_dedup,
            parallel,
        })
    }

    /// Detector configuration implied by these settings.
    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            window: WindowConfig {
                lookback_days: self.lookback_days,
                lookahead_days: self.lookahead_days,
            },
            dedup: self.pair_dedup,
            parallel: self.parallel,
        }
    }
}
