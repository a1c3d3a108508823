//! Population-wide orchestration: histories in, counts and leverage out.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    str::FromStr,
};

use clap::ValueEnum;
use indexmap::IndexSet;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    data::MedicalRecord,
    error::SignalError,
    signals::{PatientHistory, SignalCounts, SignalPair, WindowConfig},
};

/// How often a recurring drug-condition pair is counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PairDedup {
    /// Every recurrence counts.
    #[default]
    None,
    /// At most once per patient.
    Patient,
    /// At most once across the whole population.
    Population,
}

impl FromStr for PairDedup {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "patient" => Ok(Self::Patient),
            "population" => Ok(Self::Population),
            other => Err(format!("unknown pair dedup policy {other:?}")),
        }
    }
}

impl fmt::Display for PairDedup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Patient => "patient",
            Self::Population => "population",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DetectorConfig {
    pub window: WindowConfig,
    pub dedup: PairDedup,
    /// Scan patients on the rayon pool instead of one at a time.
    pub parallel: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            dedup: PairDedup::None,
            parallel: true,
        }
    }
}

/// Holds one run's patient histories and turns them into population tallies.
#[derive(Debug, Clone, Default)]
pub struct SignalDetector {
    config: DetectorConfig,
    histories: Vec<PatientHistory>,
}

impl SignalDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            histories: Vec::new(),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Replace held histories with one per patient in `records_by_patient`.
    ///
    /// Entries sharing a patient id are combined into a single history.
    pub fn build_histories<I>(&mut self, records_by_patient: I) -> Result<usize, SignalError>
    where
        I: IntoIterator<Item = (String, Vec<MedicalRecord>)>,
    {
        let mut grouped: BTreeMap<String, Vec<MedicalRecord>> = BTreeMap::new();
        for (patient_id, records) in records_by_patient {
            grouped.entry(patient_id).or_default().extend(records);
        }
        self.histories.clear();
        for (patient_id, records) in grouped {
            self.histories.push(PatientHistory::new(patient_id, records)?);
        }
        if self.histories.is_empty() {
            warn!(err = %SignalError::EmptyPopulation, "nothing to scan");
        } else {
            info!(patients = self.histories.len(), "built patient histories");
        }
        Ok(self.histories.len())
    }

    /// Add a history, keeping histories ordered by patient id.
    ///
    /// A history for an already-held patient is folded into the existing one.
    pub fn append_history(&mut self, history: PatientHistory) -> Result<(), SignalError> {
        match self
            .histories
            .binary_search_by(|h| h.patient_id().cmp(history.patient_id()))
        {
            Ok(idx) => {
                let held = &mut self.histories[idx];
                for record in history.into_records() {
                    held.append(record)?;
                }
            }
            Err(idx) => self.histories.insert(idx, history),
        }
        Ok(())
    }

    pub fn histories(&self) -> &[PatientHistory] {
        &self.histories
    }

    pub fn history(&self, patient_id: &str) -> Option<&PatientHistory> {
        self.histories
            .binary_search_by(|h| h.patient_id().cmp(patient_id))
            .ok()
            .map(|idx| &self.histories[idx])
    }

    /// Pairs one patient contributes under the configured dedup policy.
    pub fn patient_pairs(&self, history: &PatientHistory) -> Vec<SignalPair> {
        let pairs = history.detect_signal_pairs(self.config.window);
        match self.config.dedup {
            PairDedup::None => pairs,
            PairDedup::Patient | PairDedup::Population => pairs
                .into_iter()
                .collect::<IndexSet<_>>()
                .into_iter()
                .collect(),
        }
    }

    /// Scan every history once and tally the pairs it emits.
    pub fn accumulate_counts(&self) -> SignalCounts {
        let counts = if self.config.parallel {
            self.histories
                .par_iter()
                .fold(SignalCounts::default, |mut acc, history| {
                    acc.extend(self.patient_pairs(history));
                    acc
                })
                .reduce(SignalCounts::default, SignalCounts::merge)
        } else {
            self.histories
                .iter()
                .fold(SignalCounts::default(), |mut acc, history| {
                    acc.extend(self.patient_pairs(history));
                    acc
                })
        };
        let counts = match self.config.dedup {
            PairDedup::Population => counts.into_distinct(),
            PairDedup::None | PairDedup::Patient => counts,
        };
        info!(
            total_pairs = counts.total_pairs(),
            distinct_pairs = counts.pair_count().len(),
            "accumulated pair counts"
        );
        counts
    }

    pub fn compute_leverage(
        &self,
        counts: &SignalCounts,
    ) -> Result<HashMap<SignalPair, f64>, SignalError> {
        counts.leverage()
    }
}
