//! Per-patient chronology and the new-onset pairing rule.

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::{data::MedicalRecord, error::SignalError, signals::SignalPair};

pub const DEFAULT_WINDOW_DAYS: u32 = 30;

/// Lookback and lookahead lengths around a prescription date, in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowConfig {
    pub lookback_days: u32,
    pub lookahead_days: u32,
}

impl WindowConfig {
    pub fn new(lookback_days: u32, lookahead_days: u32) -> Result<Self, SignalError> {
        if lookahead_days == 0 {
            return Err(SignalError::InvalidWindow);
        }
        Ok(Self {
            lookback_days,
            lookahead_days,
        })
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            lookback_days: DEFAULT_WINDOW_DAYS,
            lookahead_days: DEFAULT_WINDOW_DAYS,
        }
    }
}

/// All encounters of one patient, ordered by `(date, ingestion sequence)`.
#[derive(Debug, Clone)]
pub struct PatientHistory {
    patient_id: String,
    records: Vec<MedicalRecord>,
}

impl PatientHistory {
    pub fn new(
        patient_id: impl Into<String>,
        mut records: Vec<MedicalRecord>,
    ) -> Result<Self, SignalError> {
        let patient_id = patient_id.into();
        if let Some(stray) = records.iter().find(|r| r.patient_id() != patient_id) {
            return Err(SignalError::PatientMismatch {
                expected: patient_id,
                found: stray.patient_id().to_string(),
            });
        }
        records.sort_by_key(MedicalRecord::order_key);
        Ok(Self {
            patient_id,
            records,
        })
    }

    /// Insert a record after every record with an equal or earlier key.
    pub fn append(&mut self, record: MedicalRecord) -> Result<(), SignalError> {
        if record.patient_id() != self.patient_id {
            return Err(SignalError::PatientMismatch {
                expected: self.patient_id.clone(),
                found: record.patient_id().to_string(),
            });
        }
        let key = record.order_key();
        let at = self.records.partition_point(|r| r.order_key() <= key);
        self.records.insert(at, record);
        Ok(())
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    pub fn records(&self) -> &[MedicalRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<MedicalRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn distinct_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.records.iter().map(|r| r.encounter_date()).collect();
        dates.dedup();
        dates
    }

    pub fn all_prescriptions(&self) -> Vec<String> {
        let codes: BTreeSet<&String> = self.records.iter().flat_map(|r| r.prescriptions()).collect();
        codes.into_iter().cloned().collect()
    }

    pub fn all_diagnoses(&self) -> Vec<String> {
        let codes: BTreeSet<&String> = self.records.iter().flat_map(|r| r.diagnoses()).collect();
        codes.into_iter().cloned().collect()
    }

    /// Diagnoses recorded strictly between `anchor - before_days` and
    /// `anchor + after_days`. Both boundary dates are excluded.
    pub fn diagnoses_in_window(
        &self,
        anchor: NaiveDate,
        before_days: u32,
        after_days: u32,
    ) -> BTreeSet<&str> {
        let start = anchor
            .checked_sub_signed(Duration::days(i64::from(before_days)))
            .unwrap_or(NaiveDate::MIN);
        let end = anchor
            .checked_add_signed(Duration::days(i64::from(after_days)))
            .unwrap_or(NaiveDate::MAX);
        let lo = self.records.partition_point(|r| r.encounter_date() <= start);
        let hi = self.records.partition_point(|r| r.encounter_date() < end);
        if lo >= hi {
            return BTreeSet::new();
        }
        self.records[lo..hi]
            .iter()
            .flat_map(|r| r.diagnoses().iter().map(String::as_str))
            .collect()
    }

    /// Diagnoses in the lookahead window that were absent from the lookback window.
    pub fn new_diagnoses(&self, anchor: NaiveDate, window: WindowConfig) -> BTreeSet<&str> {
        let before = self.diagnoses_in_window(anchor, window.lookback_days, 0);
        let after = self.diagnoses_in_window(anchor, 0, window.lookahead_days);
        after.difference(&before).copied().collect()
    }

    /// Pair every prescription with every diagnosis that newly appears after it.
    ///
    /// Pairs repeat when the same drug and condition line up at several
    /// prescription dates.
    pub fn detect_signal_pairs(&self, window: WindowConfig) -> Vec<SignalPair> {
        let mut pairs = Vec::new();
        for record in &self.records {
            if record.prescriptions().is_empty() {
                continue;
            }
            let onset = self.new_diagnoses(record.encounter_date(), window);
            if onset.is_empty() {
                continue;
            }
            for drug in record.prescriptions() {
                for condition in &onset {
                    pairs.push(SignalPair::new(drug.as_str(), *condition));
                }
            }
        }
        pairs
    }
}
