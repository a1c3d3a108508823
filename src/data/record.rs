//! One clinical encounter: a patient, a date, and the codes recorded that day.

use std::{collections::BTreeSet, fmt};

use chrono::NaiveDate;

use crate::error::SignalError;

/// Prescriptions and diagnoses recorded for one patient on one date.
///
/// Codes are canonical (MedDRA for drugs, UMLS CUIs for conditions) and kept in
/// ordered sets, so iteration order is stable and duplicates collapse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MedicalRecord {
    patient_id: String,
    encounter_date: NaiveDate,
    sequence: u64,
    prescriptions: BTreeSet<String>,
    diagnoses: BTreeSet<String>,
}

impl MedicalRecord {
    pub fn new(patient_id: impl Into<String>, encounter_date: NaiveDate) -> Self {
        Self {
            patient_id: patient_id.into(),
            encounter_date,
            sequence: 0,
            prescriptions: BTreeSet::new(),
            diagnoses: BTreeSet::new(),
        }
    }

    /// Build a record with its codes already known.
    pub fn with_codes<P, D>(
        patient_id: impl Into<String>,
        encounter_date: NaiveDate,
        prescriptions: P,
        diagnoses: D,
    ) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        let mut record = Self::new(patient_id, encounter_date);
        record.extend_prescriptions(prescriptions);
        record.extend_diagnoses(diagnoses);
        record
    }

    /// Tag the record with its ingestion position, used to order same-date encounters.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    pub fn encounter_date(&self) -> NaiveDate {
        self.encounter_date
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn prescriptions(&self) -> &BTreeSet<String> {
        &self.prescriptions
    }

    pub fn diagnoses(&self) -> &BTreeSet<String> {
        &self.diagnoses
    }

    pub fn add_prescription(&mut self, code: impl Into<String>) {
        self.prescriptions.insert(code.into());
    }

    pub fn add_diagnosis(&mut self, code: impl Into<String>) {
        self.diagnoses.insert(code.into());
    }

    pub fn extend_prescriptions<I>(&mut self, codes: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.prescriptions.extend(codes.into_iter().map(Into::into));
    }

    pub fn extend_diagnoses<I>(&mut self, codes: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.diagnoses.extend(codes.into_iter().map(Into::into));
    }

    /// Composite ordering key inside a patient history.
    pub(crate) fn order_key(&self) -> (NaiveDate, u64) {
        (self.encounter_date, self.sequence)
    }
}

impl fmt::Display for MedicalRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} | {} | {}",
            self.patient_id,
            self.encounter_date.format("%Y-%m-%d"),
            join(&self.prescriptions),
            join(&self.diagnoses)
        )
    }
}

fn join(codes: &BTreeSet<String>) -> String {
    codes.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

/// Parse a claims `Func_Date` value (`2006-03-14` or `20060314`).
pub fn parse_encounter_date(patient_id: &str, raw: &str) -> Result<NaiveDate, SignalError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
        .map_err(|source| SignalError::MalformedDate {
            patient_id: patient_id.to_string(),
            raw: raw.to_string(),
            source,
        })
}
