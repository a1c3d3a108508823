//! Claims extract ingestion: raw prescription and diagnosis rows merged into
//! per-(patient, date) medical records.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{
    data::{mapping::CodeMaps, open_csv, record::parse_encounter_date, MedicalRecord},
    error::SignalError,
};

pub const MAPPINGS_DIR: &str = "mappings";
pub const PRESCRIPTIONS_DIR: &str = "raw/prescriptions";
pub const DIAGNOSES_DIR: &str = "raw/diagnoses";

#[derive(Debug, Deserialize)]
struct PrescriptionRow {
    #[serde(rename = "ID")]
    patient_id: String,
    #[serde(rename = "Func_Date")]
    func_date: String,
    #[serde(rename = "Drug_No")]
    drug_no: String,
}

#[derive(Debug, Deserialize)]
struct DiagnosisRow {
    #[serde(rename = "ID")]
    patient_id: String,
    #[serde(rename = "Func_Date")]
    func_date: String,
    #[serde(rename = "ACode_ICD9_1", default)]
    icd9_1: String,
    #[serde(rename = "ACode_ICD9_2", default)]
    icd9_2: String,
    #[serde(rename = "ACode_ICD9_3", default)]
    icd9_3: String,
}

/// Row and code accounting for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub prescription_rows: u64,
    pub diagnosis_rows: u64,
    pub rejected_rows: u64,
    pub dropped_prescriptions: u64,
    pub dropped_diagnoses: u64,
    pub records: u64,
    pub patients: u64,
}

/// Records grouped by patient, ready for history construction.
#[derive(Debug, Clone, Default)]
pub struct ClaimsExtract {
    pub records_by_patient: BTreeMap<String, Vec<MedicalRecord>>,
    pub report: IngestReport,
}

/// Accumulates raw claims rows into one record per (patient, date).
///
/// The index keeps first-seen order, and a record's position in it becomes
/// its sequence number.
#[derive(Debug)]
pub struct ClaimsIngest {
    codes: CodeMaps,
    index: IndexMap<(String, NaiveDate), MedicalRecord>,
    report: IngestReport,
}

impl ClaimsIngest {
    pub fn new(codes: CodeMaps) -> Self {
        Self {
            codes,
            index: IndexMap::new(),
            report: IngestReport::default(),
        }
    }

    /// Merge one prescription fact; unmapped drugs are dropped before the date is read.
    pub fn push_prescription(&mut self, patient_id: &str, func_date: &str, drug_no: &str) {
        self.report.prescription_rows += 1;
        let drug = match self.codes.drug_code(drug_no.trim()) {
            Ok(code) => code.to_string(),
            Err(err) => {
                debug!(%err, patient_id, "dropping prescription");
                self.report.dropped_prescriptions += 1;
                return;
            }
        };
        let Some(date) = self.parse_date(patient_id, func_date) else {
            return;
        };
        self.entry(patient_id, date).add_prescription(drug);
    }

    /// Merge one diagnosis row carrying up to three raw ICD9 codes.
    ///
    /// The encounter is recorded even when none of its codes translate.
    pub fn push_diagnosis(&mut self, patient_id: &str, func_date: &str, icd9_codes: &[&str]) {
        self.report.diagnosis_rows += 1;
        let Some(date) = self.parse_date(patient_id, func_date) else {
            return;
        };
        let mut conditions = Vec::new();
        for raw in icd9_codes.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
            match self.codes.condition_code(raw) {
                Ok(cui) => conditions.push(cui.to_string()),
                Err(err) => {
                    debug!(%err, patient_id, "dropping diagnosis code");
                    self.report.dropped_diagnoses += 1;
                }
            }
        }
        self.entry(patient_id, date).extend_diagnoses(conditions);
    }

    /// Read every prescription and then every diagnosis extract under `root`.
    pub fn load_dir(&mut self, root: &Path) -> Result<(), SignalError> {
        for path in csv_files(&root.join(PRESCRIPTIONS_DIR))? {
            let mut reader = open_csv(&path)?;
            let before = self.report.prescription_rows;
            for result in reader.deserialize::<PrescriptionRow>() {
                let row = result.map_err(|source| source_error(&path, source))?;
                self.push_prescription(&row.patient_id, &row.func_date, &row.drug_no);
            }
            info!(
                path = %path.display(),
                rows = self.report.prescription_rows - before,
                "read prescription extract"
            );
        }
        for path in csv_files(&root.join(DIAGNOSES_DIR))? {
            let mut reader = open_csv(&path)?;
            let before = self.report.diagnosis_rows;
            for result in reader.deserialize::<DiagnosisRow>() {
                let row = result.map_err(|source| source_error(&path, source))?;
                self.push_diagnosis(
                    &row.patient_id,
                    &row.func_date,
                    &[
                        row.icd9_1.as_str(),
                        row.icd9_2.as_str(),
                        row.icd9_3.as_str(),
                    ],
                );
            }
            info!(
                path = %path.display(),
                rows = self.report.diagnosis_rows - before,
                "read diagnosis extract"
            );
        }
        Ok(())
    }

    /// Regroup the (patient, date) index by patient.
    pub fn finish(self) -> ClaimsExtract {
        let mut report = self.report;
        let mut records_by_patient: BTreeMap<String, Vec<MedicalRecord>> = BTreeMap::new();
        for ((patient_id, _), record) in self.index {
            records_by_patient.entry(patient_id).or_default().push(record);
        }
        report.records = records_by_patient.values().map(|r| r.len() as u64).sum();
        report.patients = records_by_patient.len() as u64;
        ClaimsExtract {
            records_by_patient,
            report,
        }
    }

    fn parse_date(&mut self, patient_id: &str, func_date: &str) -> Option<NaiveDate> {
        match parse_encounter_date(patient_id, func_date) {
            Ok(date) => Some(date),
            Err(err) => {
                warn!(%err, "rejecting claims row");
                self.report.rejected_rows += 1;
                None
            }
        }
    }

    fn entry(&mut self, patient_id: &str, date: NaiveDate) -> &mut MedicalRecord {
        let sequence = self.index.len() as u64;
        let patient_id = patient_id.trim();
        self.index
            .entry((patient_id.to_string(), date))
            .or_insert_with(|| MedicalRecord::new(patient_id, date).with_sequence(sequence))
    }
}

/// Load code maps and claims extracts from a data directory.
pub fn load_claims(root: &Path) -> Result<ClaimsExtract, SignalError> {
    let codes = CodeMaps::load(&root.join(MAPPINGS_DIR))?;
    let mut ingest = ClaimsIngest::new(codes);
    ingest.load_dir(root)?;
    let extract = ingest.finish();
    info!(
        patients = extract.report.patients,
        records = extract.report.records,
        rejected = extract.report.rejected_rows,
        "claims ingested"
    );
    Ok(extract)
}

fn csv_files(dir: &Path) -> Result<Vec<PathBuf>, SignalError> {
    if !dir.is_dir() {
        return Err(SignalError::SourceMissing {
            path: dir.to_path_buf(),
        });
    }
    let files = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("csv"))
        .collect();
    Ok(files)
}

fn source_error(path: &Path, source: csv::Error) -> SignalError {
    SignalError::Source {
        path: path.to_path_buf(),
        source,
    }
}
