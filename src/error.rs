//! Typed failures raised by ingestion and signal aggregation.

use std::path::PathBuf;

use thiserror::Error;

/// Coding system a raw code failed to translate out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeSystem {
    /// Claims drug number → ATC.
    DrugNo,
    /// ATC → MedDRA.
    Atc,
    /// ICD9-CM → UMLS CUI.
    Icd9,
}

impl std::fmt::Display for CodeSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::DrugNo => "drug_no",
            Self::Atc => "atc",
            Self::Icd9 => "icd9cm",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum SignalError {
    #[error("malformed encounter date {raw:?} for patient {patient_id}")]
    MalformedDate {
        patient_id: String,
        raw: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("no {system} mapping for code {code:?}")]
    MissingCodeMapping { system: CodeSystem, code: String },

    #[error("leverage is undefined: no drug-condition pairs were detected")]
    DivisionUndefined,

    #[error("no patient histories were built")]
    EmptyPopulation,

    #[error("record for patient {found} cannot join history of patient {expected}")]
    PatientMismatch { expected: String, found: String },

    #[error("lookahead window must span at least one day")]
    InvalidWindow,

    #[error("source {path} is missing")]
    SourceMissing { path: PathBuf },

    #[error("failed reading source {path}")]
    Source {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}
