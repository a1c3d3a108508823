//! Claims ingestion and code translation layer.

pub mod claims;
pub mod mapping;
pub mod record;

use std::{fs::File, path::Path};

use csv::{Reader, ReaderBuilder, Trim};
use serde::de::DeserializeOwned;

use crate::error::SignalError;

pub use claims::{load_claims, ClaimsExtract, ClaimsIngest, IngestReport};
pub use mapping::CodeMaps;
pub use record::MedicalRecord;

/// Open a headed CSV file with trimmed fields.
pub(crate) fn open_csv(path: &Path) -> Result<Reader<File>, SignalError> {
    if !path.exists() {
        return Err(SignalError::SourceMissing {
            path: path.to_path_buf(),
        });
    }
    ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|source| SignalError::Source {
            path: path.to_path_buf(),
            source,
        })
}

/// Deserialize every row of a headed CSV file.
pub(crate) fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, SignalError> {
    let mut reader = open_csv(path)?;
    let mut rows = Vec::new();
    for result in reader.deserialize() {
        let row: T = result.map_err(|source| SignalError::Source {
            path: path.to_path_buf(),
            source,
        })?;
        rows.push(row);
    }
    Ok(rows)
}
