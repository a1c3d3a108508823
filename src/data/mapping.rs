//! Translation tables from raw claims codes into canonical coding systems.
//!
//! Drugs travel `Drug_No → ATC → MedDRA`; diagnoses travel `ICD9-CM → UMLS CUI`.

use std::{collections::HashMap, path::Path};

use serde::Deserialize;
use tracing::info;

use crate::{
    data::read_rows,
    error::{CodeSystem, SignalError},
};

pub const DRUG_ATC_FILE: &str = "drug_atc.csv";
pub const ATC_MEDDRA_FILE: &str = "atc_meddra.csv";
pub const ICD9_UMLS_FILE: &str = "icd9_umls.csv";

#[derive(Debug, Deserialize)]
struct DrugAtcRow {
    #[serde(rename = "Drug_No")]
    drug_no: String,
    #[serde(rename = "ATC_Code")]
    atc_code: String,
}

#[derive(Debug, Deserialize)]
struct AtcMeddraRow {
    #[serde(rename = "ATC_Code")]
    atc_code: String,
    #[serde(rename = "MedDRA")]
    meddra: String,
}

#[derive(Debug, Deserialize)]
struct Icd9UmlsRow {
    #[serde(rename = "ICD9CM")]
    icd9cm: String,
    #[serde(rename = "UMLSCID")]
    umls_cid: String,
}

/// In-memory code translation tables.
#[derive(Debug, Clone, Default)]
pub struct CodeMaps {
    drug_atc: HashMap<String, String>,
    atc_meddra: HashMap<String, String>,
    icd9_umls: HashMap<String, String>,
}

impl CodeMaps {
    /// Load the three mapping tables from `dir`.
    pub fn load(dir: &Path) -> Result<Self, SignalError> {
        let mut maps = Self::default();
        for row in read_rows::<DrugAtcRow>(&dir.join(DRUG_ATC_FILE))? {
            maps.insert_drug(row.drug_no, row.atc_code);
        }
        for row in read_rows::<AtcMeddraRow>(&dir.join(ATC_MEDDRA_FILE))? {
            maps.insert_atc(row.atc_code, row.meddra);
        }
        for row in read_rows::<Icd9UmlsRow>(&dir.join(ICD9_UMLS_FILE))? {
            maps.insert_icd9(row.icd9cm, row.umls_cid);
        }
        info!(
            drugs = maps.drug_atc.len(),
            atc = maps.atc_meddra.len(),
            icd9 = maps.icd9_umls.len(),
            "loaded code maps"
        );
        Ok(maps)
    }

    pub fn insert_drug(&mut self, drug_no: impl Into<String>, atc_code: impl Into<String>) {
        self.drug_atc.insert(drug_no.into(), atc_code.into());
    }

    pub fn insert_atc(&mut self, atc_code: impl Into<String>, meddra: impl Into<String>) {
        self.atc_meddra.insert(atc_code.into(), meddra.into());
    }

    /// Register an ICD9-CM code in its dotted form (`250.00`).
    pub fn insert_icd9(&mut self, icd9cm: impl Into<String>, umls_cid: impl Into<String>) {
        self.icd9_umls.insert(icd9cm.into(), umls_cid.into());
    }

    /// Canonical (MedDRA) drug code for a claims drug number.
    pub fn drug_code(&self, drug_no: &str) -> Result<&str, SignalError> {
        let atc = self
            .drug_atc
            .get(drug_no)
            .ok_or_else(|| missing(CodeSystem::DrugNo, drug_no))?;
        self.atc_meddra
            .get(atc)
            .map(String::as_str)
            .ok_or_else(|| missing(CodeSystem::Atc, atc))
    }

    /// Canonical (UMLS) condition code for an undotted claims ICD9 code.
    pub fn condition_code(&self, raw_icd9: &str) -> Result<&str, SignalError> {
        let dotted = dot_icd9(raw_icd9);
        self.icd9_umls
            .get(&dotted)
            .map(String::as_str)
            .ok_or_else(|| missing(CodeSystem::Icd9, &dotted))
    }
}

fn missing(system: CodeSystem, code: &str) -> SignalError {
    SignalError::MissingCodeMapping {
        system,
        code: code.to_string(),
    }
}

/// Insert the decimal point claims extracts leave out of ICD9-CM codes.
///
/// E and V codes carry four leading characters, all others three.
pub fn dot_icd9(raw: &str) -> String {
    let raw = raw.trim();
    let head = if raw.starts_with('E') || raw.starts_with('V') {
        4
    } else {
        3
    };
    let split = raw
        .char_indices()
        .nth(head)
        .map(|(idx, _)| idx)
        .unwrap_or(raw.len());
    format!("{}.{}", &raw[..split], &raw[split..])
}
