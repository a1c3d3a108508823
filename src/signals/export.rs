//! Writers for the four output tables and the run summary.

use std::{
    collections::HashMap,
    fmt::Display,
    fs::File,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::ValueEnum;
use polars::prelude::{DataFrame, NamedFrom, ParquetWriter, Series};
use serde::Serialize;
use tracing::info;

use crate::signals::{SignalCounts, SignalPair};

pub const PAIR_COUNT_TABLE: &str = "drug_condition_pair_count";
pub const DRUG_COUNT_TABLE: &str = "drug_count";
pub const CONDITION_COUNT_TABLE: &str = "condition_count";
pub const PAIR_LEVERAGE_TABLE: &str = "drug_condition_pair_leverage";
pub const RUN_SUMMARY_FILE: &str = "run_summary.json";

/// On-disk encoding of the output tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Headerless `key,value` rows.
    #[default]
    Csv,
    /// Columnar tables with named columns.
    Parquet,
}

impl ExportFormat {
    fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
        }
    }
}

/// Writes result tables into one output directory.
#[derive(Debug, Clone)]
pub struct TableWriter {
    dir: PathBuf,
    format: ExportFormat,
}

impl TableWriter {
    pub fn new(dir: impl Into<PathBuf>, format: ExportFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.{}", self.format.extension()))
    }

    /// Write the pair, drug and condition count tables.
    pub fn write_counts(&self, counts: &SignalCounts) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let pairs = sorted_pairs(counts.pair_count());
        let drugs = sorted_codes(counts.drug_count());
        let conditions = sorted_codes(counts.condition_count());

        let pair_path = self.table_path(PAIR_COUNT_TABLE);
        let drug_path = self.table_path(DRUG_COUNT_TABLE);
        let condition_path = self.table_path(CONDITION_COUNT_TABLE);
        match self.format {
            ExportFormat::Csv => {
                write_csv(&pair_path, pairs.iter().map(|(p, n)| (p.to_string(), *n)))?;
                write_csv(&drug_path, drugs.iter().map(|(d, n)| (*d, *n)))?;
                write_csv(&condition_path, conditions.iter().map(|(c, n)| (*c, *n)))?;
            }
            ExportFormat::Parquet => {
                let mut df = DataFrame::new(vec![
                    Series::new(
                        "drug_id".into(),
                        pairs.iter().map(|(p, _)| p.drug.clone()).collect::<Vec<_>>(),
                    ),
                    Series::new(
                        "condition_id".into(),
                        pairs
                            .iter()
                            .map(|(p, _)| p.condition.clone())
                            .collect::<Vec<_>>(),
                    ),
                    Series::new(
                        "count".into(),
                        pairs.iter().map(|(_, n)| *n).collect::<Vec<_>>(),
                    ),
                ])?;
                write_parquet(&pair_path, &mut df)?;
                let mut df = code_frame("drug_id", &drugs)?;
                write_parquet(&drug_path, &mut df)?;
                let mut df = code_frame("condition_id", &conditions)?;
                write_parquet(&condition_path, &mut df)?;
            }
        }
        info!(
            pairs = pairs.len(),
            drugs = drugs.len(),
            conditions = conditions.len(),
            dir = %self.dir.display(),
            "wrote count tables"
        );
        Ok(vec![pair_path, drug_path, condition_path])
    }

    pub fn write_leverage(&self, leverage: &HashMap<SignalPair, f64>) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let mut rows: Vec<(&SignalPair, f64)> = leverage.iter().map(|(p, v)| (p, *v)).collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));
        let path = self.table_path(PAIR_LEVERAGE_TABLE);
        match self.format {
            ExportFormat::Csv => {
                write_csv(&path, rows.iter().map(|(p, v)| (p.to_string(), *v)))?;
            }
            ExportFormat::Parquet => {
                let mut df = DataFrame::new(vec![
                    Series::new(
                        "drug_id".into(),
                        rows.iter().map(|(p, _)| p.drug.clone()).collect::<Vec<_>>(),
                    ),
                    Series::new(
                        "condition_id".into(),
                        rows.iter()
                            .map(|(p, _)| p.condition.clone())
                            .collect::<Vec<_>>(),
                    ),
                    Series::new(
                        "leverage".into(),
                        rows.iter().map(|(_, v)| *v).collect::<Vec<_>>(),
                    ),
                ])?;
                write_parquet(&path, &mut df)?;
            }
        }
        info!(path = %path.display(), rows = rows.len(), "wrote leverage table");
        Ok(path)
    }

    /// Remove a leverage table left behind by an earlier run.
    pub fn clear_leverage(&self) -> Result<()> {
        let path = self.table_path(PAIR_LEVERAGE_TABLE);
        if path.exists() {
            std::fs::remove_file(&path).with_context(|| format!("remove {path:?}"))?;
        }
        Ok(())
    }

    pub fn write_summary<T: Serialize>(&self, summary: &T) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let path = self.dir.join(RUN_SUMMARY_FILE);
        let file = File::create(&path).with_context(|| format!("create {path:?}"))?;
        serde_json::to_writer_pretty(file, summary)?;
        info!(path = %path.display(), "wrote run summary");
        Ok(path)
    }
}

fn sorted_pairs(map: &HashMap<SignalPair, u64>) -> Vec<(&SignalPair, u64)> {
    let mut rows: Vec<_> = map.iter().map(|(k, v)| (k, *v)).collect();
    rows.sort();
    rows
}

fn sorted_codes(map: &HashMap<String, u64>) -> Vec<(&str, u64)> {
    let mut rows: Vec<_> = map.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    rows.sort();
    rows
}

fn write_csv<K, V, I>(path: &Path, rows: I) -> Result<()>
where
    K: AsRef<str>,
    V: Display,
    I: IntoIterator<Item = (K, V)>,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("create {path:?}"))?;
    for (key, value) in rows {
        writer.write_record([key.as_ref(), value.to_string().as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

fn code_frame(column: &str, rows: &[(&str, u64)]) -> Result<DataFrame> {
    let df = DataFrame::new(vec![
        Series::new(
            column.into(),
            rows.iter().map(|(c, _)| c.to_string()).collect::<Vec<_>>(),
        ),
        Series::new(
            "count".into(),
            rows.iter().map(|(_, n)| *n).collect::<Vec<_>>(),
        ),
    ])?;
    Ok(df)
}

fn write_parquet(path: &Path, df: &mut DataFrame) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create {path:?}"))?;
    ParquetWriter::new(file).finish(df)?;
    Ok(())
}
