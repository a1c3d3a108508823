use std::{collections::HashMap, fs, path::Path};

use claims_signal::signals::{
    export::{
        CONDITION_COUNT_TABLE, DRUG_COUNT_TABLE, PAIR_COUNT_TABLE, PAIR_LEVERAGE_TABLE,
        RUN_SUMMARY_FILE,
    },
    run_pipeline, DetectorConfig, ExportFormat, RunOptions, SignalCounts, SignalPair,
    TableWriter,
};
use polars::prelude::{DataFrame, ParquetReader, SerReader};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn seed_mappings(root: &Path) {
    write(
        root,
        "mappings/drug_atc.csv",
        "Drug_No,ATC_Code\nD001,N02BE01\n",
    );
    write(root, "mappings/atc_meddra.csv", "ATC_Code,MedDRA\nN02BE01,A\n");
    write(root, "mappings/icd9_umls.csv", "ICD9CM,UMLSCID\n250.00,X\n");
}

/// Two patients, each prescribed A and diagnosed X ten days later.
fn seed_claims(root: &Path) {
    seed_mappings(root);
    write(
        root,
        "raw/prescriptions/rx.csv",
        "ID,Func_Date,Drug_No\nP1,2006-01-01,D001\nP2,2006-02-01,D001\n",
    );
    write(
        root,
        "raw/diagnoses/dx.csv",
        "ID,Func_Date,ACode_ICD9_1,ACode_ICD9_2,ACode_ICD9_3\n\
         P1,2006-01-11,25000,,\n\
         P2,2006-02-11,25000,,\n",
    );
}

fn options(source: &Path) -> RunOptions {
    RunOptions {
        source: source.to_path_buf(),
        detector: DetectorConfig::default(),
        format: ExportFormat::Csv,
    }
}

fn read(dir: &Path, table: &str) -> String {
    fs::read_to_string(dir.join(format!("{table}.csv"))).unwrap()
}

#[test]
fn pair_keys_are_quoted() {
    let out = TempDir::new().unwrap();
    let mut counts = SignalCounts::default();
    counts.extend([SignalPair::new("A", "X"), SignalPair::new("A", "Y")]);
    let writer = TableWriter::new(out.path(), ExportFormat::Csv);
    let paths = writer.write_counts(&counts).unwrap();
    assert_eq!(paths.len(), 3);

    assert_eq!(
        read(out.path(), PAIR_COUNT_TABLE),
        "\"A,X\",1\n\"A,Y\",1\n"
    );
    assert_eq!(read(out.path(), DRUG_COUNT_TABLE), "A,2\n");
    assert_eq!(read(out.path(), CONDITION_COUNT_TABLE), "X,1\nY,1\n");
}

#[test]
fn pipeline_writes_four_tables() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    seed_claims(data.path());

    let summary = run_pipeline(&options(data.path()), out.path()).unwrap();
    assert_eq!(summary.patients, 2);
    assert_eq!(summary.total_pairs, 2);
    assert!(summary.leverage_written);

    assert_eq!(read(out.path(), PAIR_COUNT_TABLE), "\"A,X\",2\n");
    assert_eq!(read(out.path(), DRUG_COUNT_TABLE), "A,2\n");
    assert_eq!(read(out.path(), CONDITION_COUNT_TABLE), "X,2\n");
    assert_eq!(read(out.path(), PAIR_LEVERAGE_TABLE), "\"A,X\",0\n");
    assert!(out.path().join(RUN_SUMMARY_FILE).exists());
}

#[test]
fn reruns_are_byte_identical() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    seed_claims(data.path());

    run_pipeline(&options(data.path()), out.path()).unwrap();
    let first: Vec<String> = [PAIR_COUNT_TABLE, DRUG_COUNT_TABLE, PAIR_LEVERAGE_TABLE]
        .iter()
        .map(|t| read(out.path(), t))
        .collect();
    run_pipeline(&options(data.path()), out.path()).unwrap();
    let second: Vec<String> = [PAIR_COUNT_TABLE, DRUG_COUNT_TABLE, PAIR_LEVERAGE_TABLE]
        .iter()
        .map(|t| read(out.path(), t))
        .collect();
    assert_eq!(first, second);
}

#[test]
fn empty_population_writes_empty_tables() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    seed_mappings(data.path());
    write(data.path(), "raw/prescriptions/rx.csv", "ID,Func_Date,Drug_No\n");
    write(
        data.path(),
        "raw/diagnoses/dx.csv",
        "ID,Func_Date,ACode_ICD9_1,ACode_ICD9_2,ACode_ICD9_3\n",
    );

    let summary = run_pipeline(&options(data.path()), out.path()).unwrap();
    assert_eq!(summary.patients, 0);
    for table in [
        PAIR_COUNT_TABLE,
        DRUG_COUNT_TABLE,
        CONDITION_COUNT_TABLE,
        PAIR_LEVERAGE_TABLE,
    ] {
        assert_eq!(read(out.path(), table), "");
    }
}

#[test]
fn undefined_leverage_still_writes_counts() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    seed_claims(data.path());
    run_pipeline(&options(data.path()), out.path()).unwrap();
    assert!(out.path().join(format!("{PAIR_LEVERAGE_TABLE}.csv")).exists());

    // Diagnoses only: patients exist, but no prescription ever precedes one.
    write(data.path(), "raw/prescriptions/rx.csv", "ID,Func_Date,Drug_No\n");
    let err = run_pipeline(&options(data.path()), out.path()).unwrap_err();
    assert!(format!("{err:#}").contains("leverage is undefined"));

    assert_eq!(read(out.path(), PAIR_COUNT_TABLE), "");
    assert!(!out.path().join(format!("{PAIR_LEVERAGE_TABLE}.csv")).exists());
    let summary = fs::read_to_string(out.path().join(RUN_SUMMARY_FILE)).unwrap();
    assert!(summary.contains("\"leverage_written\": false"));
}

fn read_parquet(path: &Path) -> DataFrame {
    let file = fs::File::open(path).unwrap();
    ParquetReader::new(file).finish().unwrap()
}

#[test]
fn parquet_tables_carry_named_columns() {
    let out = TempDir::new().unwrap();
    let mut counts = SignalCounts::default();
    counts.extend([
        SignalPair::new("A", "X"),
        SignalPair::new("A", "X"),
        SignalPair::new("B", "Y"),
    ]);
    let writer = TableWriter::new(out.path(), ExportFormat::Parquet);
    writer.write_counts(&counts).unwrap();
    writer.write_leverage(&counts.leverage().unwrap()).unwrap();

    let pairs = read_parquet(&writer.table_path(PAIR_COUNT_TABLE));
    assert_eq!(pairs.height(), 2);
    let drugs = pairs.column("drug_id").unwrap().str().unwrap();
    let conditions = pairs.column("condition_id").unwrap().str().unwrap();
    let n = pairs.column("count").unwrap().u64().unwrap();
    assert_eq!(drugs.get(0), Some("A"));
    assert_eq!(conditions.get(0), Some("X"));
    assert_eq!(n.get(0), Some(2));
    assert_eq!(drugs.get(1), Some("B"));

    let drug_counts = read_parquet(&writer.table_path(DRUG_COUNT_TABLE));
    assert_eq!(drug_counts.height(), 2);
    assert!(drug_counts.column("drug_id").is_ok());
    assert!(drug_counts.column("count").is_ok());

    let condition_counts = read_parquet(&writer.table_path(CONDITION_COUNT_TABLE));
    assert_eq!(condition_counts.height(), 2);
    assert!(condition_counts.column("condition_id").is_ok());

    let leverage = read_parquet(&writer.table_path(PAIR_LEVERAGE_TABLE));
    assert_eq!(leverage.height(), 2);
    let values = leverage.column("leverage").unwrap().f64().unwrap();
    // 2/3 - (2/3)(2/3)
    assert!((values.get(0).unwrap() - 2.0 / 9.0).abs() < 1e-12);
}

#[test]
fn empty_parquet_tables_are_still_written() {
    let out = TempDir::new().unwrap();
    let writer = TableWriter::new(out.path(), ExportFormat::Parquet);
    writer.write_counts(&SignalCounts::default()).unwrap();
    writer.write_leverage(&HashMap::new()).unwrap();

    for (table, column) in [
        (PAIR_COUNT_TABLE, "condition_id"),
        (DRUG_COUNT_TABLE, "drug_id"),
        (CONDITION_COUNT_TABLE, "condition_id"),
        (PAIR_LEVERAGE_TABLE, "leverage"),
    ] {
        let df = read_parquet(&writer.table_path(table));
        assert_eq!(df.height(), 0);
        assert!(df.column(column).is_ok());
    }
}
