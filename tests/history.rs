use chrono::{Duration, NaiveDate};
use claims_signal::{
    data::MedicalRecord,
    signals::{PatientHistory, SignalPair, WindowConfig},
    SignalError,
};

const NONE: [&str; 0] = [];

fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2006, 1, 1).unwrap() + Duration::days(offset)
}

fn visit(offset: i64, drugs: &[&str], conditions: &[&str]) -> MedicalRecord {
    MedicalRecord::with_codes(
        "P1",
        day(offset),
        drugs.iter().copied(),
        conditions.iter().copied(),
    )
}

fn history(records: Vec<MedicalRecord>) -> PatientHistory {
    PatientHistory::new("P1", records).unwrap()
}

#[test]
fn new_onset_after_prescription_is_paired_once() {
    let h = history(vec![
        visit(40, &NONE, &["X"]),
        visit(0, &["A"], &NONE),
        visit(10, &NONE, &["X"]),
    ]);
    let pairs = h.detect_signal_pairs(WindowConfig::default());
    assert_eq!(pairs, vec![SignalPair::new("A", "X")]);
}

#[test]
fn diagnosis_on_day_30_is_outside_lookahead() {
    let h = history(vec![visit(0, &["A"], &NONE), visit(30, &NONE, &["X"])]);
    assert!(h.detect_signal_pairs(WindowConfig::default()).is_empty());
}

#[test]
fn diagnosis_on_day_29_is_inside_lookahead() {
    let h = history(vec![visit(0, &["A"], &NONE), visit(29, &NONE, &["X"])]);
    assert_eq!(
        h.detect_signal_pairs(WindowConfig::default()),
        vec![SignalPair::new("A", "X")]
    );
}

#[test]
fn same_day_diagnosis_is_never_new() {
    let h = history(vec![visit(0, &["A"], &["X"])]);
    assert!(h.diagnoses_in_window(day(0), 30, 0).is_empty());
    assert!(h.diagnoses_in_window(day(0), 0, 30).is_empty());
    assert!(h.detect_signal_pairs(WindowConfig::default()).is_empty());
}

#[test]
fn prior_diagnosis_suppresses_pair() {
    let h = history(vec![
        visit(-5, &NONE, &["X"]),
        visit(0, &["A"], &NONE),
        visit(3, &NONE, &["X", "Y"]),
    ]);
    assert_eq!(
        h.detect_signal_pairs(WindowConfig::default()),
        vec![SignalPair::new("A", "Y")]
    );
}

#[test]
fn lookback_boundary_is_excluded() {
    let h = history(vec![
        visit(-30, &NONE, &["X"]),
        visit(0, &["A"], &NONE),
        visit(3, &NONE, &["X"]),
    ]);
    assert!(h.diagnoses_in_window(day(0), 30, 0).is_empty());
    assert_eq!(h.detect_signal_pairs(WindowConfig::default()).len(), 1);
}

#[test]
fn every_prescription_meets_every_new_diagnosis() {
    let h = history(vec![
        visit(0, &["A", "B"], &NONE),
        visit(5, &NONE, &["X", "Y"]),
    ]);
    let pairs = h.detect_signal_pairs(WindowConfig::default());
    assert_eq!(
        pairs,
        vec![
            SignalPair::new("A", "X"),
            SignalPair::new("A", "Y"),
            SignalPair::new("B", "X"),
            SignalPair::new("B", "Y"),
        ]
    );
}

#[test]
fn recurrences_across_dates_are_kept() {
    let h = history(vec![
        visit(0, &["A"], &NONE),
        visit(5, &NONE, &["X"]),
        visit(100, &["A"], &NONE),
        visit(105, &NONE, &["X"]),
    ]);
    assert_eq!(h.detect_signal_pairs(WindowConfig::default()).len(), 2);
}

#[test]
fn no_prescriptions_means_no_pairs() {
    let h = history(vec![visit(0, &NONE, &["X"]), visit(3, &NONE, &["Y"])]);
    assert!(h.detect_signal_pairs(WindowConfig::default()).is_empty());
}

#[test]
fn window_length_is_configurable() {
    let h = history(vec![visit(0, &["A"], &NONE), visit(45, &NONE, &["X"])]);
    assert!(h.detect_signal_pairs(WindowConfig::default()).is_empty());
    let wide = WindowConfig::new(30, 60).unwrap();
    assert_eq!(h.detect_signal_pairs(wide).len(), 1);
}

#[test]
fn zero_lookahead_is_rejected() {
    assert!(matches!(
        WindowConfig::new(30, 0),
        Err(SignalError::InvalidWindow)
    ));
}

#[test]
fn records_sort_by_date_then_sequence() {
    let h = history(vec![
        visit(10, &["B"], &NONE).with_sequence(4),
        visit(10, &["A"], &NONE).with_sequence(1),
        visit(2, &["C"], &NONE).with_sequence(9),
    ]);
    let order: Vec<u64> = h.records().iter().map(|r| r.sequence()).collect();
    assert_eq!(order, vec![9, 1, 4]);
}

#[test]
fn append_keeps_chronology() {
    let mut h = history(vec![visit(0, &["A"], &NONE), visit(20, &NONE, &["X"])]);
    h.append(visit(10, &NONE, &["Y"])).unwrap();
    h.append(visit(-3, &["B"], &NONE)).unwrap();
    assert_eq!(h.distinct_dates(), vec![day(-3), day(0), day(10), day(20)]);
}

#[test]
fn append_rejects_other_patients() {
    let mut h = history(vec![visit(0, &["A"], &NONE)]);
    let stranger = MedicalRecord::with_codes("P2", day(1), ["A"], NONE);
    assert!(matches!(
        h.append(stranger),
        Err(SignalError::PatientMismatch { .. })
    ));
    assert_eq!(h.len(), 1);
}

#[test]
fn construct_rejects_other_patients() {
    let stranger = MedicalRecord::with_codes("P2", day(1), ["A"], NONE);
    assert!(PatientHistory::new("P1", vec![visit(0, &["A"], &NONE), stranger]).is_err());
}

#[test]
fn unions_are_sorted_and_unique() {
    let h = history(vec![
        visit(0, &["B", "A"], &["Y"]),
        visit(0, &["A"], &["X"]),
        visit(4, &["C"], &["Y"]),
    ]);
    assert_eq!(h.all_prescriptions(), vec!["A", "B", "C"]);
    assert_eq!(h.all_diagnoses(), vec!["X", "Y"]);
    assert_eq!(h.distinct_dates(), vec![day(0), day(4)]);
}

#[test]
fn records_own_independent_code_sets() {
    let mut first = MedicalRecord::new("P1", day(0));
    let second = MedicalRecord::new("P1", day(1));
    first.add_diagnosis("X");
    assert!(second.diagnoses().is_empty());
    assert_eq!(first.diagnoses().len(), 1);
}
