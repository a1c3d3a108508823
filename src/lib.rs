//! Adverse drug event signal detection from longitudinal claims data.
//!
//! Claims rows become per-patient [`data::MedicalRecord`]s, which are folded
//! into [`signals::PatientHistory`] chronologies. Each history pairs
//! prescriptions with diagnoses that newly appear shortly afterwards, and
//! [`signals::SignalDetector`] tallies those pairs across the population and
//! scores them by leverage.

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod signals;

pub use error::SignalError;
