//! Population-level co-occurrence tallies.

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use serde::Serialize;

use crate::{error::SignalError, signals::leverage};

/// A drug implicated with a condition that newly appeared after its prescription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SignalPair {
    pub drug: String,
    pub condition: String,
}

impl SignalPair {
    pub fn new(drug: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            drug: drug.into(),
            condition: condition.into(),
        }
    }
}

impl fmt::Display for SignalPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.drug, self.condition)
    }
}

/// Joint and marginal pair counts accumulated over a run.
///
/// Every recorded pair bumps its joint count, both marginals and the total, so
/// the marginals always equal the row and column sums of the joint table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalCounts {
    pair_count: HashMap<SignalPair, u64>,
    drug_count: HashMap<String, u64>,
    condition_count: HashMap<String, u64>,
    total_pairs: u64,
}

impl SignalCounts {
    pub fn record(&mut self, pair: SignalPair) {
        *self.drug_count.entry(pair.drug.clone()).or_insert(0) += 1;
        *self
            .condition_count
            .entry(pair.condition.clone())
            .or_insert(0) += 1;
        *self.pair_count.entry(pair).or_insert(0) += 1;
        self.total_pairs += 1;
    }

    pub fn extend<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = SignalPair>,
    {
        for pair in pairs {
            self.record(pair);
        }
    }

    /// Fold another partial accumulator into this one.
    pub fn merge(mut self, other: Self) -> Self {
        for (pair, n) in other.pair_count {
            *self.pair_count.entry(pair).or_insert(0) += n;
        }
        for (drug, n) in other.drug_count {
            *self.drug_count.entry(drug).or_insert(0) += n;
        }
        for (condition, n) in other.condition_count {
            *self.condition_count.entry(condition).or_insert(0) += n;
        }
        self.total_pairs += other.total_pairs;
        self
    }

    /// Collapse every observed pair to a single occurrence.
    pub fn into_distinct(self) -> Self {
        let pairs: HashSet<SignalPair> = self.pair_count.into_keys().collect();
        let mut distinct = Self::default();
        distinct.extend(pairs);
        distinct
    }

    pub fn pair_count(&self) -> &HashMap<SignalPair, u64> {
        &self.pair_count
    }

    pub fn drug_count(&self) -> &HashMap<String, u64> {
        &self.drug_count
    }

    pub fn condition_count(&self) -> &HashMap<String, u64> {
        &self.condition_count
    }

    pub fn total_pairs(&self) -> u64 {
        self.total_pairs
    }

    pub fn is_empty(&self) -> bool {
        self.total_pairs == 0
    }

    pub fn count_of(&self, drug: &str, condition: &str) -> u64 {
        self.pair_count
            .get(&SignalPair::new(drug, condition))
            .copied()
            .unwrap_or(0)
    }

    /// Leverage for every observed pair.
    pub fn leverage(&self) -> Result<HashMap<SignalPair, f64>, SignalError> {
        if self.total_pairs == 0 {
            return Err(SignalError::DivisionUndefined);
        }
        let mut table = HashMap::with_capacity(self.pair_count.len());
        for (pair, &n) in &self.pair_count {
            let a = self.drug_count.get(&pair.drug).copied().unwrap_or(0);
            let b = self.condition_count.get(&pair.condition).copied().unwrap_or(0);
            table.insert(pair.clone(), leverage::leverage(n, a, b, self.total_pairs)?);
        }
        Ok(table)
    }
}
