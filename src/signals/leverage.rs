//! Leverage: observed joint frequency minus the frequency expected under independence.

use crate::error::SignalError;

/// Compute `n/N - (a/N)(b/N)` for a pair seen `n` times, a drug seen `a`
/// times, a condition seen `b` times, out of `total` pairs.
pub fn leverage(n: u64, a: u64, b: u64, total: u64) -> Result<f64, SignalError> {
    let expected = expected_frequency(a, b, total)?;
    Ok(n as f64 / total as f64 - expected)
}

/// Joint frequency expected if drug and condition were independent.
pub fn expected_frequency(a: u64, b: u64, total: u64) -> Result<f64, SignalError> {
    if total == 0 {
        return Err(SignalError::DivisionUndefined);
    }
    let total = total as f64;
    Ok((a as f64 / total) * (b as f64 / total))
}
