//! Near-zero-variance column detection.
//!
//! A column is flagged when it holds a single distinct value, or when the
//! most common value dominates the runner-up by more than `freq_cut` while
//! the share of distinct values stays at or below `unique_cut` percent.

use crate::dataset::Frame;
use std::collections::HashMap;

/// Default most-common / second-most-common ratio (95/5).
pub const FREQ_CUT: f64 = 95.0 / 5.0;

/// Default distinct-value percentage.
pub const UNIQUE_CUT: f64 = 10.0;

/// Near-zero-variance filter.
pub struct NearZeroVariance;

impl NearZeroVariance {
    /// Names of the columns of `frame` to remove.
    pub fn detect(frame: &Frame, freq_cut: f64, unique_cut: f64) -> Vec<String> {
        let n = frame.nrows();
        if n == 0 {
            return Vec::new();
        }
        frame
            .names
            .iter()
            .enumerate()
            .filter(|(col, _)| {
                let counts = value_counts(frame.values.column(*col).iter().copied());
                is_near_zero_variance(&counts, n, freq_cut, unique_cut)
            })
            .map(|(_, name)| name.clone())
            .collect()
    }
}

fn value_counts(values: impl Iterator<Item = f64>) -> Vec<usize> {
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for v in values {
        // -0.0 and 0.0 are the same value
        let v = if v == 0.0 { 0.0 } else { v };
        *counts.entry(v.to_bits()).or_insert(0) += 1;
    }
    let mut counts: Vec<usize> = counts.into_values().collect();
    counts.sort_unstable_by(|a, b| b.cmp(a));
    counts
}

fn is_near_zero_variance(counts: &[usize], n: usize, freq_cut: f64, unique_cut: f64) -> bool {
    if counts.len() <= 1 {
        return true;
    }
    let freq_ratio = counts[0] as f64 / counts[1] as f64;
    let percent_unique = 100.0 * counts.len() as f64 / n as f64;
    freq_ratio > freq_cut && percent_unique <= unique_cut
}
