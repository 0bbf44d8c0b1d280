//! Regression metrics.
//!
//! `rsq` follows the squared-correlation convention (always in [0, 1]);
//! `rsq_trad` is the traditional 1 - SSE/SST, which can go negative for a
//! model worse than the mean.

use brushwork_processing::stats;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Root mean squared error.
pub fn rmse(truth: ArrayView1<f64>, estimate: ArrayView1<f64>) -> f64 {
    if truth.is_empty() || truth.len() != estimate.len() {
        return f64::NAN;
    }
    let sse: f64 = truth
        .iter()
        .zip(estimate.iter())
        .map(|(t, e)| (t - e).powi(2))
        .sum();
    (sse / truth.len() as f64).sqrt()
}

/// Mean absolute error.
pub fn mae(truth: ArrayView1<f64>, estimate: ArrayView1<f64>) -> f64 {
    if truth.is_empty() || truth.len() != estimate.len() {
        return f64::NAN;
    }
    truth
        .iter()
        .zip(estimate.iter())
        .map(|(t, e)| (t - e).abs())
        .sum::<f64>()
        / truth.len() as f64
}

/// Squared Pearson correlation between truth and estimate.
///
/// `NaN` when either side is constant, e.g. for a mean predictor.
pub fn rsq(truth: ArrayView1<f64>, estimate: ArrayView1<f64>) -> f64 {
    stats::pearson(truth, estimate).map_or(f64::NAN, |r| r * r)
}

/// Coefficient of determination, 1 - SSE/SST.
pub fn rsq_trad(truth: ArrayView1<f64>, estimate: ArrayView1<f64>) -> f64 {
    if truth.is_empty() || truth.len() != estimate.len() {
        return f64::NAN;
    }
    let mean = stats::mean(truth);
    let sst: f64 = truth.iter().map(|t| (t - mean).powi(2)).sum();
    if sst == 0.0 {
        return f64::NAN;
    }
    let sse: f64 = truth
        .iter()
        .zip(estimate.iter())
        .map(|(t, e)| (t - e).powi(2))
        .sum();
    1.0 - sse / sst
}

/// Metric set reported for the final test evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub rmse: f64,
    pub rsq: f64,
    pub rsq_trad: f64,
    pub mae: f64,
}

impl RegressionMetrics {
    pub fn compute(truth: ArrayView1<f64>, estimate: ArrayView1<f64>) -> Self {
        Self {
            rmse: rmse(truth, estimate),
            rsq: rsq(truth, estimate),
            rsq_trad: rsq_trad(truth, estimate),
            mae: mae(truth, estimate),
        }
    }
}
