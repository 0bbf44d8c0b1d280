//! Epsilon-insensitive support vector regression with a radial basis kernel.
//!
//! Predictors and outcome are standardized. The bias is absorbed into the
//! kernel (`K + 1`), which leaves a box-constrained dual that is solved by
//! cyclic coordinate descent:
//!
//! ```text
//! min_b  1/2 b'Qb - y'b + margin * |b|_1   subject to  -cost <= b_i <= cost
//! ```
//!
//! The kernel is `exp(-rbf_sigma * ||a - b||^2)`.

use super::Regressor;
use super::linalg::{Standardizer, TargetScaler, soft_threshold};
use crate::error::{LearningError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};

const MAX_SWEEPS: usize = 500;
const TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy)]
pub struct SvmParams {
    pub cost: f64,
    pub rbf_sigma: f64,
    pub margin: f64,
}

#[derive(Debug, Clone)]
pub struct SvmRegressor {
    x_scaler: Standardizer,
    y_scaler: TargetScaler,
    support: Array2<f64>,
    dual: Array1<f64>,
    sigma: f64,
}

fn rbf(a: ArrayView1<f64>, b: ArrayView1<f64>, sigma: f64) -> f64 {
    let sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
    (-sigma * sq).exp()
}

impl SvmRegressor {
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, params: &SvmParams) -> Result<Self> {
        let valid = params.cost > 0.0 && params.rbf_sigma > 0.0 && params.margin >= 0.0;
        if !valid {
            return Err(LearningError::fit_failed(
                "svm_rbf",
                format!(
                    "cost {} / rbf_sigma {} / margin {} out of range",
                    params.cost, params.rbf_sigma, params.margin
                ),
            ));
        }
        let x_scaler = Standardizer::fit(x);
        let y_scaler = TargetScaler::fit(y);
        let z = x_scaler.transform(x);
        let t = y_scaler.scale(y);
        let n = z.nrows();

        let mut q = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            for j in 0..=i {
                let k = rbf(z.row(i), z.row(j), params.rbf_sigma) + 1.0;
                q[[i, j]] = k;
                q[[j, i]] = k;
            }
        }

        let mut beta = Array1::<f64>::zeros(n);
        let mut q_beta = Array1::<f64>::zeros(n);
        for _ in 0..MAX_SWEEPS {
            let mut max_change = 0.0f64;
            for i in 0..n {
                let qii = q[[i, i]];
                let b = q_beta[i] - qii * beta[i] - t[i];
                let updated = (-soft_threshold(b, params.margin) / qii).clamp(-params.cost, params.cost);
                let delta = updated - beta[i];
                if delta != 0.0 {
                    q_beta.scaled_add(delta, &q.column(i));
                    beta[i] = updated;
                    max_change = max_change.max(delta.abs());
                }
            }
            if max_change < TOLERANCE {
                break;
            }
        }

        let support_idx: Vec<usize> = (0..n).filter(|&i| beta[i] != 0.0).collect();
        Ok(Self {
            support: z.select(Axis(0), &support_idx),
            dual: Array1::from_iter(support_idx.iter().map(|&i| beta[i])),
            x_scaler,
            y_scaler,
            sigma: params.rbf_sigma,
        })
    }

    pub fn n_support(&self) -> usize {
        self.dual.len()
    }
}

impl Regressor for SvmRegressor {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let z = self.x_scaler.transform(x);
        Ok(Array1::from_iter(z.outer_iter().map(|row| {
            let f: f64 = self
                .support
                .outer_iter()
                .zip(self.dual.iter())
                .map(|(sv, b)| b * (rbf(sv, row, self.sigma) + 1.0))
                .sum();
            self.y_scaler.unscale(f)
        })))
    }

    fn n_features(&self) -> usize {
        self.x_scaler.n_features()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::rmse;
    use crate::models::test_data;

    fn params(margin: f64) -> SvmParams {
        SvmParams {
            cost: 4.0,
            rbf_sigma: 0.1,
            margin,
        }
    }

    #[test]
    fn test_fits_smooth_signal() {
        let (x, y) = test_data::linear(100, 1);
        let model = SvmRegressor::fit(&x, &y, &params(0.01)).unwrap();
        let score = rmse(y.view(), model.predict(&x).unwrap().view());
        assert!(score < 0.3, "rmse {score}");
    }

    #[test]
    fn test_wider_margin_uses_fewer_support_vectors() {
        let (x, y) = test_data::linear(80, 2);
        let narrow = SvmRegressor::fit(&x, &y, &params(0.0)).unwrap();
        let wide = SvmRegressor::fit(&x, &y, &params(0.2)).unwrap();
        assert!(wide.n_support() < narrow.n_support());
    }

    #[test]
    fn test_nonpositive_cost_rejected() {
        let (x, y) = test_data::linear(10, 1);
        let bad = SvmParams {
            cost: 0.0,
            rbf_sigma: 0.1,
            margin: 0.1,
        };
        assert!(SvmRegressor::fit(&x, &y, &bad).is_err());
    }
}
