//! Small dense linear-algebra helpers shared by the engines.

use crate::error::{LearningError, Result};
use ndarray::{Array1, Array2, Axis};

/// Column centering and scaling learned on training data.
#[derive(Debug, Clone)]
pub struct Standardizer {
    means: Array1<f64>,
    sds: Array1<f64>,
}

impl Standardizer {
    /// Zero-variance columns keep a unit scale.
    pub fn fit(x: &Array2<f64>) -> Self {
        let n = x.nrows().max(1) as f64;
        let means = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let sds = Array1::from_shape_fn(x.ncols(), |j| {
            let var = x
                .column(j)
                .iter()
                .map(|v| (v - means[j]).powi(2))
                .sum::<f64>()
                / (n - 1.0).max(1.0);
            let sd = var.sqrt();
            if sd > 1e-12 { sd } else { 1.0 }
        });
        Self { means, sds }
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut out = x.clone();
        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            col.mapv_inplace(|v| (v - self.means[j]) / self.sds[j]);
        }
        out
    }

    pub fn n_features(&self) -> usize {
        self.means.len()
    }
}

/// Centering and scaling of the outcome.
#[derive(Debug, Clone, Copy)]
pub struct TargetScaler {
    pub mean: f64,
    pub sd: f64,
}

impl TargetScaler {
    pub fn fit(y: &Array1<f64>) -> Self {
        let n = y.len();
        let mean = y.mean().unwrap_or(0.0);
        let var = if n > 1 {
            y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };
        let sd = var.sqrt();
        Self {
            mean,
            sd: if sd > 1e-12 { sd } else { 1.0 },
        }
    }

    pub fn scale(&self, y: &Array1<f64>) -> Array1<f64> {
        y.mapv(|v| (v - self.mean) / self.sd)
    }

    pub fn unscale(&self, v: f64) -> f64 {
        v * self.sd + self.mean
    }
}

pub(crate) fn soft_threshold(val: f64, threshold: f64) -> f64 {
    if val > threshold {
        val - threshold
    } else if val < -threshold {
        val + threshold
    } else {
        0.0
    }
}

/// Solve `a x = b` for symmetric positive definite `a` by Cholesky.
pub fn solve_spd(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    if a.ncols() != n || b.len() != n {
        return Err(LearningError::InvalidConfig(format!(
            "cannot solve a {}x{} system with {} right-hand values",
            a.nrows(),
            a.ncols(),
            b.len()
        )));
    }

    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return Err(LearningError::InvalidConfig(
                        "matrix is not positive definite".to_string(),
                    ));
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }

    // forward then back substitution
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * z[k];
        }
        z[i] = sum / l[[i, i]];
    }
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = z[i];
        for k in (i + 1)..n {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standardizer_constant_column() {
        let x = array![[1.0, 5.0], [3.0, 5.0]];
        let z = Standardizer::fit(&x).transform(&x);
        assert!((z[[0, 0]] + z[[1, 0]]).abs() < 1e-12);
        assert_eq!(z[[0, 1]], 0.0);
    }

    #[test]
    fn test_solve_spd() {
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let b = array![2.0, 1.0];
        let x = solve_spd(&a, &b).unwrap();
        // 4x + 2y = 2, 2x + 3y = 1 -> x = 0.5, y = 0
        assert!((x[0] - 0.5).abs() < 1e-12);
        assert!(x[1].abs() < 1e-12);
    }

    #[test]
    fn test_solve_rejects_indefinite() {
        let a = array![[1.0, 2.0], [2.0, 1.0]];
        assert!(solve_spd(&a, &array![1.0, 1.0]).is_err());
    }

    #[test]
    fn test_target_scaler_round_trip() {
        let y = array![2.0, 4.0, 6.0];
        let s = TargetScaler::fit(&y);
        let scaled = s.scale(&y);
        assert!((s.unscale(scaled[2]) - 6.0).abs() < 1e-12);
    }
}
