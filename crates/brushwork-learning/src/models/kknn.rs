//! Weighted k-nearest-neighbor regression.
//!
//! Features are standardized on the training data. For a query point the
//! k nearest training rows under the Minkowski distance of order
//! `dist_power` are found, their distances are divided by the distance of
//! the (k+1)-th neighbor, and a kernel turns the normalized distances into
//! weights for a weighted mean of the neighbors' outcomes.

use super::Regressor;
use super::linalg::Standardizer;
use crate::error::{LearningError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

const KERNEL_NAMES: [&str; 9] = [
    "rectangular",
    "triangular",
    "epanechnikov",
    "biweight",
    "triweight",
    "cos",
    "inv",
    "gaussian",
    "rank",
];

/// Neighbor weighting kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kernel {
    Rectangular,
    Triangular,
    Epanechnikov,
    Biweight,
    Triweight,
    Cos,
    Inv,
    Gaussian,
    Rank,
}

impl Kernel {
    pub fn names() -> &'static [&'static str] {
        &KERNEL_NAMES
    }

    /// Weight for a normalized distance `d` in (0, 1).
    fn weight(&self, d: f64) -> f64 {
        match self {
            Kernel::Rectangular => 0.5,
            Kernel::Triangular => 1.0 - d,
            Kernel::Epanechnikov => 0.75 * (1.0 - d * d),
            Kernel::Biweight => 15.0 / 16.0 * (1.0 - d * d).powi(2),
            Kernel::Triweight => 35.0 / 32.0 * (1.0 - d * d).powi(3),
            Kernel::Cos => PI / 4.0 * (PI / 2.0 * d).cos(),
            Kernel::Inv => 1.0 / d,
            Kernel::Gaussian => (-0.5 * d * d).exp() / (2.0 * PI).sqrt(),
            // handled by rank position
            Kernel::Rank => 1.0,
        }
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let idx = *self as usize;
        f.write_str(KERNEL_NAMES[idx])
    }
}

impl FromStr for Kernel {
    type Err = LearningError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rectangular" => Ok(Kernel::Rectangular),
            "triangular" => Ok(Kernel::Triangular),
            "epanechnikov" => Ok(Kernel::Epanechnikov),
            "biweight" => Ok(Kernel::Biweight),
            "triweight" => Ok(Kernel::Triweight),
            "cos" => Ok(Kernel::Cos),
            "inv" => Ok(Kernel::Inv),
            "gaussian" => Ok(Kernel::Gaussian),
            "rank" => Ok(Kernel::Rank),
            other => Err(LearningError::UnknownComponent {
                kind: "kernel",
                name: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct KknnParams {
    pub neighbors: usize,
    pub kernel: Kernel,
    pub dist_power: f64,
}

#[derive(Debug, Clone)]
pub struct KknnModel {
    params: KknnParams,
    scaler: Standardizer,
    x_train: Array2<f64>,
    y_train: Array1<f64>,
}

impl KknnModel {
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, params: &KknnParams) -> Result<Self> {
        if params.neighbors == 0 {
            return Err(LearningError::fit_failed("kknn", "neighbors must be at least 1"));
        }
        if params.dist_power.is_nan() || params.dist_power <= 0.0 {
            return Err(LearningError::fit_failed(
                "kknn",
                format!("dist_power must be positive, got {}", params.dist_power),
            ));
        }
        let scaler = Standardizer::fit(x);
        Ok(Self {
            params: *params,
            x_train: scaler.transform(x),
            scaler,
            y_train: y.clone(),
        })
    }

    fn predict_one(&self, query: ArrayView1<f64>) -> f64 {
        let n = self.x_train.nrows();
        // one extra neighbor is needed as the distance scale
        let k = self.params.neighbors.min(n.saturating_sub(1)).max(1);

        let mut dists: Vec<(f64, usize)> = self
            .x_train
            .outer_iter()
            .enumerate()
            .map(|(i, row)| (minkowski(query, row, self.params.dist_power), i))
            .collect();
        dists.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal).then(a.1.cmp(&b.1)));

        let scale = dists.get(k).map_or(0.0, |d| d.0);
        let neighbors = &dists[..k.min(dists.len())];

        let weights: Vec<f64> = if self.params.kernel == Kernel::Rank {
            (0..neighbors.len()).map(|r| (k - r) as f64).collect()
        } else if scale <= 0.0 {
            vec![1.0; neighbors.len()]
        } else {
            neighbors
                .iter()
                .map(|(d, _)| {
                    let u = (d / scale).clamp(1e-6, 1.0 - 1e-6);
                    self.params.kernel.weight(u)
                })
                .collect()
        };

        let total: f64 = weights.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return neighbors.iter().map(|(_, i)| self.y_train[*i]).sum::<f64>()
                / neighbors.len() as f64;
        }
        neighbors
            .iter()
            .zip(weights.iter())
            .map(|((_, i), w)| w * self.y_train[*i])
            .sum::<f64>()
            / total
    }
}

impl Regressor for KknnModel {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let z = self.scaler.transform(x);
        let predictions: Vec<f64> = (0..z.nrows())
            .into_par_iter()
            .map(|i| self.predict_one(z.row(i)))
            .collect();
        Ok(Array1::from_vec(predictions))
    }

    fn n_features(&self) -> usize {
        self.scaler.n_features()
    }
}

fn minkowski(a: ArrayView1<f64>, b: ArrayView1<f64>, p: f64) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs().powf(p))
        .sum::<f64>()
        .powf(1.0 / p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn params(neighbors: usize, kernel: Kernel) -> KknnParams {
        KknnParams {
            neighbors,
            kernel,
            dist_power: 2.0,
        }
    }

    #[test]
    fn test_kernel_names_round_trip() {
        for name in Kernel::names() {
            let kernel: Kernel = name.parse().unwrap();
            assert_eq!(kernel.to_string(), *name);
        }
        assert!("quartic".parse::<Kernel>().is_err());
    }

    #[test]
    fn test_one_neighbor_returns_nearest_outcome() {
        let x = array![[0.0], [1.0], [2.0], [10.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];
        let model = KknnModel::fit(&x, &y, &params(1, Kernel::Rectangular)).unwrap();
        let pred = model.predict(&array![[0.1], [9.0]]).unwrap();
        assert_eq!(pred[0], 1.0);
        assert_eq!(pred[1], 4.0);
    }

    #[test]
    fn test_rectangular_is_plain_mean() {
        let x = array![[0.0], [1.0], [2.0], [10.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];
        let model = KknnModel::fit(&x, &y, &params(3, Kernel::Rectangular)).unwrap();
        let pred = model.predict(&array![[1.0]]).unwrap();
        assert!((pred[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_triangular_prefers_closer_neighbors() {
        let x = array![[0.0], [1.0], [3.0], [10.0]];
        let y = array![0.0, 0.0, 6.0, 100.0];
        let model = KknnModel::fit(&x, &y, &params(3, Kernel::Triangular)).unwrap();
        let pred = model.predict(&array![[0.5]]).unwrap();
        // rectangular would give 2.0
        assert!(pred[0] < 2.0);
        assert!(pred[0] > 0.0);
    }

    #[test]
    fn test_neighbors_larger_than_training_set() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![3.0, 6.0, 9.0];
        let model = KknnModel::fit(&x, &y, &params(15, Kernel::Gaussian)).unwrap();
        let pred = model.predict(&array![[1.0]]).unwrap();
        assert!(pred[0].is_finite());
    }

    #[test]
    fn test_zero_neighbors_rejected() {
        let x = array![[0.0], [1.0]];
        let y = array![1.0, 2.0];
        assert!(KknnModel::fit(&x, &y, &params(0, Kernel::Inv)).is_err());
    }
}
