//! Principal component projection.
//!
//! Components come from the covariance matrix of the fitting frame,
//! decomposed with cyclic Jacobi rotations. Each component is oriented so
//! its largest-magnitude loading is positive, which keeps the projection
//! stable across runs and platforms.

use crate::dataset::Frame;
use crate::error::{ProcessingError, Result};
use crate::stats;
use ndarray::{Array1, Array2, Axis};

const MAX_SWEEPS: usize = 100;

/// A fitted projection onto the leading principal components.
#[derive(Debug, Clone, PartialEq)]
pub struct PcaProjection {
    pub input_names: Vec<String>,
    pub means: Vec<f64>,
    /// `input_names.len()` x `num_comp` loadings.
    pub rotation: Array2<f64>,
    /// Variance captured by each kept component.
    pub variances: Vec<f64>,
}

impl PcaProjection {
    /// Fit `num_comp` components, clamped to the number of columns.
    pub fn fit(frame: &Frame, num_comp: usize) -> Result<Self> {
        let n = frame.nrows();
        let p = frame.ncols();
        if n < 2 {
            return Err(ProcessingError::InsufficientData(format!(
                "PCA needs at least 2 rows, got {n}"
            )));
        }
        let k = num_comp.min(p);

        let means = stats::column_means(&frame.values);
        let centered = &frame.values - &Array1::from(means.clone());
        let cov = centered.t().dot(&centered) / (n - 1) as f64;
        let (eigenvalues, eigenvectors) = symmetric_eigen(&cov);

        let mut order: Vec<usize> = (0..p).collect();
        order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]).then(a.cmp(&b)));

        let mut rotation = Array2::<f64>::zeros((p, k));
        let mut variances = Vec::with_capacity(k);
        for (out, &src) in order.iter().take(k).enumerate() {
            let mut vector = eigenvectors.column(src).to_owned();
            let pivot = vector
                .iter()
                .copied()
                .fold(0.0f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
            if pivot < 0.0 {
                vector.mapv_inplace(|v| -v);
            }
            rotation.column_mut(out).assign(&vector);
            variances.push(eigenvalues[src].max(0.0));
        }

        Ok(Self {
            input_names: frame.names.clone(),
            means,
            rotation,
            variances,
        })
    }

    pub fn num_comp(&self) -> usize {
        self.rotation.ncols()
    }

    pub fn output_names(&self) -> Vec<String> {
        (1..=self.num_comp()).map(|i| format!("PC{i}")).collect()
    }

    pub fn transform(&self, frame: &Frame) -> Result<Frame> {
        let input = frame.select(&self.input_names)?;
        let centered = input.values - &Array1::from(self.means.clone());
        Frame::new(self.output_names(), centered.dot(&self.rotation))
    }
}

/// Eigen-decomposition of a symmetric matrix.
///
/// Returns eigenvalues and a matrix whose columns are the matching unit
/// eigenvectors, in no particular order.
pub fn symmetric_eigen(matrix: &Array2<f64>) -> (Vec<f64>, Array2<f64>) {
    let n = matrix.nrows();
    let mut a = matrix.clone();
    let mut v = Array2::<f64>::eye(n);
    let scale: f64 = a.iter().map(|x| x * x).sum::<f64>().max(f64::MIN_POSITIVE);

    for _ in 0..MAX_SWEEPS {
        let mut off = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off += a[[p, q]] * a[[p, q]];
            }
        }
        if off <= 1e-24 * scale {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq.abs() <= f64::MIN_POSITIVE {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let sign = if theta >= 0.0 { 1.0 } else { -1.0 };
                let t = sign / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let (akp, akq) = (a[[k, p]], a[[k, q]]);
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[[p, k]], a[[q, k]]);
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let (vkp, vkq) = (v[[k, p]], v[[k, q]]);
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    let eigenvalues = a.diag().to_vec();
    (eigenvalues, v)
}

/// Share of total variance captured by each component of `projection`,
/// relative to the variance of the fitting frame.
pub fn variance_explained(projection: &PcaProjection, frame: &Frame) -> Vec<f64> {
    let total: f64 = frame
        .values
        .axis_iter(Axis(1))
        .map(|c| stats::sd(c).powi(2))
        .sum();
    if total <= 0.0 {
        return vec![0.0; projection.num_comp()];
    }
    projection.variances.iter().map(|v| v / total).collect()
}
