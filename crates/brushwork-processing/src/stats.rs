//! Small descriptive statistics shared by recipes, metrics and the CLI overview.

use ndarray::{Array2, ArrayView1, Axis};

pub fn mean(values: ArrayView1<f64>) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sum() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator). Zero for fewer than two values.
pub fn sd(values: ArrayView1<f64>) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}

/// Pearson correlation; `None` when either side has zero variance.
pub fn pearson(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let ma = mean(a);
    let mb = mean(b);
    let (mut sab, mut saa, mut sbb) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b.iter()) {
        let dx = x - ma;
        let dy = y - mb;
        sab += dx * dy;
        saa += dx * dx;
        sbb += dy * dy;
    }
    if saa <= f64::EPSILON * a.len() as f64 || sbb <= f64::EPSILON * b.len() as f64 {
        return None;
    }
    Some((sab / (saa.sqrt() * sbb.sqrt())).clamp(-1.0, 1.0))
}

/// Pairwise Pearson correlations of the columns of `x`.
///
/// Undefined correlations (constant columns) are reported as 0; the
/// diagonal is 1.
pub fn correlation_matrix(x: &Array2<f64>) -> Array2<f64> {
    let p = x.ncols();
    let mut corr = Array2::<f64>::eye(p);
    for i in 0..p {
        for j in (i + 1)..p {
            let r = pearson(x.column(i), x.column(j)).unwrap_or(0.0);
            corr[[i, j]] = r;
            corr[[j, i]] = r;
        }
    }
    corr
}

/// Column means of `x`.
pub fn column_means(x: &Array2<f64>) -> Vec<f64> {
    x.axis_iter(Axis(1)).map(mean).collect()
}
