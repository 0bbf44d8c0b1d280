//! High-correlation filter.
//!
//! Repeatedly takes the remaining pair with the largest absolute
//! correlation above the threshold and drops the member whose mean absolute
//! correlation with the remaining columns is larger. Ties drop the later
//! column.

use crate::dataset::Frame;
use crate::stats;

pub struct CorrelationFilter;

impl CorrelationFilter {
    /// Names of the columns of `frame` to remove.
    pub fn detect(frame: &Frame, threshold: f64) -> Vec<String> {
        let p = frame.ncols();
        if p < 2 || frame.nrows() < 2 {
            return Vec::new();
        }
        let corr = stats::correlation_matrix(&frame.values).mapv(f64::abs);
        let mut alive = vec![true; p];
        let mut removed = Vec::new();

        loop {
            let mut best: Option<(usize, usize, f64)> = None;
            for i in 0..p {
                if !alive[i] {
                    continue;
                }
                for j in (i + 1)..p {
                    if !alive[j] || corr[[i, j]] <= threshold {
                        continue;
                    }
                    if best.is_none_or(|(_, _, r)| corr[[i, j]] > r) {
                        best = Some((i, j, corr[[i, j]]));
                    }
                }
            }
            let Some((i, j, _)) = best else { break };

            let mean_abs = |k: usize| {
                let (sum, count) = (0..p)
                    .filter(|&m| alive[m])
                    .fold((0.0, 0usize), |(s, c), m| (s + corr[[k, m]], c + 1));
                sum / count as f64
            };
            let drop = if mean_abs(i) > mean_abs(j) { i } else { j };
            alive[drop] = false;
            removed.push(drop);
        }

        removed.sort_unstable();
        removed.into_iter().map(|k| frame.names[k].clone()).collect()
    }
}
