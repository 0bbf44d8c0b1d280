//! Elimination tests for racing.
//!
//! Both tests receive the per-fold RMSE history of the alive candidates
//! (`None` for a failed evaluation) and return the positions of the
//! candidates that are significantly worse than the current best.

use crate::config::{EliminationTest, TuningConfig};
use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::trace;

/// Per-fold scores of one alive candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Contender<'a> {
    /// Position of the candidate in the grid.
    pub index: usize,
    /// One entry per evaluated fold; `None` when the evaluation failed.
    pub scores: &'a [Option<f64>],
}

/// Positions (grid indices) of contenders to eliminate.
pub fn eliminate(contenders: &[Contender<'_>], config: &TuningConfig) -> Vec<usize> {
    match config.test {
        EliminationTest::Anova => anova(contenders, config.alpha, config.min_difference),
        EliminationTest::PairedT => paired_t(contenders, config.alpha, config.min_difference),
    }
}

/// One-sided upper tail of Student's t.
fn upper_tail(t: f64, df: f64) -> Option<f64> {
    let dist = StudentsT::new(0.0, 1.0, df).ok()?;
    Some(1.0 - dist.cdf(t))
}

fn is_worse(diff: f64, p_value: Option<f64>, alpha: f64, min_difference: f64) -> bool {
    diff > min_difference && p_value.is_some_and(|p| p < alpha)
}

fn complete_folds(scored: &[&Contender<'_>], n_folds: usize) -> Vec<usize> {
    (0..n_folds)
        .filter(|&f| scored.iter().all(|c| c.scores[f].is_some()))
        .collect()
}

/// Two-way additive model on the folds every contender completed.
///
/// The residual mean square of `score ~ candidate + fold` is pooled over
/// all contenders, so each comparison with the best uses
/// `se = sqrt(2 * MSE / folds)` on `(c - 1)(f - 1)` degrees of freedom.
///
/// When scattered failures leave fewer than two complete folds, the
/// contenders with the most failures sit out this round (they are not
/// eliminated) until two complete folds remain.
fn anova(contenders: &[Contender<'_>], alpha: f64, min_difference: f64) -> Vec<usize> {
    let mut scored: Vec<&Contender<'_>> = contenders
        .iter()
        .filter(|c| c.scores.iter().any(Option::is_some))
        .collect();
    let n_folds = scored.iter().map(|c| c.scores.len()).min().unwrap_or(0);
    let mut complete = complete_folds(&scored, n_folds);
    while complete.len() < 2 && scored.len() > 2 {
        // last position among the sparsest
        let Some((pos, _)) = scored
            .iter()
            .enumerate()
            .rev()
            .min_by_key(|(_, c)| c.scores.iter().flatten().count())
        else {
            break;
        };
        trace!(candidate = scored[pos].index, "sitting out the anova round");
        scored.remove(pos);
        complete = complete_folds(&scored, n_folds);
    }

    let a = scored.len();
    let f = complete.len();
    if a < 2 || f < 2 {
        return Vec::new();
    }

    let table: Vec<Vec<f64>> = scored
        .iter()
        .map(|c| complete.iter().filter_map(|&fold| c.scores[fold]).collect())
        .collect();
    let row_means: Vec<f64> = table.iter().map(|r| r.iter().sum::<f64>() / f as f64).collect();
    let col_means: Vec<f64> = (0..f)
        .map(|j| table.iter().map(|r| r[j]).sum::<f64>() / a as f64)
        .collect();
    let grand = row_means.iter().sum::<f64>() / a as f64;

    let sse: f64 = table
        .iter()
        .enumerate()
        .flat_map(|(i, row)| {
            let row_means = &row_means;
            let col_means = &col_means;
            row.iter()
                .enumerate()
                .map(move |(j, v)| (v - row_means[i] - col_means[j] + grand).powi(2))
        })
        .sum();
    let df = ((a - 1) * (f - 1)) as f64;
    let mse = sse / df;
    let se = (2.0 * mse / f as f64).sqrt();

    let best = best_position(&row_means);
    let mut eliminated = Vec::new();
    for (pos, contender) in scored.iter().enumerate() {
        if pos == best {
            continue;
        }
        let diff = row_means[pos] - row_means[best];
        let p_value = if se > 0.0 {
            upper_tail(diff / se, df)
        } else if diff > 0.0 {
            Some(0.0)
        } else {
            None
        };
        trace!(candidate = contender.index, diff, ?p_value, "anova comparison");
        if is_worse(diff, p_value, alpha, min_difference) {
            eliminated.push(contender.index);
        }
    }
    eliminated
}

/// Paired t-test of every contender against the best, Bonferroni-adjusted
/// for the number of comparisons.
fn paired_t(contenders: &[Contender<'_>], alpha: f64, min_difference: f64) -> Vec<usize> {
    let means: Vec<Option<f64>> = contenders.iter().map(|c| mean_of(c.scores)).collect();
    let valid: Vec<f64> = means.iter().map(|m| m.unwrap_or(f64::INFINITY)).collect();
    if means.iter().filter(|m| m.is_some()).count() < 2 {
        return Vec::new();
    }
    let best = best_position(&valid);
    let comparisons = (means.iter().filter(|m| m.is_some()).count() - 1) as f64;
    let level = alpha / comparisons;

    let mut eliminated = Vec::new();
    for (pos, contender) in contenders.iter().enumerate() {
        if pos == best || means[pos].is_none() {
            continue;
        }
        let diffs: Vec<f64> = contender
            .scores
            .iter()
            .zip(contenders[best].scores.iter())
            .filter_map(|(c, b)| Some((*c)? - (*b)?))
            .collect();
        if diffs.len() < 2 {
            continue;
        }
        let n = diffs.len() as f64;
        let mean = diffs.iter().sum::<f64>() / n;
        let var = diffs.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let se = (var / n).sqrt();
        let p_value = if se > 0.0 {
            upper_tail(mean / se, n - 1.0)
        } else if mean > 0.0 {
            Some(0.0)
        } else {
            None
        };
        if is_worse(mean, p_value, level, min_difference) {
            eliminated.push(contender.index);
        }
    }
    eliminated
}

fn mean_of(scores: &[Option<f64>]) -> Option<f64> {
    let ok: Vec<f64> = scores.iter().flatten().copied().collect();
    if ok.is_empty() {
        None
    } else {
        Some(ok.iter().sum::<f64>() / ok.len() as f64)
    }
}

/// Lowest mean; ties keep the earlier position.
fn best_position(means: &[f64]) -> usize {
    let mut best = 0;
    for (i, m) in means.iter().enumerate() {
        if *m < means[best] {
            best = i;
        }
    }
    best
}
