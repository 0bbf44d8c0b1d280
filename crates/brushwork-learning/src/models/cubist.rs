//! Rule-based model trees with committees and neighbor correction.
//!
//! Each committee member partitions the predictor space into at most
//! `max_rules` rules by best-first splitting on the largest reduction in
//! squared error, and fits a ridge-regularized linear model inside every
//! rule. Later members are trained on the adjusted outcome `2y - ŷ` of the
//! previous member, and the committee prediction is the members' average.
//!
//! With `neighbors > 0` a prediction is corrected by the nearest training
//! rows: each neighbor contributes its outcome shifted by the difference
//! between the model's prediction at the query and at the neighbor,
//! weighted by `1 / (0.5 + distance)`. Final predictions are clamped to the
//! range of the training outcome.

use super::Regressor;
use super::linalg::{Standardizer, solve_spd};
use super::tree::{SplitCandidate, best_split};
use crate::error::{LearningError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use std::cmp::Ordering;

/// Minimum number of training rows covered by a rule.
const MIN_RULE_SIZE: usize = 5;
const RIDGE: f64 = 1.0;

#[derive(Debug, Clone, Copy)]
pub struct CubistParams {
    pub committees: usize,
    pub neighbors: usize,
    pub max_rules: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Condition {
    feature_idx: usize,
    threshold: f64,
    /// `true` for `x <= threshold`, `false` for `x > threshold`.
    at_most: bool,
}

impl Condition {
    fn holds(&self, row: ArrayView1<f64>) -> bool {
        let v = row[self.feature_idx];
        if self.at_most {
            v <= self.threshold
        } else {
            v > self.threshold
        }
    }
}

#[derive(Debug, Clone)]
struct Rule {
    conditions: Vec<Condition>,
    intercept: f64,
    coefficients: Array1<f64>,
}

impl Rule {
    fn covers(&self, row: ArrayView1<f64>) -> bool {
        self.conditions.iter().all(|c| c.holds(row))
    }

    fn evaluate(&self, row: ArrayView1<f64>) -> f64 {
        self.intercept + row.dot(&self.coefficients)
    }
}

/// One committee member: rules that partition the space.
#[derive(Debug, Clone)]
struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        self.rules
            .iter()
            .find(|r| r.covers(row))
            .or_else(|| self.rules.first())
            .map_or(0.0, |r| r.evaluate(row))
    }
}

#[derive(Debug, Clone)]
pub struct CubistModel {
    scaler: Standardizer,
    committees: Vec<RuleSet>,
    neighbors: usize,
    z_train: Array2<f64>,
    y_train: Array1<f64>,
    fitted_train: Array1<f64>,
    y_range: (f64, f64),
}

impl CubistModel {
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, params: &CubistParams) -> Result<Self> {
        if params.committees == 0 || params.max_rules == 0 {
            return Err(LearningError::fit_failed(
                "cubist",
                "committees and max_rules must be at least 1",
            ));
        }
        let scaler = Standardizer::fit(x);
        let z = scaler.transform(x);
        let n = z.nrows();

        let mut committees = Vec::with_capacity(params.committees);
        let mut target = y.clone();
        for _ in 0..params.committees {
            let member = grow_rules(&z, &target, params.max_rules)?;
            let fitted = Array1::from_iter(z.outer_iter().map(|row| member.predict_row(row)));
            target = Array1::from_shape_fn(n, |i| 2.0 * y[i] - fitted[i]);
            committees.push(member);
        }

        let y_min = y.iter().copied().fold(f64::INFINITY, f64::min);
        let y_max = y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut model = Self {
            scaler,
            committees,
            neighbors: params.neighbors,
            z_train: z,
            y_train: y.clone(),
            fitted_train: Array1::zeros(0),
            y_range: (y_min, y_max),
        };
        model.fitted_train = Array1::from_iter(
            model
                .z_train
                .outer_iter()
                .map(|row| model.committee_prediction(row)),
        );
        Ok(model)
    }

    pub fn n_rules(&self) -> usize {
        self.committees.iter().map(|c| c.rules.len()).sum()
    }

    fn committee_prediction(&self, row: ArrayView1<f64>) -> f64 {
        self.committees.iter().map(|c| c.predict_row(row)).sum::<f64>()
            / self.committees.len() as f64
    }

    fn neighbor_adjusted(&self, row: ArrayView1<f64>, raw: f64) -> f64 {
        let k = self.neighbors.min(self.z_train.nrows());
        if k == 0 {
            return raw;
        }
        let mut dists: Vec<(f64, usize)> = self
            .z_train
            .outer_iter()
            .enumerate()
            .map(|(i, train)| {
                let d = train
                    .iter()
                    .zip(row.iter())
                    .map(|(a, b)| (a - b).powi(2))
                    .sum::<f64>()
                    .sqrt();
                (d, i)
            })
            .collect();
        dists.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        let mut weighted = 0.0;
        let mut total = 0.0;
        for &(d, i) in &dists[..k] {
            let w = 1.0 / (0.5 + d);
            weighted += w * (self.y_train[i] + raw - self.fitted_train[i]);
            total += w;
        }
        weighted / total
    }
}

impl Regressor for CubistModel {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let z = self.scaler.transform(x);
        let (lo, hi) = self.y_range;
        Ok(Array1::from_iter(z.outer_iter().map(|row| {
            let raw = self.committee_prediction(row);
            self.neighbor_adjusted(row, raw).clamp(lo, hi)
        })))
    }

    fn n_features(&self) -> usize {
        self.scaler.n_features()
    }
}

struct Region {
    conditions: Vec<Condition>,
    indices: Vec<usize>,
    split: Option<SplitCandidate>,
}

impl Region {
    fn new(z: &Array2<f64>, y: &Array1<f64>, conditions: Vec<Condition>, indices: Vec<usize>) -> Self {
        let features: Vec<usize> = (0..z.ncols()).collect();
        let split = best_split(z, y, &indices, &features, MIN_RULE_SIZE);
        Self {
            conditions,
            indices,
            split,
        }
    }
}

fn grow_rules(z: &Array2<f64>, y: &Array1<f64>, max_rules: usize) -> Result<RuleSet> {
    let all: Vec<usize> = (0..z.nrows()).collect();
    let mut regions = vec![Region::new(z, y, Vec::new(), all)];

    while regions.len() < max_rules {
        let best = regions
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.split.map(|s| (i, s.gain)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        let Some((idx, _)) = best else {
            break;
        };
        let region = regions.swap_remove(idx);
        let Some(split) = region.split else {
            break;
        };
        let (left, right): (Vec<usize>, Vec<usize>) = region
            .indices
            .iter()
            .partition(|&&i| z[[i, split.feature_idx]] <= split.threshold);
        for (indices, at_most) in [(left, true), (right, false)] {
            let mut conditions = region.conditions.clone();
            conditions.push(Condition {
                feature_idx: split.feature_idx,
                threshold: split.threshold,
                at_most,
            });
            regions.push(Region::new(z, y, conditions, indices));
        }
    }

    let rules = regions
        .into_iter()
        .map(|r| fit_rule_model(z, y, r.conditions, &r.indices))
        .collect::<Result<Vec<_>>>()?;
    Ok(RuleSet { rules })
}

/// Ridge regression on the rows covered by a rule.
fn fit_rule_model(
    z: &Array2<f64>,
    y: &Array1<f64>,
    conditions: Vec<Condition>,
    indices: &[usize],
) -> Result<Rule> {
    let zs = z.select(Axis(0), indices);
    let ys = Array1::from_iter(indices.iter().map(|&i| y[i]));
    let p = zs.ncols();
    let z_mean = zs
        .mean_axis(Axis(0))
        .ok_or_else(|| LearningError::fit_failed("cubist", "empty rule"))?;
    let y_mean = ys.mean().unwrap_or(0.0);
    let centered = &zs - &z_mean;
    let yc = ys.mapv(|v| v - y_mean);

    let mut gram = centered.t().dot(&centered);
    for j in 0..p {
        gram[[j, j]] += RIDGE;
    }
    let rhs = centered.t().dot(&yc);
    let coefficients =
        solve_spd(&gram, &rhs).map_err(|e| LearningError::fit_failed("cubist", e))?;
    let intercept = y_mean - z_mean.dot(&coefficients);
    Ok(Rule {
        conditions,
        intercept,
        coefficients,
    })
}
