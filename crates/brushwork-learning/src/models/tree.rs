//! CART regression trees.
//!
//! Used as the base learner of the random forest. The split search is also
//! shared with the rule learner in `cubist`.

use super::Regressor;
use crate::error::Result;
use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use rand::seq::index::sample;
use std::cmp::Ordering;

/// Tree node: either a leaf with a prediction or an axis-aligned split.
#[derive(Debug, Clone)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

impl TreeNode {
    fn predict(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature_idx] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.leaves() + right.leaves(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    /// Features sampled as split candidates at every node.
    pub mtry: usize,
    /// Nodes with fewer rows are not split further.
    pub min_n: usize,
    pub max_depth: Option<usize>,
}

/// Best split found for a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SplitCandidate {
    pub feature_idx: usize,
    pub threshold: f64,
    /// Reduction in the sum of squared errors.
    pub gain: f64,
}

/// Scan `features` for the split of `indices` with the largest SSE
/// reduction, keeping at least `min_leaf` rows on each side.
///
/// Each feature is sorted once and swept with prefix sums; thresholds are
/// midpoints between distinct consecutive values.
pub(crate) fn best_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    indices: &[usize],
    features: &[usize],
    min_leaf: usize,
) -> Option<SplitCandidate> {
    let n = indices.len();
    let min_leaf = min_leaf.max(1);
    if n < 2 * min_leaf {
        return None;
    }
    let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
    let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
    let parent_sse = total_sq - total_sum * total_sum / n as f64;

    let mut best: Option<SplitCandidate> = None;
    let mut order: Vec<usize> = Vec::with_capacity(n);
    for &feature_idx in features {
        order.clear();
        order.extend_from_slice(indices);
        order.sort_by(|&a, &b| {
            x[[a, feature_idx]]
                .partial_cmp(&x[[b, feature_idx]])
                .unwrap_or(Ordering::Equal)
        });

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for pos in 0..n - 1 {
            let yi = y[order[pos]];
            left_sum += yi;
            left_sq += yi * yi;
            let left_n = pos + 1;
            let right_n = n - left_n;
            if left_n < min_leaf || right_n < min_leaf {
                continue;
            }
            let here = x[[order[pos], feature_idx]];
            let next = x[[order[pos + 1], feature_idx]];
            if here == next {
                continue;
            }
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / left_n as f64)
                + (right_sq - right_sum * right_sum / right_n as f64);
            let gain = parent_sse - sse;
            if gain > 1e-12 && best.is_none_or(|b| gain > b.gain) {
                best = Some(SplitCandidate {
                    feature_idx,
                    threshold: (here + next) / 2.0,
                    gain,
                });
            }
        }
    }
    best
}

/// A single regression tree.
#[derive(Debug, Clone)]
pub struct RegressionTree {
    root: TreeNode,
    n_features: usize,
}

impl RegressionTree {
    /// Grow a tree on the rows in `indices` (repeats allowed, as in a
    /// bootstrap sample).
    pub fn fit<R: Rng>(
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        params: &TreeParams,
        rng: &mut R,
    ) -> Self {
        let root = grow(x, y, indices, params, 0, rng);
        Self {
            root,
            n_features: x.ncols(),
        }
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    pub fn n_leaves(&self) -> usize {
        self.root.leaves()
    }

    pub(crate) fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        self.root.predict(row)
    }
}

impl Regressor for RegressionTree {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(Array1::from_iter(x.outer_iter().map(|row| self.root.predict(row))))
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}

fn grow<R: Rng>(
    x: &Array2<f64>,
    y: &Array1<f64>,
    indices: &[usize],
    params: &TreeParams,
    depth: usize,
    rng: &mut R,
) -> TreeNode {
    let n_samples = indices.len();
    let value = indices.iter().map(|&i| y[i]).sum::<f64>() / n_samples.max(1) as f64;
    let leaf = TreeNode::Leaf { value, n_samples };

    if n_samples < params.min_n.max(2) || params.max_depth.is_some_and(|d| depth >= d) {
        return leaf;
    }
    let p = x.ncols();
    let mtry = params.mtry.clamp(1, p);
    let features = if mtry == p {
        (0..p).collect::<Vec<_>>()
    } else {
        sample(rng, p, mtry).into_vec()
    };

    let Some(split) = best_split(x, y, indices, &features, 1) else {
        return leaf;
    };
    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .partition(|&&i| x[[i, split.feature_idx]] <= split.threshold);

    TreeNode::Split {
        feature_idx: split.feature_idx,
        threshold: split.threshold,
        left: Box::new(grow(x, y, &left_idx, params, depth + 1, rng)),
        right: Box::new(grow(x, y, &right_idx, params, depth + 1, rng)),
        n_samples,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_data;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn all_rows(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    #[test]
    fn test_best_split_finds_step() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![0.0, 0.0, 10.0, 10.0];
        let split = best_split(&x, &y, &all_rows(4), &[0], 1).unwrap();
        assert_eq!(split.feature_idx, 0);
        assert_eq!(split.threshold, 2.5);
        assert!((split.gain - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_best_split_respects_min_leaf() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![0.0, 10.0, 10.0, 10.0];
        let split = best_split(&x, &y, &all_rows(4), &[0], 2).unwrap();
        assert_eq!(split.threshold, 2.5);
    }

    #[test]
    fn test_constant_target_has_no_split() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![5.0, 5.0, 5.0];
        assert!(best_split(&x, &y, &all_rows(3), &[0], 1).is_none());
    }

    #[test]
    fn test_tree_fits_step_function() {
        let (x, y) = test_data::step(100, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let params = TreeParams {
            mtry: 3,
            min_n: 2,
            max_depth: None,
        };
        let tree = RegressionTree::fit(&x, &y, &all_rows(100), &params, &mut rng);
        let pred = tree.predict(&x).unwrap();
        assert_eq!(pred, y);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn test_min_n_stops_growth() {
        let (x, y) = test_data::linear(30, 2);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let params = TreeParams {
            mtry: 3,
            min_n: 31,
            max_depth: None,
        };
        let tree = RegressionTree::fit(&x, &y, &all_rows(30), &params, &mut rng);
        assert_eq!(tree.n_leaves(), 1);
    }
}
