//! Random forest regression: bootstrap-aggregated CART trees with per-split
//! feature sampling.

use super::Regressor;
use super::tree::{RegressionTree, TreeParams};
use crate::error::{LearningError, Result};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct RandomForestParams {
    pub trees: usize,
    pub mtry: usize,
    pub min_n: usize,
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl RandomForest {
    pub fn fit(
        x: &Array2<f64>,
        y: &Array1<f64>,
        params: &RandomForestParams,
        seed: u64,
    ) -> Result<Self> {
        if params.trees == 0 {
            return Err(LearningError::fit_failed("ranger", "trees must be at least 1"));
        }
        // the recipe may leave fewer columns than the tuned mtry
        let mtry = params.mtry.min(x.ncols());
        if mtry == 0 {
            return Err(LearningError::fit_failed(
                "ranger",
                format!("mtry must be at least 1 ({} columns, mtry {})", x.ncols(), params.mtry),
            ));
        }
        if mtry < params.mtry {
            debug!(requested = params.mtry, columns = x.ncols(), "mtry capped at column count");
        }
        let n = x.nrows();
        let tree_params = TreeParams {
            mtry,
            min_n: params.min_n,
            max_depth: None,
        };

        let trees: Vec<RegressionTree> = (0..params.trees)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(tree_idx as u64));
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(x, y, &sample, &tree_params, &mut rng)
            })
            .collect();

        Ok(Self {
            trees,
            n_features: x.ncols(),
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for RandomForest {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let n_trees = self.trees.len() as f64;
        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i);
                self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees
            })
            .collect();
        Ok(Array1::from_vec(predictions))
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}
