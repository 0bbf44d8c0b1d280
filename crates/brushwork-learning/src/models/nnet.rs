//! Single-hidden-layer perceptron for regression.
//!
//! Logistic hidden units and a linear output, trained by full-batch
//! gradient descent with momentum on standardized predictors and outcome.
//! `penalty` is an L2 weight decay on both weight matrices; `epochs` is the
//! number of full passes.

use super::Regressor;
use super::linalg::{Standardizer, TargetScaler};
use crate::error::{LearningError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const LEARNING_RATE: f64 = 0.05;
const MOMENTUM: f64 = 0.9;
const INIT_RANGE: f64 = 0.7;

#[derive(Debug, Clone, Copy)]
pub struct MlpParams {
    pub hidden_units: usize,
    pub penalty: f64,
    pub epochs: usize,
}

#[derive(Debug, Clone)]
pub struct MlpRegressor {
    x_scaler: Standardizer,
    y_scaler: TargetScaler,
    w1: Array2<f64>,
    b1: Array1<f64>,
    w2: Array1<f64>,
    b2: f64,
}

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

impl MlpRegressor {
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, params: &MlpParams, seed: u64) -> Result<Self> {
        if params.hidden_units == 0 || params.epochs == 0 {
            return Err(LearningError::fit_failed(
                "nnet",
                "hidden_units and epochs must be at least 1",
            ));
        }
        let x_scaler = Standardizer::fit(x);
        let y_scaler = TargetScaler::fit(y);
        let z = x_scaler.transform(x);
        let t = y_scaler.scale(y);
        let (n, p) = z.dim();
        let h = params.hidden_units;
        let n_f = n as f64;

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut w1 = Array2::from_shape_fn((p, h), |_| rng.gen_range(-INIT_RANGE..INIT_RANGE));
        let mut b1 = Array1::from_shape_fn(h, |_| rng.gen_range(-INIT_RANGE..INIT_RANGE));
        let mut w2 = Array1::from_shape_fn(h, |_| rng.gen_range(-INIT_RANGE..INIT_RANGE));
        let mut b2 = 0.0;

        let mut v_w1 = Array2::<f64>::zeros((p, h));
        let mut v_b1 = Array1::<f64>::zeros(h);
        let mut v_w2 = Array1::<f64>::zeros(h);
        let mut v_b2 = 0.0;

        for _ in 0..params.epochs {
            let hidden = (z.dot(&w1) + &b1).mapv(sigmoid);
            let out = hidden.dot(&w2) + b2;
            let err = &out - &t;

            let g_w2 = hidden.t().dot(&err) / n_f + &(&w2 * params.penalty);
            let g_b2 = err.sum() / n_f;

            let mut delta = err.clone().insert_axis(Axis(1)).dot(&w2.view().insert_axis(Axis(0)));
            delta.zip_mut_with(&hidden, |d, a| *d *= a * (1.0 - a));
            let g_w1 = z.t().dot(&delta) / n_f + &(&w1 * params.penalty);
            let g_b1 = delta.sum_axis(Axis(0)) / n_f;

            v_w1 = &v_w1 * MOMENTUM - &(g_w1 * LEARNING_RATE);
            v_b1 = &v_b1 * MOMENTUM - &(g_b1 * LEARNING_RATE);
            v_w2 = &v_w2 * MOMENTUM - &(g_w2 * LEARNING_RATE);
            v_b2 = v_b2 * MOMENTUM - g_b2 * LEARNING_RATE;

            w1 += &v_w1;
            b1 += &v_b1;
            w2 += &v_w2;
            b2 += v_b2;
        }

        if w1.iter().chain(w2.iter()).any(|v| !v.is_finite()) || !b2.is_finite() {
            return Err(LearningError::fit_failed("nnet", "weights diverged"));
        }
        Ok(Self {
            x_scaler,
            y_scaler,
            w1,
            b1,
            w2,
            b2,
        })
    }
}

impl Regressor for MlpRegressor {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let z = self.x_scaler.transform(x);
        let hidden = (z.dot(&self.w1) + &self.b1).mapv(sigmoid);
        let out = hidden.dot(&self.w2) + self.b2;
        Ok(out.mapv(|v| self.y_scaler.unscale(v)))
    }

    fn n_features(&self) -> usize {
        self.x_scaler.n_features()
    }
}
