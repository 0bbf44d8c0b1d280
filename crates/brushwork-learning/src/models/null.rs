use super::Regressor;
use crate::error::Result;
use ndarray::{Array1, Array2};

/// Predicts the training mean for every row.
#[derive(Debug, Clone, Copy)]
pub struct NullModel {
    mean: f64,
    n_features: usize,
}

impl NullModel {
    pub fn fit(y: &Array1<f64>) -> Self {
        Self {
            mean: y.mean().unwrap_or(0.0),
            n_features: 0,
        }
    }

    /// Record the width of the training predictors so prediction can check it.
    pub fn with_width(mut self, n_features: usize) -> Self {
        self.n_features = n_features;
        self
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }
}

impl Regressor for NullModel {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(Array1::from_elem(x.nrows(), self.mean))
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_predicts_training_mean() {
        let model = NullModel::fit(&array![1.0, 2.0, 3.0, 4.0]).with_width(1);
        let pred = model.predict(&array![[10.0], [-3.0]]).unwrap();
        assert_eq!(pred, array![2.5, 2.5]);
        assert_eq!(model.n_features(), 1);
    }
}
