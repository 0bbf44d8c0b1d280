//! The model set: regression engines and their hyperparameter specifications.
//!
//! A [`ModelSpec`] names an engine ([`ModelKind`]) and maps each of its
//! hyperparameters to a [`Param`], fixed or tuned. Fitting resolves the
//! params against a candidate [`Assignment`] and returns a [`FittedModel`].
//!
//! | model     | tuned by default                            | fixed        |
//! |-----------|---------------------------------------------|--------------|
//! | `cubist`  | committees, neighbors, max_rules            |              |
//! | `glmnet`  | penalty, mixture                            |              |
//! | `nnet`    | hidden_units, penalty, epochs               |              |
//! | `kknn`    | neighbors, weight_func, dist_power          |              |
//! | `ranger`  | mtry, min_n                                 | trees = 1000 |
//! | `svm_rbf` | cost, rbf_sigma, margin                     |              |
//! | `null`    |                                             |              |
//!
//! Every engine rejects empty or non-finite training data and fails with
//! [`LearningError::FitFailed`] rather than panicking, so a bad candidate
//! only costs one evaluation.

mod cubist;
mod glmnet;
mod kknn;
mod linalg;
mod nnet;
mod null;
mod ranger;
mod svm;
mod tree;

pub use cubist::{CubistModel, CubistParams};
pub use glmnet::{ElasticNet, ElasticNetParams};
pub use kknn::{Kernel, KknnModel, KknnParams};
pub use linalg::{Standardizer, TargetScaler, solve_spd};
pub use nnet::{MlpParams, MlpRegressor};
pub use null::NullModel;
pub use ranger::{RandomForest, RandomForestParams};
pub use svm::{SvmParams, SvmRegressor};
pub use tree::{RegressionTree, TreeNode, TreeParams};

use crate::error::{LearningError, Result};
use brushwork_processing::{Assignment, Domain, Param, Tunable};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Default number of trees in the random forest.
pub const DEFAULT_TREES: usize = 1000;

/// A fitted regression model.
pub trait Regressor: Send + Sync + fmt::Debug {
    /// Predict one value per row of `x`.
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Number of input columns the model was fitted on.
    fn n_features(&self) -> usize;
}

/// Estimator families available to the workflow grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Cubist,
    Glmnet,
    Nnet,
    Kknn,
    Ranger,
    SvmRbf,
    Null,
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Cubist => "cubist",
            ModelKind::Glmnet => "glmnet",
            ModelKind::Nnet => "nnet",
            ModelKind::Kknn => "kknn",
            ModelKind::Ranger => "ranger",
            ModelKind::SvmRbf => "svm_rbf",
            ModelKind::Null => "null",
        }
    }

    /// The six engines raced in the default experiment, in grid order.
    pub fn experiment_set() -> [ModelKind; 6] {
        [
            ModelKind::Cubist,
            ModelKind::Glmnet,
            ModelKind::Nnet,
            ModelKind::Kknn,
            ModelKind::Ranger,
            ModelKind::SvmRbf,
        ]
    }

    /// Recognized hyperparameters with their default search domains.
    pub fn parameters(&self) -> Vec<(&'static str, Domain)> {
        match self {
            ModelKind::Cubist => vec![
                ("committees", Domain::int(1, 100)),
                ("neighbors", Domain::int(0, 9)),
                ("max_rules", Domain::int(1, 500)),
            ],
            ModelKind::Glmnet => vec![
                ("penalty", Domain::log10(-10.0, 0.0)),
                ("mixture", Domain::float(0.05, 1.0)),
            ],
            ModelKind::Nnet => vec![
                ("hidden_units", Domain::int(1, 10)),
                ("penalty", Domain::log10(-10.0, 0.0)),
                ("epochs", Domain::int(10, 1000)),
            ],
            ModelKind::Kknn => vec![
                ("neighbors", Domain::int(1, 15)),
                ("weight_func", Domain::categorical(Kernel::names())),
                ("dist_power", Domain::float(1.0, 2.0)),
            ],
            ModelKind::Ranger => vec![
                ("mtry", Domain::int_unknown_upper(1)),
                ("min_n", Domain::int(2, 40)),
                ("trees", Domain::int(1, 2000)),
            ],
            ModelKind::SvmRbf => vec![
                ("cost", Domain::log2(-10.0, 5.0)),
                ("rbf_sigma", Domain::log10(-10.0, 0.0)),
                ("margin", Domain::float(0.0, 0.2)),
            ],
            ModelKind::Null => Vec::new(),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = LearningError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cubist" | "cubist_rules" => Ok(ModelKind::Cubist),
            "glmnet" | "linear_reg" => Ok(ModelKind::Glmnet),
            "nnet" | "mlp" => Ok(ModelKind::Nnet),
            "kknn" | "knn" | "nearest_neighbor" => Ok(ModelKind::Kknn),
            "ranger" | "rf" | "rand_forest" => Ok(ModelKind::Ranger),
            "svm_rbf" | "svm" => Ok(ModelKind::SvmRbf),
            "null" | "null_model" => Ok(ModelKind::Null),
            other => Err(LearningError::UnknownComponent {
                kind: "model",
                name: other.to_string(),
            }),
        }
    }
}

/// Model family plus hyperparameter slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub kind: ModelKind,
    pub params: BTreeMap<String, Param>,
}

impl ModelSpec {
    /// Specification with the default tuned/fixed split for `kind`.
    pub fn new(kind: ModelKind) -> Self {
        let params = kind
            .parameters()
            .into_iter()
            .map(|(name, _)| {
                let param = match (kind, name) {
                    (ModelKind::Ranger, "trees") => Param::fixed(DEFAULT_TREES),
                    _ => Param::tune(name),
                };
                (name.to_string(), param)
            })
            .collect();
        Self { kind, params }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Replace one hyperparameter slot.
    pub fn with_param(mut self, name: &str, param: Param) -> Result<Self> {
        if !self.kind.parameters().iter().any(|(n, _)| *n == name) {
            return Err(LearningError::UnknownParameter {
                model: self.kind.name().to_string(),
                parameter: name.to_string(),
            });
        }
        self.params.insert(name.to_string(), param);
        Ok(self)
    }

    /// Tuned slots with their search domains.
    pub fn tunables(&self) -> Vec<Tunable> {
        self.kind
            .parameters()
            .into_iter()
            .filter_map(|(name, domain)| match self.params.get(name) {
                Some(Param::Tune(id)) => Some(Tunable::new(id, domain)),
                _ => None,
            })
            .collect()
    }

    fn param(&self, name: &str) -> Result<&Param> {
        self.params
            .get(name)
            .ok_or_else(|| LearningError::UnknownParameter {
                model: self.kind.name().to_string(),
                parameter: name.to_string(),
            })
    }

    fn int(&self, name: &str, assignment: &Assignment) -> Result<usize> {
        Ok(self.param(name)?.resolve_usize(name, assignment)?)
    }

    fn float(&self, name: &str, assignment: &Assignment) -> Result<f64> {
        Ok(self.param(name)?.resolve_f64(name, assignment)?)
    }

    /// Fit the engine on `x`/`y` with the candidate's hyperparameters.
    ///
    /// `seed` drives every random choice of the stochastic engines.
    pub fn fit(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        assignment: &Assignment,
        seed: u64,
    ) -> Result<FittedModel> {
        validate_training(self.name(), x, y)?;
        let a = assignment;
        let inner: Box<dyn Regressor> = match self.kind {
            ModelKind::Cubist => Box::new(CubistModel::fit(
                x,
                y,
                &CubistParams {
                    committees: self.int("committees", a)?,
                    neighbors: self.int("neighbors", a)?,
                    max_rules: self.int("max_rules", a)?,
                },
            )?),
            ModelKind::Glmnet => Box::new(ElasticNet::fit(
                x,
                y,
                &ElasticNetParams {
                    penalty: self.float("penalty", a)?,
                    mixture: self.float("mixture", a)?,
                },
            )?),
            ModelKind::Nnet => Box::new(MlpRegressor::fit(
                x,
                y,
                &MlpParams {
                    hidden_units: self.int("hidden_units", a)?,
                    penalty: self.float("penalty", a)?,
                    epochs: self.int("epochs", a)?,
                },
                seed,
            )?),
            ModelKind::Kknn => {
                let weight = self.param("weight_func")?.resolve_text("weight_func", a)?;
                Box::new(KknnModel::fit(
                    x,
                    y,
                    &KknnParams {
                        neighbors: self.int("neighbors", a)?,
                        kernel: weight.parse()?,
                        dist_power: self.float("dist_power", a)?,
                    },
                )?)
            }
            ModelKind::Ranger => Box::new(RandomForest::fit(
                x,
                y,
                &RandomForestParams {
                    trees: self.int("trees", a)?,
                    mtry: self.int("mtry", a)?,
                    min_n: self.int("min_n", a)?,
                },
                seed,
            )?),
            ModelKind::SvmRbf => Box::new(SvmRegressor::fit(
                x,
                y,
                &SvmParams {
                    cost: self.float("cost", a)?,
                    rbf_sigma: self.float("rbf_sigma", a)?,
                    margin: self.float("margin", a)?,
                },
            )?),
            ModelKind::Null => Box::new(NullModel::fit(y).with_width(x.ncols())),
        };
        Ok(FittedModel {
            kind: self.kind,
            inner,
        })
    }
}

/// A fitted engine together with its family.
#[derive(Debug)]
pub struct FittedModel {
    kind: ModelKind,
    inner: Box<dyn Regressor>,
}

impl FittedModel {
    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    /// Predict, checking the column count and the finiteness of the output.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.inner.n_features() {
            return Err(LearningError::PredictFailed {
                model: self.kind.name().to_string(),
                reason: format!(
                    "expected {} columns, got {}",
                    self.inner.n_features(),
                    x.ncols()
                ),
            });
        }
        let predictions = self.inner.predict(x)?;
        if predictions.iter().any(|v| !v.is_finite()) {
            return Err(LearningError::PredictFailed {
                model: self.kind.name().to_string(),
                reason: "non-finite prediction".to_string(),
            });
        }
        Ok(predictions)
    }
}

fn validate_training(model: &str, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() == 0 {
        return Err(LearningError::fit_failed(model, "no training rows"));
    }
    if x.ncols() == 0 {
        return Err(LearningError::fit_failed(model, "no predictor columns"));
    }
    if x.nrows() != y.len() {
        return Err(LearningError::fit_failed(
            model,
            format!("{} rows but {} outcomes", x.nrows(), y.len()),
        ));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(LearningError::fit_failed(model, "non-finite training values"));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_data {
    use ndarray::{Array1, Array2};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    /// `n` rows of 3 features; y = 2*x0 - x1 + 0.5 + small noise, x2 is noise.
    pub fn linear(n: usize, seed: u64) -> (Array2<f64>, Array1<f64>) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let x = Array2::from_shape_fn((n, 3), |_| rng.gen_range(-1.0..1.0));
        let y = Array1::from_shape_fn(n, |i| {
            2.0 * x[[i, 0]] - x[[i, 1]] + 0.5 + 0.01 * rng.gen_range(-1.0..1.0)
        });
        (x, y)
    }

    /// Step function of x0 with a binary feature mix, for tree models.
    pub fn step(n: usize, seed: u64) -> (Array2<f64>, Array1<f64>) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let x = Array2::from_shape_fn((n, 3), |(_, j)| {
            if j == 2 {
                f64::from(rng.gen_range(0..2u8))
            } else {
                rng.gen_range(0.0..1.0)
            }
        });
        let y = Array1::from_shape_fn(n, |i| if x[[i, 0]] > 0.5 { 3.0 } else { 1.0 });
        (x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::rmse;
    use brushwork_processing::ParamValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_model_kind_parsing() {
        assert_eq!("svm_rbf".parse::<ModelKind>().unwrap(), ModelKind::SvmRbf);
        assert_eq!("RANGER".parse::<ModelKind>().unwrap(), ModelKind::Ranger);
        assert_eq!(
            "xgboost".parse::<ModelKind>().unwrap_err().error_code(),
            "UNKNOWN_COMPONENT"
        );
    }

    #[test]
    fn test_default_specs_tunables() {
        let ids: Vec<String> = ModelSpec::new(ModelKind::Ranger)
            .tunables()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["mtry".to_string(), "min_n".to_string()]);
        assert_eq!(
            ModelSpec::new(ModelKind::Ranger).params["trees"],
            Param::Fixed(ParamValue::Int(1000))
        );
        assert_eq!(ModelSpec::new(ModelKind::Kknn).tunables().len(), 3);
        assert!(ModelSpec::new(ModelKind::Null).tunables().is_empty());
    }

    #[test]
    fn test_with_param_unknown() {
        let err = ModelSpec::new(ModelKind::Glmnet)
            .with_param("depth", Param::fixed(3usize))
            .unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_PARAMETER");
    }

    #[test]
    fn test_fit_rejects_empty_inputs() {
        let spec = ModelSpec::new(ModelKind::Null);
        let x = Array2::<f64>::zeros((5, 0));
        let y = Array1::<f64>::zeros(5);
        let err = spec.fit(&x, &y, &Assignment::new(), 1).unwrap_err();
        assert_eq!(err.error_code(), "FIT_FAILED");

        let x = Array2::<f64>::zeros((0, 2));
        let y = Array1::<f64>::zeros(0);
        assert!(spec.fit(&x, &y, &Assignment::new(), 1).is_err());
    }

    #[test]
    fn test_missing_assignment_is_reported() {
        let (x, y) = test_data::linear(20, 1);
        let err = ModelSpec::new(ModelKind::Glmnet)
            .fit(&x, &y, &Assignment::new(), 1)
            .unwrap_err();
        assert_eq!(err.error_code(), "UNRESOLVED_PARAMETER");
    }

    #[test]
    fn test_predict_checks_width() {
        let (x, y) = test_data::linear(20, 1);
        let fitted = ModelSpec::new(ModelKind::Null)
            .fit(&x, &y, &Assignment::new(), 1)
            .unwrap();
        let err = fitted.predict(&Array2::zeros((2, 5))).unwrap_err();
        assert_eq!(err.error_code(), "PREDICT_FAILED");
    }

    /// Every engine at a reasonable setting beats the mean predictor on a
    /// clean linear signal.
    #[test]
    fn test_every_model_beats_the_mean() {
        let (x, y) = test_data::linear(160, 3);
        let (x_test, y_test) = test_data::linear(60, 4);
        let baseline = {
            let fitted = ModelSpec::new(ModelKind::Null)
                .fit(&x, &y, &Assignment::new(), 0)
                .unwrap();
            rmse(y_test.view(), fitted.predict(&x_test).unwrap().view())
        };

        let cases = [
            (
                ModelKind::Cubist,
                Assignment::new()
                    .with("committees", 3usize)
                    .with("neighbors", 0usize)
                    .with("max_rules", 5usize),
            ),
            (
                ModelKind::Glmnet,
                Assignment::new().with("penalty", 1e-4).with("mixture", 0.5),
            ),
            (
                ModelKind::Nnet,
                Assignment::new()
                    .with("hidden_units", 4usize)
                    .with("penalty", 1e-4)
                    .with("epochs", 1000usize),
            ),
            (
                ModelKind::Kknn,
                Assignment::new()
                    .with("neighbors", 7usize)
                    .with("weight_func", "triangular")
                    .with("dist_power", 2.0),
            ),
            (
                ModelKind::Ranger,
                Assignment::new().with("mtry", 2usize).with("min_n", 5usize),
            ),
            (
                ModelKind::SvmRbf,
                Assignment::new()
                    .with("cost", 4.0)
                    .with("rbf_sigma", 0.1)
                    .with("margin", 0.05),
            ),
        ];

        for (kind, assignment) in cases {
            let spec = ModelSpec::new(kind);
            let spec = if kind == ModelKind::Ranger {
                spec.with_param("trees", Param::fixed(60usize)).unwrap()
            } else {
                spec
            };
            let fitted = spec.fit(&x, &y, &assignment, 11).unwrap();
            let score = rmse(y_test.view(), fitted.predict(&x_test).unwrap().view());
            assert!(
                score < 0.5 * baseline,
                "{kind} rmse {score:.4} vs baseline {baseline:.4}"
            );
        }
    }
}
