//! Final fit on the full training set and the single test-set evaluation.

use crate::error::{LearningError, Result};
use crate::metrics::{RegressionMetrics, rmse};
use crate::models::{ModelKind, ModelSpec};
use crate::workflow::Workflow;
use brushwork_processing::{Assignment, Dataset};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Test-set metrics of the chosen workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    pub workflow_id: String,
    pub assignment: Assignment,
    pub n_train: usize,
    pub n_test: usize,
    /// Columns reaching the model after preprocessing.
    pub n_model_features: usize,
    pub metrics: RegressionMetrics,
    /// RMSE of predicting the training mean for every test record.
    pub baseline_rmse: f64,
    pub predictions: Vec<f64>,
}

impl FinalReport {
    pub fn rmse(&self) -> f64 {
        self.metrics.rmse
    }

    pub fn rsq(&self) -> f64 {
        self.metrics.rsq
    }
}

/// Refit `workflow` with `assignment` on `training` and score it once on
/// `test`. Any failure is fatal and reported as
/// [`LearningError::FinalFitFailed`].
pub fn last_fit(
    workflow: &Workflow,
    assignment: &Assignment,
    training: &Dataset,
    test: &Dataset,
    seed: u64,
) -> Result<FinalReport> {
    let workflow_id = workflow.id();
    let fail = |e: LearningError| {
        if e.is_cancelled() {
            return e;
        }
        LearningError::FinalFitFailed {
            workflow: workflow_id.clone(),
            reason: e.to_string(),
        }
    };

    let fitted = workflow.fit(training, assignment, seed).map_err(fail)?;
    let predictions = fitted.predict(test).map_err(fail)?;
    let n_model_features = fitted.recipe().output_names.len();
    let metrics = RegressionMetrics::compute(test.target().view(), predictions.view());

    let baseline = ModelSpec::new(ModelKind::Null)
        .fit(training.features(), training.target(), &Assignment::new(), seed)
        .and_then(|m| m.predict(test.features()))
        .map_err(fail)?;
    let baseline_rmse = rmse(test.target().view(), baseline.view());

    info!(
        workflow = %workflow_id,
        rmse = metrics.rmse,
        rsq = metrics.rsq,
        baseline_rmse,
        "final fit scored on test set"
    );

    Ok(FinalReport {
        workflow_id,
        assignment: assignment.clone(),
        n_train: training.len(),
        n_test: test.len(),
        n_model_features,
        metrics,
        baseline_rmse,
        predictions: predictions.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use brushwork_processing::{EpisodeKey, EpisodeMeta, Recipe};
    use ndarray::{Array1, Array2, array};

    fn toy(features: Array2<f64>, target: Array1<f64>, first: u32) -> Dataset {
        let episodes = (0..target.len() as u32)
            .map(|i| EpisodeMeta {
                key: EpisodeKey::new(1, first + i),
                title: format!("T{i}"),
            })
            .collect();
        Dataset::new(episodes, vec!["TREE".into(), "votes".into()], features, target, "rating").unwrap()
    }

    #[test]
    fn test_null_workflow_matches_hand_computed_rmse() {
        let training = toy(
            array![[1.0, 10.0], [0.0, 20.0], [1.0, 30.0], [0.0, 40.0]],
            array![1.0, 2.0, 3.0, 4.0],
            1,
        );
        let test = toy(array![[1.0, 15.0], [0.0, 25.0]], array![2.0, 4.0], 10);
        let workflow = Workflow::new(Recipe::basic(), ModelSpec::new(ModelKind::Null));
        let report = last_fit(&workflow, &Assignment::new(), &training, &test, 1).unwrap();
        // mean 2.5; errors -0.5 and 1.5 -> sqrt((0.25 + 2.25) / 2)
        let expected = 1.25f64.sqrt();
        assert!((report.rmse() - expected).abs() < 1e-12);
        assert!((report.baseline_rmse - expected).abs() < 1e-12);
        assert_eq!(report.n_train, 4);
        assert_eq!(report.n_test, 2);
        assert_eq!(report.predictions, vec![2.5, 2.5]);
    }

    #[test]
    fn test_failure_is_final_fit_failed() {
        let training = toy(array![[1.0, 10.0], [1.0, 10.0]], array![1.0, 2.0], 1);
        let test = toy(array![[1.0, 10.0]], array![2.0], 10);
        // nzv removes both constant columns
        let workflow = Workflow::new(Recipe::basic(), ModelSpec::new(ModelKind::Null));
        let err = last_fit(&workflow, &Assignment::new(), &training, &test, 1).unwrap_err();
        assert_eq!(err.error_code(), "FINAL_FIT_FAILED");
    }
}
