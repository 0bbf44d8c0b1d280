//! Integration tests for the experiment pipeline.
//!
//! These tests run the crate end to end on the 60-episode fixture tables
//! under `tests/fixtures`.

use brushwork_learning::{
    Evaluation, Experiment, ExperimentConfig, ExperimentReport, ModelKind, ModelSpec,
    TuningConfig, Workflow, rmse, tune_workflow,
};
use brushwork_processing::{
    CancellationToken, Dataset, EpisodeLoader, Param, Recipe, initial_split, vfold,
};
use ndarray::Array1;
use pretty_assertions::assert_eq;
use std::path::PathBuf;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_fixture() -> Dataset {
    EpisodeLoader::default()
        .load(
            fixtures_path().join("elements.csv"),
            fixtures_path().join("ratings.csv"),
        )
        .expect("fixtures should load")
}

fn small_tuning() -> TuningConfig {
    TuningConfig::builder()
        .folds(5)
        .grid_size(5)
        .burn_in(3)
        .build()
        .unwrap()
}

fn small_config(seed: u64) -> ExperimentConfig {
    ExperimentConfig::builder()
        .seed(seed)
        .recipes(vec![Recipe::basic(), Recipe::pca()])
        .models(vec![ModelKind::Glmnet, ModelKind::Kknn, ModelKind::Null])
        .tuning(small_tuning())
        .n_jobs(2)
        .build()
        .unwrap()
}

fn run(config: ExperimentConfig, data: &Dataset) -> brushwork_learning::ExperimentResult {
    Experiment::builder()
        .config(config)
        .build()
        .unwrap()
        .run(data)
        .expect("experiment should succeed")
}

// ============================================================================
// End-to-end runs
// ============================================================================

#[test]
fn test_experiment_on_fixture() {
    let data = load_fixture();
    let result = run(small_config(42), &data);

    assert_eq!(result.n_records, 60);
    assert_eq!(result.n_train, 45);
    assert_eq!(result.n_test, 15);
    assert_eq!(result.fold_ids.len(), 5);
    assert_eq!(result.tuning.len(), 6);

    let means: Vec<f64> = result.ranking.entries.iter().map(|e| e.mean_rmse).collect();
    assert!(means.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(
        result.ranking.entries.len() + result.ranking.failed.len(),
        6
    );

    let best = result.ranking.best().unwrap();
    assert_eq!(result.final_fit.workflow_id, best.workflow_id);
    assert_eq!(result.final_fit.assignment, best.assignment);
    assert_eq!(result.final_fit.predictions.len(), 15);
    assert!(result.final_fit.rmse().is_finite());
    // the elements carry real signal
    assert!(best.workflow_id.ends_with("glmnet") || best.workflow_id.ends_with("kknn"));
}

#[test]
fn test_same_seed_is_idempotent() {
    let data = load_fixture();
    let first = run(small_config(7), &data);
    let second = run(small_config(7), &data);
    assert_eq!(first, second);
}

#[test]
fn test_seed_changes_the_split() {
    let data = load_fixture();
    let a = run(small_config(1), &data);
    let b = run(small_config(2), &data);
    assert_ne!(a.final_fit.predictions, b.final_fit.predictions);
}

#[test]
fn test_baseline_is_training_mean_on_test() {
    let data = load_fixture();
    let config = small_config(42);
    let result = run(config.clone(), &data);

    let split = initial_split(data.len(), &config.split_config()).unwrap();
    let (training, test) = split.apply(&data);
    let mean = training.target().mean().unwrap();
    let baseline = Array1::from_elem(test.len(), mean);
    let expected = rmse(test.target().view(), baseline.view());

    assert!((result.final_fit.baseline_rmse - expected).abs() < 1e-12);
}

#[test]
fn test_eliminated_candidates_never_return() {
    let data = load_fixture();
    let result = run(small_config(42), &data);

    for tuned in &result.tuning {
        for candidate in &tuned.candidates {
            let evaluations = &candidate.evaluations;
            assert_eq!(evaluations.len(), 5);
            if let Some(after) = candidate.eliminated_after {
                assert!(after >= 3, "{} eliminated before burn-in", tuned.workflow_id);
                assert!(
                    evaluations[after..]
                        .iter()
                        .all(|e| *e == Evaluation::NotEvaluated)
                );
            }
        }
    }
}

#[test]
fn test_report_round_trips_through_json() {
    let data = load_fixture();
    let config = small_config(42);
    let result = run(config.clone(), &data);
    let report = ExperimentReport::new(&config, &result);

    let dir = tempfile::tempdir().unwrap();
    let path = report.write_report_to_file(dir.path()).unwrap();
    let text = std::fs::read_to_string(path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["dataset"]["records"], 60);
    assert_eq!(value["workflows"].as_array().unwrap().len(), 6);
    assert_eq!(
        value["final_fit"]["workflow_id"],
        result.final_fit.workflow_id.as_str()
    );
}

// ============================================================================
// Tuning a single workflow
// ============================================================================

#[test]
fn test_forest_mtry_is_finalized_to_recipe_width() {
    let data = load_fixture();
    let split = initial_split(data.len(), &small_config(42).split_config()).unwrap();
    let (training, _) = split.apply(&data);
    let folds = vfold(training.len(), 3, 42).unwrap();

    let model = ModelSpec::new(ModelKind::Ranger)
        .with_param("trees", Param::fixed(20usize))
        .unwrap();
    let workflow = Workflow::new(Recipe::pca(), model);
    let width = Recipe::pca().max_output_width(&training.frame()).unwrap();

    let tuning = TuningConfig::builder()
        .folds(3)
        .grid_size(6)
        .burn_in(2)
        .build()
        .unwrap();
    let result = tune_workflow(&workflow, &training, &folds, &tuning, &CancellationToken::new())
        .unwrap();

    assert!(!result.is_failed());
    for candidate in &result.candidates {
        let mtry = candidate.assignment.get("mtry").and_then(|v| v.as_i64()).unwrap();
        assert!(mtry >= 1 && mtry as usize <= width);
        assert_eq!(candidate.n_failed(), 0);
    }
}

#[test]
fn test_forest_scores_when_recipe_narrows_the_features() {
    let data = load_fixture();
    let split = initial_split(data.len(), &small_config(42).split_config()).unwrap();
    let (training, _) = split.apply(&data);
    let folds = vfold(training.len(), 5, 42).unwrap();
    let tuning = TuningConfig::builder()
        .folds(5)
        .grid_size(25)
        .burn_in(3)
        .build()
        .unwrap();

    for recipe in [Recipe::pca(), Recipe::corr()] {
        let model = ModelSpec::new(ModelKind::Ranger)
            .with_param("trees", Param::fixed(10usize))
            .unwrap();
        let workflow = Workflow::new(recipe, model);
        let result =
            tune_workflow(&workflow, &training, &folds, &tuning, &CancellationToken::new())
                .unwrap();

        assert!(!result.is_failed(), "{}", result.workflow_id);
        for candidate in &result.candidates {
            // every candidate scores on at least the burn-in folds
            assert_eq!(candidate.n_failed(), 0, "{}: {}", result.workflow_id, candidate.assignment);
            assert!(candidate.n_scored() >= 3);
        }
    }
}

#[test]
fn test_cancelled_experiment_returns_error() {
    let data = load_fixture();
    let token = CancellationToken::new();
    token.cancel();
    let err = Experiment::builder()
        .config(small_config(42))
        .cancellation_token(token)
        .build()
        .unwrap()
        .run(&data)
        .unwrap_err();
    assert_eq!(err.error_code(), "CANCELLED");
}
