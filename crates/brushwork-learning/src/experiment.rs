//! The end-to-end experiment: split, race every workflow, rank, final fit.
//!
//! # Example
//!
//! ```rust,ignore
//! use brushwork_learning::{Experiment, ExperimentConfig};
//! use brushwork_processing::EpisodeLoader;
//!
//! let data = EpisodeLoader::default().load("elements.csv", "ratings.csv")?;
//! let experiment = Experiment::builder()
//!     .config(ExperimentConfig::builder().seed(7).build()?)
//!     .on_progress(|u| eprintln!("[{:>3.0}%] {}", u.progress * 100.0, u.message))
//!     .build()?;
//!
//! let result = experiment.run(&data)?;
//! println!("{} rmse {:.3}", result.final_fit.workflow_id, result.final_fit.rmse());
//! ```
//!
//! # Concurrency
//!
//! Workflows are tuned in parallel on a dedicated rayon pool sized by
//! `n_jobs`, and each tuner evaluates its alive candidates in parallel on the
//! same pool. Results are collected in workflow order, and every random
//! choice is seeded from the run seed and the work item, so the outcome does
//! not depend on the number of threads.

use crate::config::ExperimentConfig;
use crate::error::{LearningError, Result};
use crate::evaluate::{FinalReport, last_fit};
use crate::models::ModelSpec;
use crate::rank::{RankingTable, rank};
use crate::tuning::{TuningResult, seeds, tune_workflow};
use crate::workflow::{Workflow, WorkflowSet};
use brushwork_processing::{
    CancellationToken, ClosureProgressReporter, Dataset, ExperimentStage, ProgressReporter,
    ProgressUpdate, initial_split, vfold,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

/// Everything an experiment run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub n_records: usize,
    pub n_features: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub fold_ids: Vec<String>,
    /// Racing outcome per workflow, in grid order.
    pub tuning: Vec<TuningResult>,
    pub ranking: RankingTable,
    pub final_fit: FinalReport,
}

/// A configured experiment, ready to [`run`](Self::run).
pub struct Experiment {
    config: ExperimentConfig,
    reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: CancellationToken,
}

static_assertions::assert_impl_all!(Experiment: Send, Sync);

impl std::fmt::Debug for Experiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Experiment")
            .field("config", &self.config)
            .field("reporter", &self.reporter.as_ref().map(|_| "<callback>"))
            .field("cancellation_token", &self.cancellation_token)
            .finish()
    }
}

impl Experiment {
    #[must_use]
    pub fn builder() -> ExperimentBuilder {
        ExperimentBuilder::default()
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// The workflow grid this experiment will tune.
    pub fn workflows(&self) -> Result<WorkflowSet> {
        let models: Vec<ModelSpec> = self.config.models.iter().map(|k| ModelSpec::new(*k)).collect();
        if self.config.cross {
            WorkflowSet::cross(&self.config.recipes, &models)
        } else {
            WorkflowSet::zip(&self.config.recipes, &models)
        }
    }

    /// Run the experiment on `data`.
    ///
    /// # Errors
    ///
    /// - [`LearningError::Processing`] if the split or folds cannot be built
    /// - [`LearningError::NoSurvivors`] if no workflow could be ranked
    /// - [`LearningError::FinalFitFailed`] if the chosen workflow fails on the
    ///   full training set or the test set
    /// - [`LearningError::Cancelled`] once the token is cancelled
    pub fn run(&self, data: &Dataset) -> Result<ExperimentResult> {
        let outcome = self.run_stages(data);
        match &outcome {
            Ok(result) => self.report(ProgressUpdate::complete(format!(
                "Best workflow {} with test RMSE {:.4}",
                result.final_fit.workflow_id,
                result.final_fit.rmse()
            ))),
            Err(e) if e.is_cancelled() => self.report(ProgressUpdate::cancelled()),
            Err(e) => self.report(ProgressUpdate::failed(e.to_string())),
        }
        outcome
    }

    fn run_stages(&self, data: &Dataset) -> Result<ExperimentResult> {
        let config = &self.config;

        self.report(ProgressUpdate::new(
            ExperimentStage::Initializing,
            0.0,
            "Building workflow grid",
        ));
        let workflows = self.workflows()?;
        info!(
            workflows = workflows.len(),
            records = data.len(),
            features = data.n_features(),
            "starting experiment"
        );

        self.report(ProgressUpdate::new(
            ExperimentStage::Splitting,
            0.0,
            "Splitting data",
        ));
        let split = initial_split(data.len(), &config.split_config())?;
        let (training, test) = split.apply(data);
        let folds = vfold(training.len(), config.tuning.folds, config.seed)?;
        info!(
            train = training.len(),
            test = test.len(),
            folds = folds.len(),
            "data split"
        );
        self.check_cancelled()?;

        let pool = build_pool(config.n_jobs)?;
        let total = workflows.len();
        let done = AtomicUsize::new(0);
        let list: Vec<&Workflow> = workflows.iter().collect();
        let outcomes: Vec<Result<TuningResult>> = pool.install(|| {
            list.par_iter()
                .map(|workflow| {
                    let result = tune_workflow(
                        workflow,
                        &training,
                        &folds,
                        &config.tuning,
                        &self.cancellation_token,
                    )?;
                    let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                    match result.best_mean() {
                        Some(mean) => info!(
                            workflow = %result.workflow_id,
                            best_rmse = mean,
                            alive = result.n_alive(),
                            folds = result.folds_evaluated,
                            "workflow tuned"
                        ),
                        None => warn!(workflow = %result.workflow_id, "workflow has no result"),
                    }
                    self.report(
                        ProgressUpdate::counted(
                            ExperimentStage::Tuning,
                            finished,
                            total,
                            format!("Tuned {} ({finished}/{total})", result.workflow_id),
                        )
                        .at(result.workflow_id.clone()),
                    );
                    Ok(result)
                })
                .collect()
        });
        let tuning = outcomes.into_iter().collect::<Result<Vec<_>>>()?;

        self.report(ProgressUpdate::new(
            ExperimentStage::Ranking,
            0.0,
            "Ranking workflows",
        ));
        let ranking = rank(&tuning);
        for failed in &ranking.failed {
            warn!(workflow = %failed.workflow_id, reason = %failed.reason, "excluded from ranking");
        }
        let best = ranking.best().ok_or(LearningError::NoSurvivors)?;
        let workflow = workflows
            .get(&best.workflow_id)
            .ok_or(LearningError::NoSurvivors)?;
        info!(
            workflow = %best.workflow_id,
            mean_rmse = best.mean_rmse,
            parameters = %best.assignment,
            "selected best workflow"
        );
        self.check_cancelled()?;

        self.report(
            ProgressUpdate::new(
                ExperimentStage::FinalFit,
                0.0,
                format!("Refitting {} on the training set", best.workflow_id),
            )
            .at(best.workflow_id.clone()),
        );
        let seed = seeds::mix(config.tuning.seed, seeds::of_str(&best.workflow_id));
        let final_fit = last_fit(workflow, &best.assignment, &training, &test, seed)?;

        Ok(ExperimentResult {
            n_records: data.len(),
            n_features: data.n_features(),
            n_train: training.len(),
            n_test: test.len(),
            fold_ids: folds.iter().map(|f| f.id.clone()).collect(),
            tuning,
            ranking,
            final_fit,
        })
    }

    fn report(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.reporter {
            reporter.report(update);
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation_token.is_cancelled() {
            return Err(LearningError::Cancelled);
        }
        Ok(())
    }
}

fn build_pool(n_jobs: i32) -> Result<rayon::ThreadPool> {
    // 0 lets rayon use every core
    let threads = if n_jobs < 0 { 0 } else { n_jobs as usize };
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| LearningError::ThreadPool(e.to_string()))
}

/// Builder for [`Experiment`].
///
/// Without [`config`](Self::config) the default [`ExperimentConfig`] is used.
#[derive(Default)]
pub struct ExperimentBuilder {
    config: Option<ExperimentConfig>,
    reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: Option<CancellationToken>,
}

impl std::fmt::Debug for ExperimentBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExperimentBuilder")
            .field("config", &self.config)
            .field("reporter", &self.reporter.as_ref().map(|_| "<callback>"))
            .field(
                "cancellation_token",
                &self.cancellation_token.as_ref().map(|_| "<token>"),
            )
            .finish()
    }
}

impl ExperimentBuilder {
    #[must_use]
    pub fn config(mut self, config: ExperimentConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Receive progress updates through a closure.
    ///
    /// The closure is called from rayon workers and should return quickly.
    #[must_use]
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    #[must_use]
    pub fn reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Stop the run between fold rounds once `token` is cancelled.
    #[must_use]
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] if the tuning settings are
    /// invalid or the workflow grid cannot be built from the configuration.
    pub fn build(self) -> Result<Experiment> {
        let experiment = Experiment {
            config: self.config.unwrap_or_default(),
            reporter: self.reporter,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
        };
        experiment.config.tuning.validate()?;
        experiment.workflows()?;
        Ok(experiment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TuningConfig;
    use crate::models::{ModelKind, test_data};
    use brushwork_processing::{EpisodeKey, EpisodeMeta, Recipe};
    use std::sync::Mutex;

    fn dataset(n: usize) -> Dataset {
        let (x, y) = test_data::linear(n, 5);
        let episodes = (0..n as u32)
            .map(|i| EpisodeMeta {
                key: EpisodeKey::new(i / 13 + 1, i % 13 + 1),
                title: format!("Episode {i}"),
            })
            .collect();
        let names = vec!["x0".to_string(), "x1".to_string(), "x2".to_string()];
        Dataset::new(episodes, names, x, y, "rating").unwrap()
    }

    fn small_config(n_jobs: i32) -> ExperimentConfig {
        ExperimentConfig::builder()
            .recipes(vec![Recipe::basic()])
            .models(vec![ModelKind::Glmnet, ModelKind::Kknn])
            .tuning(
                TuningConfig::builder()
                    .folds(3)
                    .grid_size(4)
                    .burn_in(2)
                    .build()
                    .unwrap(),
            )
            .n_jobs(n_jobs)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_defaults_to_full_grid() {
        let experiment = Experiment::builder().build().unwrap();
        assert_eq!(experiment.workflows().unwrap().len(), 18);
        let debug = format!("{:?}", Experiment::builder());
        assert!(debug.contains("ExperimentBuilder"));
    }

    #[test]
    fn test_run_ranks_and_scores() {
        let experiment = Experiment::builder().config(small_config(2)).build().unwrap();
        let result = experiment.run(&dataset(60)).unwrap();

        assert_eq!(result.n_train + result.n_test, 60);
        assert_eq!(result.fold_ids.len(), 3);
        assert_eq!(result.tuning.len(), 2);
        assert_eq!(result.tuning[0].workflow_id, "basic_glmnet");
        let best = result.ranking.best().unwrap();
        assert_eq!(best.rank, 1);
        assert_eq!(result.final_fit.workflow_id, best.workflow_id);
        assert!(result.final_fit.rmse() < result.final_fit.baseline_rmse);
    }

    #[test]
    fn test_thread_count_does_not_change_results() {
        let data = dataset(60);
        let one = Experiment::builder().config(small_config(1)).build().unwrap();
        let four = Experiment::builder().config(small_config(4)).build().unwrap();
        assert_eq!(one.run(&data).unwrap(), four.run(&data).unwrap());
    }

    #[test]
    fn test_progress_ends_with_complete() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let experiment = Experiment::builder()
            .config(small_config(1))
            .on_progress(move |u| sink.lock().unwrap().push(u.stage))
            .build()
            .unwrap();
        experiment.run(&dataset(60)).unwrap();

        let stages = seen.lock().unwrap();
        assert_eq!(stages.first(), Some(&ExperimentStage::Initializing));
        assert_eq!(stages.last(), Some(&ExperimentStage::Complete));
        assert_eq!(
            stages.iter().filter(|s| **s == ExperimentStage::Tuning).count(),
            2
        );
    }

    #[test]
    fn test_cancelled_run() {
        let token = CancellationToken::new();
        token.cancel();
        let experiment = Experiment::builder()
            .config(small_config(1))
            .cancellation_token(token)
            .build()
            .unwrap();
        let err = experiment.run(&dataset(60)).unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_no_survivors() {
        // every column is constant, so nzv leaves nothing to fit
        let n = 40;
        let episodes = (0..n as u32)
            .map(|i| EpisodeMeta {
                key: EpisodeKey::new(i / 13 + 1, i % 13 + 1),
                title: format!("Episode {i}"),
            })
            .collect();
        let x = ndarray::Array2::from_elem((n, 2), 1.0);
        let y = ndarray::Array1::from_iter((0..n).map(|i| i as f64));
        let data = Dataset::new(episodes, vec!["a".into(), "b".into()], x, y, "rating").unwrap();

        let experiment = Experiment::builder().config(small_config(1)).build().unwrap();
        let err = experiment.run(&data).unwrap_err();
        assert_eq!(err.error_code(), "NO_SURVIVORS");
    }
}
