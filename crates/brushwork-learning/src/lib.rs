//! brushwork-learning: racing hyperparameter search over a grid of
//! preprocessing recipes and regression models.
//!
//! Given a [`Dataset`](brushwork_processing::Dataset) of episodes, the crate
//! answers one question: which combination of preprocessing and model
//! predicts the rating best, and how well does it do on records it has never
//! seen?
//!
//! # Features
//!
//! - **Model set**: cubist rules, elastic net, single-layer MLP, weighted
//!   k-nearest-neighbors, random forest, RBF support vector regression and a
//!   mean-predictor baseline, all implemented natively on `ndarray`
//! - **Workflow grid**: every recipe crossed with every model (or zipped)
//! - **Racing**: space-filling candidate grids evaluated fold by fold, with
//!   an ANOVA (or paired t) elimination test after the burn-in folds
//! - **Ranking & final fit**: workflows ordered by best mean RMSE, the winner
//!   refit on the training set and scored once on the test set
//! - **Reports**: console tables and JSON output
//! - **Progress & cancellation** from any thread
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use brushwork_learning::{Experiment, ExperimentConfig, ExperimentReport};
//! use brushwork_processing::EpisodeLoader;
//!
//! let data = EpisodeLoader::default().load("elements.csv", "ratings.csv")?;
//! let config = ExperimentConfig::builder().seed(42).n_jobs(4).build()?;
//!
//! let experiment = Experiment::builder().config(config.clone()).build()?;
//! let result = experiment.run(&data)?;
//!
//! let report = ExperimentReport::new(&config, &result);
//! println!("{}", report.render_text()?);
//! ```
//!
//! # Architecture
//!
//! ```text
//!  Dataset ──► initial_split ──► training ──► vfold ──► folds
//!                   │                                    │
//!                   │        WorkflowSet (recipe × model)│
//!                   │                 │                  │
//!                   │                 ▼                  ▼
//!                   │          tune_workflow (racing, one per workflow)
//!                   │                 │
//!                   │                 ▼
//!                   │               rank ──► best workflow + parameters
//!                   ▼                                    │
//!                 test ──────────────► last_fit ◄────────┘
//!                                         │
//!                                         ▼
//!                                   FinalReport
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T>`](error::Result) with a
//! [`LearningError`]. Failures of single candidate evaluations never surface
//! as errors; they are recorded in the tuning history instead.

pub mod config;
pub mod error;
pub mod evaluate;
pub mod experiment;
pub mod grid;
pub mod metrics;
pub mod models;
pub mod rank;
pub mod report;
pub mod tuning;
pub mod workflow;

// Configuration types
pub use config::{
    EliminationTest, ExperimentConfig, ExperimentConfigBuilder, TuningConfig, TuningConfigBuilder,
};
// Error types
pub use error::{LearningError, Result};
// Final evaluation
pub use evaluate::{FinalReport, last_fit};
// Experiment pipeline
pub use experiment::{Experiment, ExperimentBuilder, ExperimentResult};
// Metrics
pub use metrics::{RegressionMetrics, mae, rmse, rsq, rsq_trad};
// Models
pub use models::{FittedModel, ModelKind, ModelSpec, Regressor};
// Ranking
pub use rank::{FailedWorkflow, RankEntry, RankingTable, rank};
// Reports
pub use report::{DatasetSummary, ExperimentReport, WorkflowSummary};
// Racing
pub use tuning::{CandidateResult, Evaluation, TuningResult, TuningStatus, tune_workflow};
// Workflows
pub use workflow::{FittedWorkflow, Workflow, WorkflowSet};
