//! Progress reporting and cancellation for long experiment runs.
//!
//! Tuning dozens of workflows over ten folds takes a while, so the experiment
//! emits [`ProgressUpdate`]s through a [`ProgressReporter`] and polls a
//! [`CancellationToken`] between fold rounds.
//!
//! ```rust,ignore
//! let token = CancellationToken::new();
//! let for_signal = token.clone();
//! ctrlc_like_hook(move || for_signal.cancel());
//!
//! Experiment::builder()
//!     .cancellation_token(token)
//!     .on_progress(|u| eprintln!("[{:>3.0}%] {}", u.progress * 100.0, u.message))
//!     .build()?
//!     .run(&dataset)?;
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Phases of an experiment run, in the order they happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStage {
    /// Validating configuration and building the workflow grid
    Initializing,
    /// Train/test split and fold construction
    Splitting,
    /// Racing every workflow over the folds
    Tuning,
    /// Ordering workflows by their best mean RMSE
    Ranking,
    /// Refit on training, single evaluation on test
    FinalFit,
    Complete,
    Cancelled,
    Failed,
}

/// Share of a run spent in each working stage. Tuning dominates.
const STAGE_WEIGHTS: [(ExperimentStage, f32); 5] = [
    (ExperimentStage::Initializing, 0.01),
    (ExperimentStage::Splitting, 0.02),
    (ExperimentStage::Tuning, 0.90),
    (ExperimentStage::Ranking, 0.02),
    (ExperimentStage::FinalFit, 0.05),
];

impl ExperimentStage {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::Splitting => "Splitting Data",
            Self::Tuning => "Tuning Workflows",
            Self::Ranking => "Ranking Workflows",
            Self::FinalFit => "Final Fit",
            Self::Complete => "Complete",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Cancelled | Self::Failed)
    }

    /// `(start, width)` of this stage on the overall 0..1 progress scale.
    ///
    /// `Complete` sits at 1.0; the other terminal stages report 0.0.
    pub fn span(&self) -> (f32, f32) {
        if *self == Self::Complete {
            return (1.0, 0.0);
        }
        let mut start = 0.0;
        for (stage, weight) in STAGE_WEIGHTS {
            if stage == *self {
                return (start, weight);
            }
            start += weight;
        }
        (0.0, 0.0)
    }
}

/// A single progress notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: ExperimentStage,

    /// Finer-grained location, e.g. `"pca_kknn"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_stage: Option<String>,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within current stage (0.0 - 1.0)
    pub stage_progress: f32,

    pub message: String,

    /// `(done, total)` when the stage works through countable items
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<(usize, usize)>,
}

impl ProgressUpdate {
    pub fn new(stage: ExperimentStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let stage_progress = stage_progress.clamp(0.0, 1.0);
        let (start, width) = stage.span();
        Self {
            stage,
            sub_stage: None,
            progress: (start + width * stage_progress).clamp(0.0, 1.0),
            stage_progress,
            message: message.into(),
            items: None,
        }
    }

    /// Progress expressed as `done` of `total` items (e.g. workflows tuned).
    pub fn counted(
        stage: ExperimentStage,
        done: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let fraction = if total == 0 {
            0.0
        } else {
            done as f32 / total as f32
        };
        let mut update = Self::new(stage, fraction, message);
        update.items = Some((done, total));
        update
    }

    #[must_use]
    pub fn at(mut self, sub_stage: impl Into<String>) -> Self {
        self.sub_stage = Some(sub_stage.into());
        self
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(ExperimentStage::Complete, 1.0, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ExperimentStage::Cancelled, 0.0, "Experiment cancelled")
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(ExperimentStage::Failed, 0.0, message)
    }
}

/// Receiver of progress updates.
///
/// Updates are sent from rayon worker threads while workflows tune in
/// parallel, hence the `Send + Sync` bound. Implementations should return
/// quickly.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// [`ProgressReporter`] backed by a closure.
pub struct ClosureProgressReporter<F>(F);

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self(callback)
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.0)(update);
    }
}

/// Shared flag used to stop a running experiment from another thread.
///
/// The tuner checks the flag before every fold round and returns a
/// `Cancelled` error once it is set. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

// Tokens and updates cross into rayon workers.
static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
