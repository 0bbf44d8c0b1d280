//! Configuration types for the tuning experiment.
//!
//! [`TuningConfig`] controls the racing search of a single workflow and
//! [`ExperimentConfig`] the whole run (split, workflow grid, parallelism).
//! Both are built through validating builders.
//!
//! # Example
//!
//! ```
//! use brushwork_learning::{ExperimentConfig, TuningConfig};
//!
//! let tuning = TuningConfig::builder()
//!     .folds(5)
//!     .grid_size(10)
//!     .burn_in(2)
//!     .build()
//!     .expect("valid config");
//!
//! let config = ExperimentConfig::builder()
//!     .train_prop(0.8)
//!     .seed(7)
//!     .tuning(tuning)
//!     .build()
//!     .expect("valid config");
//! assert_eq!(config.tuning.folds, 5);
//! ```

use crate::error::LearningError;
use crate::models::ModelKind;
use brushwork_processing::{Recipe, SplitConfig};
use serde::{Deserialize, Serialize};

/// Statistical test used to eliminate candidates during racing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EliminationTest {
    /// Two-way additive model (candidate + fold) with a pooled residual
    /// variance; every candidate is compared with the current best.
    #[default]
    Anova,
    /// Paired t-test of each candidate against the current best on shared
    /// folds, Bonferroni-adjusted.
    PairedT,
}

impl EliminationTest {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EliminationTest::Anova => "anova",
            EliminationTest::PairedT => "paired_t",
        }
    }
}

/// Racing search settings for one workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Number of cross-validation folds (default: 10). Must be at least 2.
    pub folds: usize,

    /// Candidates in the space-filling grid (default: 25). Must be at least 1.
    pub grid_size: usize,

    /// Folds evaluated before the first elimination test (default: 3).
    ///
    /// Must be between 2 and `folds`.
    pub burn_in: usize,

    /// Significance level of the elimination test (default: 0.05).
    pub alpha: f64,

    /// Consecutive folds without elimination after which the worse of two
    /// remaining candidates is dropped (default: 10).
    pub num_ties: usize,

    /// Minimum RMSE gap to the best for an elimination (default: 0.0).
    pub min_difference: f64,

    /// Elimination test (default: ANOVA).
    pub test: EliminationTest,

    /// Random seed for folds, grids and stochastic models (default: 42).
    pub seed: u64,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            folds: 10,
            grid_size: 25,
            burn_in: 3,
            alpha: 0.05,
            num_ties: 10,
            min_difference: 0.0,
            test: EliminationTest::Anova,
            seed: 42,
        }
    }
}

impl TuningConfig {
    #[must_use]
    pub fn builder() -> TuningConfigBuilder {
        TuningConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<(), LearningError> {
        if self.folds < 2 {
            return Err(LearningError::InvalidConfig(
                "folds must be at least 2".to_string(),
            ));
        }
        if self.grid_size == 0 {
            return Err(LearningError::InvalidConfig(
                "grid_size must be at least 1".to_string(),
            ));
        }
        if self.burn_in < 2 || self.burn_in > self.folds {
            return Err(LearningError::InvalidConfig(format!(
                "burn_in must be between 2 and folds ({}), got {}",
                self.folds, self.burn_in
            )));
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(LearningError::InvalidConfig(
                "alpha must be between 0.0 and 1.0 (exclusive)".to_string(),
            ));
        }
        if self.num_ties == 0 {
            return Err(LearningError::InvalidConfig(
                "num_ties must be at least 1".to_string(),
            ));
        }
        if !self.min_difference.is_finite() || self.min_difference < 0.0 {
            return Err(LearningError::InvalidConfig(
                "min_difference must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`TuningConfig`].
#[derive(Debug, Clone, Default)]
pub struct TuningConfigBuilder {
    config: TuningConfig,
}

impl TuningConfigBuilder {
    #[must_use]
    pub fn folds(mut self, folds: usize) -> Self {
        self.config.folds = folds;
        self
    }

    #[must_use]
    pub fn grid_size(mut self, size: usize) -> Self {
        self.config.grid_size = size;
        self
    }

    #[must_use]
    pub fn burn_in(mut self, folds: usize) -> Self {
        self.config.burn_in = folds;
        self
    }

    #[must_use]
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.config.alpha = alpha;
        self
    }

    #[must_use]
    pub fn num_ties(mut self, folds: usize) -> Self {
        self.config.num_ties = folds;
        self
    }

    #[must_use]
    pub fn min_difference(mut self, difference: f64) -> Self {
        self.config.min_difference = difference;
        self
    }

    #[must_use]
    pub fn test(mut self, test: EliminationTest) -> Self {
        self.config.test = test;
        self
    }

    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] if a count or level is out
    /// of range.
    pub fn build(self) -> Result<TuningConfig, LearningError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Settings of a complete experiment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Share of records used for training (default: 0.75).
    pub train_prop: f64,

    /// Seed of the train/test split; the tuning seed is set to the same
    /// value unless overridden (default: 42).
    pub seed: u64,

    /// Pair every recipe with every model (default), or zip them.
    pub cross: bool,

    /// Recipes of the workflow grid (default: basic, pca, corr).
    pub recipes: Vec<Recipe>,

    /// Models of the workflow grid (default: the six tuned engines).
    pub models: Vec<ModelKind>,

    pub tuning: TuningConfig,

    /// Number of worker threads (default: -1 for all cores).
    pub n_jobs: i32,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            train_prop: 0.75,
            seed: 42,
            cross: true,
            recipes: vec![Recipe::basic(), Recipe::pca(), Recipe::corr()],
            models: ModelKind::experiment_set().to_vec(),
            tuning: TuningConfig::default(),
            n_jobs: -1,
        }
    }
}

impl ExperimentConfig {
    #[must_use]
    pub fn builder() -> ExperimentConfigBuilder {
        ExperimentConfigBuilder::default()
    }

    /// Split settings derived from this configuration.
    pub fn split_config(&self) -> SplitConfig {
        SplitConfig::new(self.train_prop, self.seed)
    }
}

/// Builder for [`ExperimentConfig`].
#[derive(Debug, Clone, Default)]
pub struct ExperimentConfigBuilder {
    config: ExperimentConfig,
    tuning_seed: Option<u64>,
}

impl ExperimentConfigBuilder {
    #[must_use]
    pub fn train_prop(mut self, prop: f64) -> Self {
        self.config.train_prop = prop;
        self
    }

    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    #[must_use]
    pub fn cross(mut self, cross: bool) -> Self {
        self.config.cross = cross;
        self
    }

    #[must_use]
    pub fn recipes(mut self, recipes: Vec<Recipe>) -> Self {
        self.config.recipes = recipes;
        self
    }

    #[must_use]
    pub fn models(mut self, models: Vec<ModelKind>) -> Self {
        self.config.models = models;
        self
    }

    /// Racing settings. Their seed is replaced by the experiment seed
    /// unless [`tuning_seed`](Self::tuning_seed) is set.
    #[must_use]
    pub fn tuning(mut self, tuning: TuningConfig) -> Self {
        self.config.tuning = tuning;
        self
    }

    #[must_use]
    pub fn tuning_seed(mut self, seed: u64) -> Self {
        self.tuning_seed = Some(seed);
        self
    }

    /// Set the number of parallel jobs (default: -1 for all cores).
    ///
    /// - `-1`: Use all available CPU cores
    /// - `1`: Single-threaded
    /// - `n > 1`: Use exactly `n` cores
    #[must_use]
    pub fn n_jobs(mut self, jobs: i32) -> Self {
        self.config.n_jobs = jobs;
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] if:
    /// - `train_prop` is not in range `(0.0, 1.0)`
    /// - the recipe or model list is empty
    /// - `cross` is off and the lists differ in length
    /// - `n_jobs` is 0 or below -1
    /// - the tuning settings are invalid
    pub fn build(self) -> Result<ExperimentConfig, LearningError> {
        let mut config = self.config;
        config.tuning.seed = self.tuning_seed.unwrap_or(config.seed);

        config
            .split_config()
            .validate()
            .map_err(|e| LearningError::InvalidConfig(e.to_string()))?;
        if config.recipes.is_empty() || config.models.is_empty() {
            return Err(LearningError::InvalidConfig(
                "at least one recipe and one model are required".to_string(),
            ));
        }
        if !config.cross && config.recipes.len() != config.models.len() {
            return Err(LearningError::InvalidConfig(format!(
                "zipped workflow grid needs as many recipes as models ({} vs {})",
                config.recipes.len(),
                config.models.len()
            )));
        }
        if config.n_jobs == 0 || config.n_jobs < -1 {
            return Err(LearningError::InvalidConfig(
                "n_jobs must be -1 or a positive number".to_string(),
            ));
        }
        config.tuning.validate()?;
        Ok(config)
    }
}
