//! Episode dataset loading, resampling and preprocessing recipes.
//!
//! This crate holds everything that happens to the data before a model sees
//! it:
//!
//! - **Loading**: read the painting-elements and ratings CSV files with
//!   Polars and join them on (season, episode) into a [`Dataset`]
//! - **Resampling**: seeded train/test split and V-fold cross-validation
//! - **Recipes**: near-zero-variance filtering, normalization, PCA and
//!   correlation filtering, fitted on analysis rows only
//! - **Parameters**: fixed values and tunable placeholders with their
//!   search domains
//! - **Progress & cancellation** primitives shared with the learning crate
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use brushwork_processing::{EpisodeLoader, Recipe, SplitConfig, initial_split, vfold};
//! use brushwork_processing::params::Assignment;
//!
//! let data = EpisodeLoader::default().load("elements.csv", "ratings.csv")?;
//! let split = initial_split(data.len(), &SplitConfig::new(0.75, 42))?;
//! let (training, test) = split.apply(&data);
//! let folds = vfold(training.len(), 10, 42)?;
//!
//! let assignment = Assignment::new().with("num_comp", 3usize);
//! let fitted = Recipe::pca().fit(&training.frame(), &assignment)?;
//! let baked = fitted.transform(&test.frame())?;
//! ```

pub mod config;
pub mod dataset;
pub mod error;
pub mod loader;
pub mod params;
pub mod progress;
pub mod recipes;
pub mod resample;
pub mod stats;

pub use config::{ConfigValidationError, LoaderConfig, SplitConfig};
pub use dataset::{Dataset, EpisodeKey, EpisodeMeta, Frame};
pub use error::{ProcessingError, Result, ResultExt};
pub use loader::{EpisodeLoader, read_csv};
pub use params::{Assignment, Domain, Param, ParamValue, Scale, Tunable};
pub use progress::{
    CancellationToken, ClosureProgressReporter, ExperimentStage, ProgressReporter,
    ProgressUpdate,
};
pub use recipes::{FittedRecipe, Recipe, Step};
pub use resample::{Fold, Split, initial_split, vfold};
