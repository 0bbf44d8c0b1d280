//! Configuration types for loading and splitting the episode dataset.
//!
//! Both configs follow the builder pattern: unset fields fall back to the
//! defaults and `build()` validates ranges.

use crate::error::ProcessingError;
use serde::{Deserialize, Serialize};

/// Column names of the two input tables.
///
/// The elements table has one row per episode keyed by an episode code such
/// as `S01E01`; every other non-dropped column is a painting element
/// feature. The ratings table is keyed by separate season and episode
/// columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Episode code column in the elements table. Default: `EPISODE`
    pub episode_code_column: String,

    /// Title column in the elements table. Default: `TITLE`
    pub title_column: String,

    /// Season column in the ratings table. Default: `season`
    pub season_column: String,

    /// Episode-within-season column in the ratings table. Default: `episode`
    pub episode_column: String,

    /// Target column in the ratings table. Default: `rating`
    pub rating_column: String,

    /// Popularity covariate in the ratings table, kept as a feature.
    /// Default: `votes`
    pub votes_column: String,

    /// Extra element columns to ignore.
    pub drop_columns: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            episode_code_column: "EPISODE".to_string(),
            title_column: "TITLE".to_string(),
            season_column: "season".to_string(),
            episode_column: "episode".to_string(),
            rating_column: "rating".to_string(),
            votes_column: "votes".to_string(),
            drop_columns: Vec::new(),
        }
    }
}

impl LoaderConfig {
    pub fn builder() -> LoaderConfigBuilder {
        LoaderConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let names = [
            ("episode_code_column", &self.episode_code_column),
            ("title_column", &self.title_column),
            ("season_column", &self.season_column),
            ("episode_column", &self.episode_column),
            ("rating_column", &self.rating_column),
            ("votes_column", &self.votes_column),
        ];
        for (field, value) in names {
            if value.trim().is_empty() {
                return Err(ConfigValidationError::EmptyColumnName(field.to_string()));
            }
        }
        Ok(())
    }
}

/// Builder for [`LoaderConfig`].
#[derive(Debug, Default)]
pub struct LoaderConfigBuilder {
    episode_code_column: Option<String>,
    title_column: Option<String>,
    rating_column: Option<String>,
    votes_column: Option<String>,
    drop_columns: Vec<String>,
}

impl LoaderConfigBuilder {
    pub fn episode_code_column(mut self, name: impl Into<String>) -> Self {
        self.episode_code_column = Some(name.into());
        self
    }

    pub fn title_column(mut self, name: impl Into<String>) -> Self {
        self.title_column = Some(name.into());
        self
    }

    pub fn rating_column(mut self, name: impl Into<String>) -> Self {
        self.rating_column = Some(name.into());
        self
    }

    pub fn votes_column(mut self, name: impl Into<String>) -> Self {
        self.votes_column = Some(name.into());
        self
    }

    /// Ignore an element column entirely.
    pub fn drop_column(mut self, name: impl Into<String>) -> Self {
        self.drop_columns.push(name.into());
        self
    }

    pub fn build(self) -> Result<LoaderConfig, ConfigValidationError> {
        let defaults = LoaderConfig::default();
        let config = LoaderConfig {
            episode_code_column: self
                .episode_code_column
                .unwrap_or(defaults.episode_code_column),
            title_column: self.title_column.unwrap_or(defaults.title_column),
            season_column: defaults.season_column,
            episode_column: defaults.episode_column,
            rating_column: self.rating_column.unwrap_or(defaults.rating_column),
            votes_column: self.votes_column.unwrap_or(defaults.votes_column),
            drop_columns: self.drop_columns,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Settings for the initial train/test split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Share of records assigned to training (exclusive 0 - 1).
    /// Default: 0.75
    pub train_prop: f64,

    /// Seed for the shuffling RNG.
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_prop: 0.75,
            seed: 42,
        }
    }
}

impl SplitConfig {
    pub fn new(train_prop: f64, seed: u64) -> Self {
        Self { train_prop, seed }
    }

    pub fn builder() -> SplitConfigBuilder {
        SplitConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(self.train_prop > 0.0 && self.train_prop < 1.0) {
            return Err(ConfigValidationError::InvalidProportion {
                field: "train_prop".to_string(),
                value: self.train_prop,
            });
        }
        Ok(())
    }
}

/// Builder for [`SplitConfig`].
#[derive(Debug, Default)]
pub struct SplitConfigBuilder {
    train_prop: Option<f64>,
    seed: Option<u64>,
}

impl SplitConfigBuilder {
    pub fn train_prop(mut self, prop: f64) -> Self {
        self.train_prop = Some(prop);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<SplitConfig, ConfigValidationError> {
        let defaults = SplitConfig::default();
        let config = SplitConfig {
            train_prop: self.train_prop.unwrap_or(defaults.train_prop),
            seed: self.seed.unwrap_or(defaults.seed),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid proportion for '{field}': {value} (must be strictly between 0.0 and 1.0)")]
    InvalidProportion { field: String, value: f64 },

    #[error("Column name for '{0}' must not be empty")]
    EmptyColumnName(String),
}

impl From<ConfigValidationError> for ProcessingError {
    fn from(err: ConfigValidationError) -> Self {
        ProcessingError::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_loader_config() {
        let config = LoaderConfig::default();
        assert_eq!(config.episode_code_column, "EPISODE");
        assert_eq!(config.rating_column, "rating");
        assert!(config.drop_columns.is_empty());
    }

    #[test]
    fn test_loader_builder_rejects_empty_names() {
        let result = LoaderConfig::builder().rating_column("  ").build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::EmptyColumnName(field) if field == "rating_column"
        ));
    }

    #[test]
    fn test_split_builder_defaults() {
        let config = SplitConfig::builder().seed(7).build().unwrap();
        assert_eq!(config.train_prop, 0.75);
        assert_eq!(config.seed, 7);
    }

    #[test]
    fn test_split_validation() {
        for prop in [0.0, 1.0, -0.2, f64::NAN] {
            let result = SplitConfig::builder().train_prop(prop).build();
            assert!(
                matches!(result, Err(ConfigValidationError::InvalidProportion { .. })),
                "prop {prop} should be rejected"
            );
        }
    }

    #[test]
    fn test_validation_error_converts_to_invalid_config() {
        let err: ProcessingError = ConfigValidationError::EmptyColumnName("x".into()).into();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_config_serialization() {
        let config = SplitConfig::new(0.8, 2024);
        let json = serde_json::to_string(&config).unwrap();
        let back: SplitConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
