//! Dataset loader: reads the elements and ratings tables and joins them.
//!
//! The elements table carries one row per episode, keyed by an episode code
//! (`S01E01`), a title and one numeric column per painting element. The
//! ratings table carries `season`, `episode`, `rating` and `votes`. Every
//! elements row must find exactly one ratings row; ratings rows without an
//! elements partner are ignored.
//!
//! Any missing column, malformed cell or failed join aborts the load.

use crate::config::LoaderConfig;
use crate::dataset::{Dataset, EpisodeKey, EpisodeMeta};
use crate::error::{ProcessingError, Result, ResultExt};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Reads and joins the two input tables into a [`Dataset`].
#[derive(Debug, Clone, Default)]
pub struct EpisodeLoader {
    config: LoaderConfig,
}

impl EpisodeLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load both CSV files from disk and join them.
    pub fn load(&self, elements: impl AsRef<Path>, ratings: impl AsRef<Path>) -> Result<Dataset> {
        let elements = elements.as_ref();
        let ratings = ratings.as_ref();
        info!("Loading elements table: {}", elements.display());
        let elements_df = read_csv(elements)
            .context(format!("Failed to read elements file {}", elements.display()))?;
        info!("Loading ratings table: {}", ratings.display());
        let ratings_df = read_csv(ratings)
            .context(format!("Failed to read ratings file {}", ratings.display()))?;
        self.assemble(&elements_df, &ratings_df)
    }

    /// Join already-parsed tables.
    pub fn assemble(&self, elements: &DataFrame, ratings: &DataFrame) -> Result<Dataset> {
        let cfg = &self.config;
        let ratings_by_key = self.index_ratings(ratings)?;

        let codes = string_column(elements, &cfg.episode_code_column)?;
        let titles = string_column(elements, &cfg.title_column)?;

        let element_names: Vec<String> = elements
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .filter(|name| {
                name != &cfg.episode_code_column
                    && name != &cfg.title_column
                    && !cfg.drop_columns.contains(name)
            })
            .collect();
        if element_names.iter().any(|name| name == &cfg.votes_column) {
            return Err(ProcessingError::InvalidConfig(format!(
                "elements table already has a '{}' column",
                cfg.votes_column
            )));
        }
        let element_values = element_names
            .iter()
            .map(|name| float_column(elements, name))
            .collect::<Result<Vec<_>>>()?;

        let n = elements.height();
        let n_features = element_names.len() + 1;
        let mut features = Array2::<f64>::zeros((n, n_features));
        let mut target = Array1::<f64>::zeros(n);
        let mut episodes = Vec::with_capacity(n);
        let mut unmatched = Vec::new();

        for row in 0..n {
            let key = codes[row]
                .as_deref()
                .and_then(EpisodeKey::parse_code)
                .ok_or_else(|| ProcessingError::MalformedValue {
                    column: cfg.episode_code_column.clone(),
                    row,
                    reason: format!(
                        "expected an episode code like S01E01, got {:?}",
                        codes[row].as_deref().unwrap_or("<null>")
                    ),
                })?;

            let Some(&(rating, votes)) = ratings_by_key.get(&key) else {
                unmatched.push(key);
                continue;
            };

            for (col, values) in element_values.iter().enumerate() {
                features[[row, col]] = values[row];
            }
            features[[row, n_features - 1]] = votes;
            target[row] = rating;
            episodes.push(EpisodeMeta {
                key,
                title: titles[row].clone().unwrap_or_default(),
            });
        }

        if let Some(first) = unmatched.first() {
            warn!("{} elements rows without ratings", unmatched.len());
            return Err(ProcessingError::UnmatchedJoin {
                count: unmatched.len(),
                first: first.to_string(),
            });
        }

        let extra = ratings_by_key.len().saturating_sub(n);
        if extra > 0 {
            debug!("{} ratings rows have no elements partner and are ignored", extra);
        }

        let mut feature_names = element_names;
        feature_names.push(cfg.votes_column.clone());
        let dataset = Dataset::new(episodes, feature_names, features, target, &cfg.rating_column)?;
        info!(
            "Joined dataset: {} episodes, {} features",
            dataset.len(),
            dataset.n_features()
        );
        Ok(dataset)
    }

    fn index_ratings(&self, ratings: &DataFrame) -> Result<HashMap<EpisodeKey, (f64, f64)>> {
        let cfg = &self.config;
        let seasons = index_column(ratings, &cfg.season_column)?;
        let episodes = index_column(ratings, &cfg.episode_column)?;
        let rating = float_column(ratings, &cfg.rating_column)?;
        let votes = float_column(ratings, &cfg.votes_column)?;

        let mut map = HashMap::with_capacity(ratings.height());
        for row in 0..ratings.height() {
            let key = EpisodeKey::new(seasons[row], episodes[row]);
            if map.insert(key, (rating[row], votes[row])).is_some() {
                return Err(ProcessingError::DuplicateKey(key.to_string()))
                    .context("In ratings table");
            }
        }
        Ok(map)
    }
}

/// Read a CSV file with header detection and quote handling.
///
/// Falls back to a quote-less parse when the first attempt fails, which
/// copes with exports that contain stray quote characters in titles.
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(ProcessingError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        )));
    }

    match CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => debug!("Standard CSV parse failed: {}", e),
    }

    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(None))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()?;
    Ok(df)
}

fn require_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|column| column.as_materialized_series())
        .map_err(|_| ProcessingError::ColumnNotFound(name.to_string()))
}

/// Column values as finite floats; nulls and unparsable cells are errors.
fn float_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = require_column(df, name)?;
    let cast = series.cast(&DataType::Float64)?;
    let values = cast.f64()?;
    (0..values.len())
        .map(|row| match values.get(row) {
            Some(v) if v.is_finite() => Ok(v),
            Some(v) => Err(ProcessingError::MalformedValue {
                column: name.to_string(),
                row,
                reason: format!("non-finite value {v}"),
            }),
            None => Err(ProcessingError::MalformedValue {
                column: name.to_string(),
                row,
                reason: format!("missing or non-numeric value {}", raw_cell(series, row)),
            }),
        })
        .collect()
}

/// Non-negative integer column (season or episode number).
fn index_column(df: &DataFrame, name: &str) -> Result<Vec<u32>> {
    let series = require_column(df, name)?;
    let cast = series.cast(&DataType::Int64)?;
    let values = cast.i64()?;
    (0..values.len())
        .map(|row| {
            values
                .get(row)
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| ProcessingError::MalformedValue {
                    column: name.to_string(),
                    row,
                    reason: format!("expected a non-negative integer, got {}", raw_cell(series, row)),
                })
        })
        .collect()
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = require_column(df, name)?;
    let cast = series.cast(&DataType::String)?;
    let values = cast.str()?;
    Ok(values.into_iter().map(|v| v.map(str::to_string)).collect())
}

fn raw_cell(series: &Series, row: usize) -> String {
    series
        .get(row)
        .map(|v| v.to_string())
        .unwrap_or_else(|_| "<unreadable>".to_string())
}
