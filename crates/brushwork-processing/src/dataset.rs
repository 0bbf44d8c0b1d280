//! In-memory episode dataset and the named feature frames used by recipes.

use crate::error::{ProcessingError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// (season, episode) identifier of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EpisodeKey {
    pub season: u32,
    pub episode: u32,
}

impl EpisodeKey {
    pub fn new(season: u32, episode: u32) -> Self {
        Self { season, episode }
    }

    /// Parse an episode code of the form `S01E01`. Case-insensitive, and
    /// surrounding quotes or whitespace are ignored.
    pub fn parse_code(code: &str) -> Option<Self> {
        let code = code.trim().trim_matches('"').to_ascii_uppercase();
        let rest = code.strip_prefix('S')?;
        let (season, episode) = rest.split_once('E')?;
        if season.is_empty() || episode.is_empty() {
            return None;
        }
        Some(Self {
            season: season.parse().ok()?,
            episode: episode.parse().ok()?,
        })
    }
}

impl fmt::Display for EpisodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:02}E{:02}", self.season, self.episode)
    }
}

/// Non-feature attributes of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeMeta {
    pub key: EpisodeKey,
    pub title: String,
}

/// Ordered, immutable set of records with a uniform numeric schema.
///
/// Rows of `features` and entries of `target` are aligned with `episodes`.
#[derive(Debug, Clone)]
pub struct Dataset {
    episodes: Vec<EpisodeMeta>,
    feature_names: Vec<String>,
    features: Array2<f64>,
    target: Array1<f64>,
    target_name: String,
}

impl Dataset {
    /// Build a dataset, checking shapes, key uniqueness and finiteness.
    pub fn new(
        episodes: Vec<EpisodeMeta>,
        feature_names: Vec<String>,
        features: Array2<f64>,
        target: Array1<f64>,
        target_name: impl Into<String>,
    ) -> Result<Self> {
        let n = episodes.len();
        if features.nrows() != n || target.len() != n {
            return Err(ProcessingError::ShapeMismatch {
                expected: format!("{n} rows"),
                actual: format!(
                    "features {}x{}, target {}",
                    features.nrows(),
                    features.ncols(),
                    target.len()
                ),
            });
        }
        if features.ncols() != feature_names.len() {
            return Err(ProcessingError::ShapeMismatch {
                expected: format!("{} feature columns", feature_names.len()),
                actual: format!("{}", features.ncols()),
            });
        }

        let mut seen = HashSet::with_capacity(n);
        for meta in &episodes {
            if !seen.insert(meta.key) {
                return Err(ProcessingError::DuplicateKey(meta.key.to_string()));
            }
        }
        let mut names = HashSet::with_capacity(feature_names.len());
        for name in &feature_names {
            if !names.insert(name.as_str()) {
                return Err(ProcessingError::InvalidConfig(format!(
                    "duplicate feature column '{name}'"
                )));
            }
        }

        let target_name = target_name.into();
        if let Some(row) = target.iter().position(|v| !v.is_finite()) {
            return Err(ProcessingError::MalformedValue {
                column: target_name,
                row,
                reason: "target must be finite".to_string(),
            });
        }
        for (col, column) in features.axis_iter(Axis(1)).enumerate() {
            if let Some(row) = column.iter().position(|v| !v.is_finite()) {
                return Err(ProcessingError::MalformedValue {
                    column: feature_names[col].clone(),
                    row,
                    reason: "feature values must be finite".to_string(),
                });
            }
        }

        Ok(Self {
            episodes,
            feature_names,
            features,
            target,
            target_name,
        })
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn episodes(&self) -> &[EpisodeMeta] {
        &self.episodes
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    pub fn target(&self) -> &Array1<f64> {
        &self.target
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Feature matrix as a named [`Frame`].
    pub fn frame(&self) -> Frame {
        Frame {
            names: self.feature_names.clone(),
            values: self.features.clone(),
        }
    }

    /// Rows at `indices`, in the given order.
    ///
    /// Panics if an index is out of bounds; indices come from the splitter,
    /// which only produces positions inside the dataset.
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            episodes: indices.iter().map(|&i| self.episodes[i].clone()).collect(),
            feature_names: self.feature_names.clone(),
            features: self.features.select(Axis(0), indices),
            target: self.target.select(Axis(0), indices),
            target_name: self.target_name.clone(),
        }
    }

    /// Column values by name.
    pub fn column(&self, name: &str) -> Result<Array1<f64>> {
        let idx = self
            .feature_names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| ProcessingError::ColumnNotFound(name.to_string()))?;
        Ok(self.features.column(idx).to_owned())
    }
}

/// Named numeric matrix flowing through preprocessing steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub names: Vec<String>,
    pub values: Array2<f64>,
}

impl Frame {
    pub fn new(names: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if names.len() != values.ncols() {
            return Err(ProcessingError::ShapeMismatch {
                expected: format!("{} columns", names.len()),
                actual: format!("{}", values.ncols()),
            });
        }
        Ok(Self { names, values })
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.names.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Keep the named columns, in the order given.
    pub fn select(&self, names: &[String]) -> Result<Frame> {
        let indices = names
            .iter()
            .map(|name| {
                self.column_index(name)
                    .ok_or_else(|| ProcessingError::ColumnNotFound(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Frame {
            names: names.to_vec(),
            values: self.values.select(Axis(1), &indices),
        })
    }

    /// Remove the named columns. Names not present are ignored.
    pub fn drop(&self, names: &[String]) -> Frame {
        let keep: Vec<usize> = (0..self.ncols())
            .filter(|&i| !names.contains(&self.names[i]))
            .collect();
        Frame {
            names: keep.iter().map(|&i| self.names[i].clone()).collect(),
            values: self.values.select(Axis(1), &keep),
        }
    }

    pub fn into_values(self) -> Array2<f64> {
        self.values
    }
}
