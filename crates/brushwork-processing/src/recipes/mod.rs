//! Preprocessing recipes: named, ordered lists of feature-engineering steps.
//!
//! A [`Recipe`] is a specification. Fitting it on an analysis frame with a
//! candidate [`Assignment`] learns every statistic the steps need (columns
//! to drop, means, loadings) and returns a [`FittedRecipe`] that applies
//! exactly the same transformation to any other frame. Nothing is learned
//! from the frame being transformed, so assessment and test rows never leak
//! into the fit.
//!
//! Three presets mirror the experiment grid:
//!
//! | recipe  | steps                                        |
//! |---------|----------------------------------------------|
//! | `basic` | nzv                                          |
//! | `pca`   | nzv, normalize, pca(`num_comp` tuned)        |
//! | `corr`  | nzv, normalize, corr(`threshold` tuned)      |

mod corr;
mod normalize;
mod nzv;
mod pca;

pub use corr::CorrelationFilter;
pub use normalize::NormalizeStats;
pub use nzv::{FREQ_CUT, NearZeroVariance, UNIQUE_CUT};
pub use pca::{PcaProjection, symmetric_eigen, variance_explained};

use crate::dataset::Frame;
use crate::error::{ProcessingError, Result};
use crate::params::{Assignment, Domain, Param, Tunable};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Default search range for the number of principal components.
pub const NUM_COMP_RANGE: (i64, i64) = (1, 4);

/// Default search range for the correlation threshold.
pub const THRESHOLD_RANGE: (f64, f64) = (0.0, 1.0);

/// One preprocessing step specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Step {
    NearZeroVariance { freq_cut: f64, unique_cut: f64 },
    Normalize,
    Pca { num_comp: Param },
    Correlation { threshold: Param },
}

impl Step {
    pub fn nzv() -> Self {
        Step::NearZeroVariance {
            freq_cut: FREQ_CUT,
            unique_cut: UNIQUE_CUT,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Step::NearZeroVariance { .. } => "nzv",
            Step::Normalize => "normalize",
            Step::Pca { .. } => "pca",
            Step::Correlation { .. } => "corr",
        }
    }

    fn tunable(&self) -> Option<Tunable> {
        match self {
            Step::Pca {
                num_comp: Param::Tune(id),
            } => Some(Tunable::new(id, Domain::int(NUM_COMP_RANGE.0, NUM_COMP_RANGE.1))),
            Step::Correlation {
                threshold: Param::Tune(id),
            } => Some(Tunable::new(
                id,
                Domain::float(THRESHOLD_RANGE.0, THRESHOLD_RANGE.1),
            )),
            _ => None,
        }
    }

    fn fit(&self, frame: &Frame, assignment: &Assignment) -> Result<FittedStep> {
        Ok(match self {
            Step::NearZeroVariance {
                freq_cut,
                unique_cut,
            } => FittedStep::DropColumns {
                step: self.name().to_string(),
                names: NearZeroVariance::detect(frame, *freq_cut, *unique_cut),
            },
            Step::Normalize => FittedStep::Normalize(NormalizeStats::fit(frame)),
            Step::Pca { num_comp } => {
                let k = num_comp.resolve_usize("num_comp", assignment)?;
                FittedStep::Pca(PcaProjection::fit(frame, k)?)
            }
            Step::Correlation { threshold } => {
                let t = threshold.resolve_f64("threshold", assignment)?;
                FittedStep::DropColumns {
                    step: self.name().to_string(),
                    names: CorrelationFilter::detect(frame, t),
                }
            }
        })
    }
}

/// A learned step, ready to transform new frames.
#[derive(Debug, Clone, PartialEq)]
pub enum FittedStep {
    DropColumns {
        step: String,
        names: Vec<String>,
    },
    Normalize(NormalizeStats),
    Pca(PcaProjection),
}

impl FittedStep {
    pub fn transform(&self, frame: &Frame) -> Result<Frame> {
        match self {
            FittedStep::DropColumns { names, .. } => Ok(frame.drop(names)),
            FittedStep::Normalize(stats) => stats.transform(frame),
            FittedStep::Pca(projection) => projection.transform(frame),
        }
    }
}

/// Named, ordered preprocessing specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    pub steps: Vec<Step>,
}

impl Recipe {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Near-zero-variance filter only.
    pub fn basic() -> Self {
        Recipe::new("basic").step(Step::nzv())
    }

    /// Near-zero-variance filter, normalization, tuned PCA.
    pub fn pca() -> Self {
        Recipe::new("pca")
            .step(Step::nzv())
            .step(Step::Normalize)
            .step(Step::Pca {
                num_comp: Param::tune("num_comp"),
            })
    }

    /// Near-zero-variance filter, normalization, tuned correlation filter.
    pub fn corr() -> Self {
        Recipe::new("corr")
            .step(Step::nzv())
            .step(Step::Normalize)
            .step(Step::Correlation {
                threshold: Param::tune("threshold"),
            })
    }

    /// Look up a preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "basic" => Some(Self::basic()),
            "pca" => Some(Self::pca()),
            "corr" => Some(Self::corr()),
            _ => None,
        }
    }

    pub fn preset_names() -> &'static [&'static str] {
        &["basic", "pca", "corr"]
    }

    /// Tunable placeholders of all steps, in step order.
    pub fn tunables(&self) -> Vec<Tunable> {
        self.steps.iter().filter_map(Step::tunable).collect()
    }

    /// Learn every step on `frame` with the candidate's values.
    ///
    /// Fails with [`ProcessingError::EmptyFeatureSet`] as soon as a step
    /// leaves no columns.
    pub fn fit(&self, frame: &Frame, assignment: &Assignment) -> Result<FittedRecipe> {
        if frame.nrows() == 0 {
            return Err(ProcessingError::InsufficientData(format!(
                "recipe '{}' cannot be fitted on zero rows",
                self.name
            )));
        }
        if frame.ncols() == 0 {
            return Err(ProcessingError::EmptyFeatureSet("input".to_string()));
        }

        let mut current = frame.clone();
        let mut fitted = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let learned = step.fit(&current, assignment)?;
            current = learned.transform(&current)?;
            trace!(
                recipe = %self.name,
                step = step.name(),
                columns = current.ncols(),
                "fitted step"
            );
            if current.ncols() == 0 {
                return Err(ProcessingError::EmptyFeatureSet(step.name().to_string()));
            }
            fitted.push(learned);
        }

        Ok(FittedRecipe {
            name: self.name.clone(),
            steps: fitted,
            output_names: current.names,
        })
    }

    /// Upper bound on the number of columns this recipe can emit for `frame`.
    ///
    /// Steps with fixed parameters are fitted for real until the first
    /// tuned step; after that each step contributes its widest outcome.
    pub fn max_output_width(&self, frame: &Frame) -> Result<usize> {
        let mut current = Some(frame.clone());
        let mut width = frame.ncols();
        let empty = Assignment::new();

        for step in &self.steps {
            let fixed = !matches!(
                step,
                Step::Pca {
                    num_comp: Param::Tune(_)
                } | Step::Correlation {
                    threshold: Param::Tune(_)
                }
            );
            match current.take() {
                Some(prev) if fixed => {
                    let next = step.fit(&prev, &empty)?.transform(&prev)?;
                    width = next.ncols();
                    current = Some(next);
                }
                _ => {
                    if let Step::Pca { .. } = step {
                        width = width.min(NUM_COMP_RANGE.1.max(0) as usize);
                    }
                }
            }
        }
        Ok(width)
    }
}

/// The learned form of a [`Recipe`].
#[derive(Debug, Clone, PartialEq)]
pub struct FittedRecipe {
    pub name: String,
    pub steps: Vec<FittedStep>,
    pub output_names: Vec<String>,
}

impl FittedRecipe {
    pub fn transform(&self, frame: &Frame) -> Result<Frame> {
        let mut current = frame.clone();
        for step in &self.steps {
            current = step.transform(&current)?;
        }
        Ok(current)
    }

    /// Columns removed by filter steps, in step order.
    pub fn dropped_columns(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter_map(|s| match s {
                FittedStep::DropColumns { names, .. } => Some(names.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use pretty_assertions::assert_eq;

    /// 24 rows: a constant column, two near-duplicates and a third signal.
    fn frame() -> Frame {
        let values = Array2::from_shape_fn((24, 4), |(i, j)| {
            let x = i as f64;
            match j {
                0 => 1.0,
                1 => x,
                2 => 2.0 * x + if i % 4 == 0 { 0.3 } else { 0.0 },
                _ => ((i * 5) % 7) as f64,
            }
        });
        Frame::new(
            vec!["CONST".into(), "A".into(), "A2".into(), "B".into()],
            values,
        )
        .unwrap()
    }

    #[test]
    fn test_presets() {
        assert_eq!(Recipe::basic().steps.len(), 1);
        assert!(Recipe::basic().tunables().is_empty());
        let tunables = Recipe::pca().tunables();
        assert_eq!(tunables.len(), 1);
        assert_eq!(tunables[0].id, "num_comp");
        assert_eq!(tunables[0].domain, Domain::int(1, 4));
        assert_eq!(Recipe::corr().tunables()[0].id, "threshold");
        assert!(Recipe::preset("spline").is_none());
    }

    #[test]
    fn test_basic_drops_constant_column() {
        let fitted = Recipe::basic().fit(&frame(), &Assignment::new()).unwrap();
        assert_eq!(fitted.dropped_columns(), vec!["CONST".to_string()]);
        assert_eq!(fitted.output_names.len(), 3);
    }

    #[test]
    fn test_pca_recipe_output() {
        let assignment = Assignment::new().with("num_comp", 2usize);
        let fitted = Recipe::pca().fit(&frame(), &assignment).unwrap();
        assert_eq!(fitted.output_names, vec!["PC1".to_string(), "PC2".to_string()]);

        let new_rows = frame().values.slice(ndarray::s![..5, ..]).to_owned();
        let out = fitted
            .transform(&Frame::new(frame().names, new_rows).unwrap())
            .unwrap();
        assert_eq!(out.nrows(), 5);
        assert_eq!(out.ncols(), 2);
    }

    #[test]
    fn test_pca_recipe_without_assignment_fails() {
        let err = Recipe::pca().fit(&frame(), &Assignment::new()).unwrap_err();
        assert_eq!(err.error_code(), "UNRESOLVED_PARAMETER");
    }

    #[test]
    fn test_corr_recipe_drops_duplicate_signal() {
        let assignment = Assignment::new().with("threshold", 0.9);
        let fitted = Recipe::corr().fit(&frame(), &assignment).unwrap();
        let dropped = fitted.dropped_columns();
        assert_eq!(dropped[0], "CONST");
        assert_eq!(dropped.len(), 2);
        assert_eq!(fitted.output_names.len(), 2);
    }

    #[test]
    fn test_all_columns_removed_fails_cleanly() {
        let values = Array2::from_elem((10, 2), 3.0);
        let constant = Frame::new(vec!["X".into(), "Y".into()], values).unwrap();
        let err = Recipe::basic().fit(&constant, &Assignment::new()).unwrap_err();
        assert!(matches!(err, ProcessingError::EmptyFeatureSet(ref step) if step == "nzv"));
    }

    #[test]
    fn test_max_output_width() {
        assert_eq!(Recipe::basic().max_output_width(&frame()).unwrap(), 3);
        assert_eq!(Recipe::pca().max_output_width(&frame()).unwrap(), 3);
        assert_eq!(Recipe::corr().max_output_width(&frame()).unwrap(), 3);
    }

    #[test]
    fn test_transform_requires_fitted_columns() {
        let fitted = Recipe::corr()
            .fit(&frame(), &Assignment::new().with("threshold", 0.99))
            .unwrap();
        let partial = frame().drop(&["B".to_string()]);
        let err = fitted.transform(&partial).unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    }
}
