//! Error types for the brushwork-learning crate.
//!
//! [`LearningError`] is returned by every fallible operation of the crate.
//! The variants fall into four groups with different consequences:
//!
//! - **Data errors** come through [`Processing`](LearningError::Processing)
//!   while loading and abort the run.
//! - **Fit errors** ([`FitFailed`](LearningError::FitFailed),
//!   [`PredictFailed`](LearningError::PredictFailed)) raised for a single
//!   candidate on a single fold are recorded as failed evaluations; racing
//!   continues.
//! - **Domain errors** ([`EmptyDomain`](LearningError::EmptyDomain)) mark one
//!   workflow as failed and exclude it from ranking.
//! - **Final-fit errors** ([`FinalFitFailed`](LearningError::FinalFitFailed))
//!   are fatal.

use brushwork_processing::ProcessingError;
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for brushwork-learning operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LearningError {
    /// Error raised while loading, splitting or preprocessing.
    #[error(transparent)]
    Processing(#[from] ProcessingError),

    /// Invalid configuration provided to the experiment.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A model could not be fitted on the given data.
    #[error("Fitting {model} failed: {reason}")]
    FitFailed { model: String, reason: String },

    /// A fitted model could not produce predictions.
    #[error("Prediction with {model} failed: {reason}")]
    PredictFailed { model: String, reason: String },

    /// A tunable parameter has no admissible value after finalization.
    #[error("Parameter '{parameter}' has an empty domain [{lower}, {upper}]")]
    EmptyDomain {
        parameter: String,
        lower: i64,
        upper: i64,
    },

    /// A model or recipe name that is not part of the set.
    #[error("Unknown {kind} '{name}'")]
    UnknownComponent { kind: &'static str, name: String },

    /// Hyperparameter name not understood by a model.
    #[error("Model '{model}' has no parameter '{parameter}'")]
    UnknownParameter { model: String, parameter: String },

    /// Every workflow failed or was excluded, so nothing can be ranked.
    #[error("No workflow produced a successful evaluation")]
    NoSurvivors,

    /// The chosen workflow could not be refit or scored on the test set.
    #[error("Final fit of '{workflow}' failed: {reason}")]
    FinalFitFailed { workflow: String, reason: String },

    /// The run was cancelled through a cancellation token.
    #[error("Experiment cancelled")]
    Cancelled,

    /// The dedicated thread pool could not be created.
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// JSON serialization error (reports).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error while writing reports.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LearningError {
    pub fn fit_failed(model: impl Into<String>, reason: impl ToString) -> Self {
        LearningError::FitFailed {
            model: model.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable error code for reports and machine consumers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Processing(e) => e.error_code(),
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::FitFailed { .. } => "FIT_FAILED",
            Self::PredictFailed { .. } => "PREDICT_FAILED",
            Self::EmptyDomain { .. } => "EMPTY_DOMAIN",
            Self::UnknownComponent { .. } => "UNKNOWN_COMPONENT",
            Self::UnknownParameter { .. } => "UNKNOWN_PARAMETER",
            Self::NoSurvivors => "NO_SURVIVORS",
            Self::FinalFitFailed { .. } => "FINAL_FIT_FAILED",
            Self::Cancelled => "CANCELLED",
            Self::ThreadPool(_) => "THREAD_POOL",
            Self::Json(_) => "JSON_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// Check if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Processing(e) => e.is_cancelled(),
            _ => false,
        }
    }
}

impl Serialize for LearningError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("LearningError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for learning operations.
pub type Result<T> = std::result::Result<T, LearningError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_errors_keep_their_code() {
        let err: LearningError = ProcessingError::EmptyFeatureSet("nzv".into()).into();
        assert_eq!(err.error_code(), "EMPTY_FEATURE_SET");
        assert_eq!(err.to_string(), "No feature columns remain after step 'nzv'");
    }

    #[test]
    fn test_cancellation_detected_through_processing() {
        let err: LearningError = ProcessingError::Cancelled.into();
        assert!(err.is_cancelled());
        assert!(LearningError::Cancelled.is_cancelled());
        assert!(!LearningError::NoSurvivors.is_cancelled());
    }

    #[test]
    fn test_error_serialization() {
        let err = LearningError::EmptyDomain {
            parameter: "mtry".into(),
            lower: 1,
            upper: 0,
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "EMPTY_DOMAIN");
        assert_eq!(json["message"], "Parameter 'mtry' has an empty domain [1, 0]");
    }
}
