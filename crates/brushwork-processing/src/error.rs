//! Custom error types for dataset loading, resampling and preprocessing.
//!
//! This module provides the error hierarchy for the processing crate using
//! `thiserror`. Load-time errors (missing columns, malformed values, failed
//! joins) abort the run; recipe errors raised while tuning are caught by the
//! caller and recorded as failed evaluations.
//!
//! Errors are serializable so they can be embedded in JSON reports.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the processing crate.
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// Operation was cancelled through a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// Column was not found in a table or frame.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// A cell could not be interpreted as the expected type.
    #[error("Malformed value in column '{column}' at row {row}: {reason}")]
    MalformedValue {
        column: String,
        row: usize,
        reason: String,
    },

    /// Rows of the elements table without a partner in the ratings table.
    #[error("{count} episode(s) have no matching ratings row (first unmatched: {first})")]
    UnmatchedJoin { count: usize, first: String },

    /// The same (season, episode) key occurs twice.
    #[error("Duplicate episode key {0}")]
    DuplicateKey(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Not enough rows for the requested operation.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// A preprocessing step removed every feature column.
    #[error("No feature columns remain after step '{0}'")]
    EmptyFeatureSet(String),

    /// A tunable placeholder had no value in the candidate assignment.
    #[error("No value assigned to tunable parameter '{0}'")]
    UnresolvedParameter(String),

    /// A parameter value had the wrong kind (e.g. text where a number was expected).
    #[error("Parameter '{name}' expected {expected}, got {actual}")]
    ParameterType {
        name: String,
        expected: String,
        actual: String,
    },

    /// Matrix or vector dimensions do not agree.
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ProcessingError>,
    },
}

impl ProcessingError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ProcessingError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code for reports and machine consumers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Cancelled => "CANCELLED",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::MalformedValue { .. } => "MALFORMED_VALUE",
            Self::UnmatchedJoin { .. } => "UNMATCHED_JOIN",
            Self::DuplicateKey(_) => "DUPLICATE_KEY",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InsufficientData(_) => "INSUFFICIENT_DATA",
            Self::EmptyFeatureSet(_) => "EMPTY_FEATURE_SET",
            Self::UnresolvedParameter(_) => "UNRESOLVED_PARAMETER",
            Self::ParameterType { .. } => "PARAMETER_TYPE",
            Self::ShapeMismatch { .. } => "SHAPE_MISMATCH",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Check if this error is a load-time data error, which aborts the run.
    pub fn is_data_error(&self) -> bool {
        match self {
            Self::ColumnNotFound(_)
            | Self::MalformedValue { .. }
            | Self::UnmatchedJoin { .. }
            | Self::DuplicateKey(_) => true,
            Self::WithContext { source, .. } => source.is_data_error(),
            _ => false,
        }
    }
}

impl Serialize for ProcessingError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ProcessingError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for processing operations.
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ProcessingError::Polars(e).with_context(context))
    }
}
