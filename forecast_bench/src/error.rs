//! Error types for the forecast_bench crate

use polars::prelude::PolarsError;
use std::sync::Arc;
use stdnn_math::MathError;
use thiserror::Error;

/// Custom error types for the forecast_bench crate
///
/// Cloneable so a failed experiment can keep its cause after returning it.
#[derive(Debug, Clone, Error)]
pub enum ForecastError {
    /// The series could not be loaded or failed validation
    #[error("Data source error: {0}")]
    DataSource(String),

    /// The series is too short for the requested window and horizon
    #[error("Insufficient data: need at least {required} observations, have {available}")]
    InsufficientData { required: usize, available: usize },

    /// The train/eval split left one side empty or was malformed
    #[error("Invalid split: {0}")]
    InvalidSplit(String),

    /// No model is registered under the requested name
    #[error("Unknown model: '{0}'")]
    UnknownModel(String),

    /// A trainable model was asked to predict before being fitted
    #[error("Model '{0}' has not been fitted")]
    NotFitted(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error related to shape or length validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Error from numeric helpers
    #[error("Math error: {0}")]
    Math(#[from] MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    Io(#[source] Arc<std::io::Error>),

    /// Error from JSON rendering or parsing
    #[error("Serialization error: {0}")]
    Serialization(#[source] Arc<serde_json::Error>),
}

impl ForecastError {
    /// Stable name of the error kind, surfaced on the command line
    pub fn kind(&self) -> &'static str {
        match self {
            ForecastError::DataSource(_) => "DataSourceError",
            ForecastError::InsufficientData { .. } => "InsufficientDataError",
            ForecastError::InvalidSplit(_) => "InvalidSplitError",
            ForecastError::UnknownModel(_) => "UnknownModelError",
            ForecastError::NotFitted(_) => "NotFittedError",
            ForecastError::InvalidParameter(_) => "InvalidParameterError",
            ForecastError::Validation(_) => "ValidationError",
            ForecastError::Math(_) => "MathError",
            ForecastError::Io(_) => "IoError",
            ForecastError::Serialization(_) => "SerializationError",
        }
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::DataSource(err.to_string())
    }
}

impl From<std::io::Error> for ForecastError {
    fn from(err: std::io::Error) -> Self {
        ForecastError::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::Serialization(Arc::new(err))
    }
}

impl From<csv::Error> for ForecastError {
    fn from(err: csv::Error) -> Self {
        ForecastError::Io(Arc::new(err.into()))
    }
}
