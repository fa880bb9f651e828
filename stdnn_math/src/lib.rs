//! # stdnn Math
//!
//! Numeric building blocks shared by the forecasting harness.
//! This crate provides descriptive statistics, per-column normalisation,
//! a numerically stable softmax and the RMSProp optimiser used when
//! fitting iterative models.

use thiserror::Error;

pub mod activation;
pub mod normalization;
pub mod optim;
pub mod stats;

pub use normalization::{NormMethod, Normalizer};
pub use optim::RmsProp;

/// Errors that can occur in numeric calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numeric operations
pub type Result<T> = std::result::Result<T, MathError>;
