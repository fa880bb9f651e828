//! # Forecast Bench
//!
//! A benchmarking harness for multi-step time series forecasting models.
//!
//! ## Features
//!
//! - Series loading from CSV with timestamp validation
//! - Sliding (window, horizon) pairs with a leakage-free chronological split
//! - A graph-based spatio-temporal model (GWN) and naive baselines behind one trait
//! - Per-horizon-step MAE, RMSE and optional MAPE
//! - A step-by-step experiment state machine producing a text and JSON report
//!
//! ## Quick Start
//!
//! ```no_run
//! use forecast_bench::config::ExperimentConfig;
//! use forecast_bench::data::CsvSource;
//! use forecast_bench::experiment::Experiment;
//!
//! let config = ExperimentConfig::builder("GWN", 40, 10)
//!     .dataset("JSE_clean_truncated")
//!     .baseline(true)
//!     .build()?;
//!
//! let mut experiment = Experiment::new(config, CsvSource::new("data/JSE_clean_truncated.csv"));
//! let report = experiment.run()?;
//! println!("{}", report);
//! # Ok::<(), forecast_bench::ForecastError>(())
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod experiment;
pub mod metrics;
pub mod models;
pub mod report;
pub mod window;

// Re-export commonly used types
pub use crate::config::{ExperimentConfig, GwnConfig, MetricsConfig, TrainingConfig};
pub use crate::data::{CsvSource, DataLoader, InMemorySource, Series, SeriesSource};
pub use crate::error::{ForecastError, Result};
pub use crate::evaluation::Evaluator;
pub use crate::experiment::{Experiment, RunState, Stage};
pub use crate::metrics::{Metric, MetricReport, MetricValue, StepKey};
pub use crate::models::{FitReport, ForecastModel, ModelKind, ModelRegistry};
pub use crate::report::RunReport;
pub use crate::window::{DatasetSplit, WindowPair, Windower};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
