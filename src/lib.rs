//! # stdnn
//!
//! Benchmarking harness for spatio-temporal forecasting models.
//!
//! This umbrella crate re-exports the workspace members:
//!
//! - [`bench`] (`forecast_bench`): data loading, windowing, models, evaluation
//!   and the experiment state machine
//! - [`math`] (`stdnn_math`): statistics, normalisation, softmax and RMSProp
//!
//! ## Example
//!
//! ```
//! use stdnn::bench::{Experiment, ExperimentConfig, InMemorySource, Series};
//!
//! let series = Series::from_values((0..120).map(|v| v as f64).collect()).unwrap();
//! let config = ExperimentConfig::builder("persistence", 10, 2).build().unwrap();
//!
//! let report = Experiment::new(config, InMemorySource::new("ramp", series))
//!     .run()
//!     .unwrap();
//! assert_eq!(report.metrics.model_names(), vec!["persistence"]);
//! ```

pub use forecast_bench as bench;
pub use stdnn_math as math;

pub use forecast_bench::{
    Experiment, ExperimentConfig, ForecastError, ForecastModel, MetricReport, ModelKind, RunReport,
};

/// Version of the umbrella crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
