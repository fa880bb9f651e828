//! Forecasting benchmark CLI
//!
//! Runs one experiment: load a dataset, build window pairs, fit the chosen
//! model (and baselines), evaluate and write the report.

use clap::{ArgAction, Parser};
use forecast_bench::config::{ExperimentConfig, GwnConfig, MetricsConfig, TrainingConfig};
use forecast_bench::data::{resolve_dataset_path, CsvSource};
use forecast_bench::experiment::Experiment;
use forecast_bench::report::output_dir_for;
use forecast_bench::{ForecastError, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use stdnn_math::NormMethod;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Accepts yes/true/t/y/1 and no/false/f/n/0 in any case
fn parse_bool(value: &str) -> std::result::Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" | "t" | "y" | "1" => Ok(true),
        "no" | "false" | "f" | "n" | "0" => Ok(false),
        other => Err(format!("boolean value expected, got '{}'", other)),
    }
}

#[derive(Parser, Debug)]
#[command(name = "stdnn-main")]
#[command(about = "Benchmark a spatio-temporal forecasting model against baselines", long_about = None)]
struct Args {
    /// Model to benchmark (GWN, persistence, moving_average)
    #[arg(long)]
    model: String,

    /// Number of past observations fed to the model
    #[arg(long = "window_size")]
    window_size: usize,

    /// Number of future steps to predict
    #[arg(long)]
    horizon: usize,

    /// Also evaluate the baselines
    #[arg(long, action = ArgAction::Set, value_parser = parse_bool, default_value = "false")]
    baseline: bool,

    /// Evaluate only the baselines
    #[arg(long = "baseline_only", action = ArgAction::Set, value_parser = parse_bool, default_value = "false")]
    baseline_only: bool,

    /// Comma-separated baseline names
    #[arg(long, value_delimiter = ',', default_value = "persistence,moving_average")]
    baselines: Vec<String>,

    /// Dataset name (resolved to <data_dir>/<name>.csv) or path to a CSV file
    #[arg(long, default_value = "JSE_clean_truncated")]
    dataset: String,

    #[arg(long = "data_dir", default_value = "data")]
    data_dir: PathBuf,

    #[arg(long, default_value_t = 1)]
    stride: usize,

    /// Training share of the train:valid:test ratio
    #[arg(long = "train_length", default_value_t = 6.0)]
    train_length: f64,

    /// Evaluation share of the train:valid:test ratio
    #[arg(long = "test_length", default_value_t = 2.0)]
    test_length: f64,

    /// Largest allowed gap between observations, in sampling intervals
    #[arg(long = "gap_tolerance", default_value_t = forecast_bench::data::DEFAULT_GAP_TOLERANCE)]
    gap_tolerance: f64,

    #[arg(long, default_value_t = 50)]
    epoch: usize,

    #[arg(long, default_value_t = 1e-4)]
    lr: f64,

    #[arg(long = "batch_size", default_value_t = 32)]
    batch_size: usize,

    /// z_score, min_max or none
    #[arg(long = "norm_method", default_value = "z_score")]
    norm_method: NormMethod,

    #[arg(long = "early_stop", action = ArgAction::Set, value_parser = parse_bool, default_value = "false")]
    early_stop: bool,

    /// Early-stopping share of the train:valid:test ratio
    #[arg(long = "valid_length", default_value_t = 2.0)]
    valid_length: f64,

    #[arg(long, default_value_t = 5)]
    patience: usize,

    #[arg(long = "validate_freq", default_value_t = 1)]
    validate_freq: usize,

    #[arg(long = "exponential_decay_step", default_value_t = 5)]
    exponential_decay_step: usize,

    #[arg(long = "decay_rate", default_value_t = 0.5)]
    decay_rate: f64,

    #[arg(long = "weight_decay", default_value_t = 1e-4)]
    weight_decay: f64,

    /// Relative loss change below which fitting counts as converged
    #[arg(long, default_value_t = 1e-6)]
    tolerance: f64,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Include the graph mixing term
    #[arg(long = "gcn_bool", action = ArgAction::Set, value_parser = parse_bool, default_value = "true")]
    gcn_bool: bool,

    /// Learn the adjacency matrix
    #[arg(long = "adapt_adj", action = ArgAction::Set, value_parser = parse_bool, default_value = "true")]
    adapt_adj: bool,

    /// Report the mean absolute percentage error
    #[arg(long, action = ArgAction::Set, value_parser = parse_bool, default_value = "false")]
    mape: bool,

    #[arg(long = "output_dir", default_value = "output")]
    output_dir: PathBuf,

    /// Write report files under the output directory
    #[arg(long, action = ArgAction::Set, value_parser = parse_bool, default_value = "true")]
    save: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long = "log_level", default_value = "info")]
    log_level: String,
}

/// Fractions derived from a train:valid:test ratio
#[derive(Debug, Clone, Copy, PartialEq)]
struct SplitFractions {
    /// Share of all window pairs held out for evaluation
    eval: f64,
    /// Share of the remaining pairs held out for early stopping
    valid: f64,
}

impl SplitFractions {
    fn from_lengths(train: f64, valid: f64, test: f64) -> Result<Self> {
        for (name, length) in [("train_length", train), ("valid_length", valid), ("test_length", test)] {
            if !(length > 0.0 && length.is_finite()) {
                return Err(ForecastError::InvalidParameter(format!(
                    "{} must be a positive ratio, got {}",
                    name, length
                )));
            }
        }
        Ok(Self {
            eval: test / (train + valid + test),
            valid: valid / (train + valid),
        })
    }
}

impl Args {
    fn to_config(&self) -> Result<ExperimentConfig> {
        let fractions = SplitFractions::from_lengths(self.train_length, self.valid_length, self.test_length)?;
        let training = TrainingConfig {
            epochs: self.epoch,
            learning_rate: self.lr,
            batch_size: self.batch_size,
            norm_method: self.norm_method,
            early_stop: self.early_stop,
            valid_fraction: fractions.valid,
            patience: self.patience,
            validate_freq: self.validate_freq,
            exponential_decay_step: self.exponential_decay_step,
            decay_rate: self.decay_rate,
            weight_decay: self.weight_decay,
            tolerance: self.tolerance,
            seed: self.seed,
        };

        ExperimentConfig::builder(self.model.as_str(), self.window_size, self.horizon)
            .dataset(self.dataset.as_str())
            .stride(self.stride)
            .eval_fraction(fractions.eval)
            .gap_tolerance(self.gap_tolerance)
            .baseline(self.baseline)
            .baseline_only(self.baseline_only)
            .baselines(self.baselines.iter().map(|s| s.trim().to_string()))
            .training(training)
            .gwn(GwnConfig {
                gcn: self.gcn_bool,
                adaptive_adjacency: self.adapt_adj,
            })
            .metrics(MetricsConfig { mape: self.mape })
            .build()
    }
}

fn run(args: &Args) -> Result<()> {
    let config = args.to_config()?;
    let path = resolve_dataset_path(&args.dataset, &args.data_dir);
    let source = CsvSource::new(path).with_gap_tolerance(config.gap_tolerance());

    let mut experiment = Experiment::new(config, source);
    let report = experiment.run()?;
    println!("{}", report);

    let non_converged = report.non_converged();
    if !non_converged.is_empty() {
        println!("Warning: did not converge: {}", non_converged.join(", "));
    }

    if args.save {
        let dir = output_dir_for(&args.output_dir, &report.config);
        report.save(&dir)?;
        info!(path = %dir.display(), "results written");
    }
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn report_error(err: &ForecastError) {
    eprintln!("error[{}]: {}", err.kind(), err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_default_ratio() {
        let fractions = SplitFractions::from_lengths(6.0, 2.0, 2.0).unwrap();
        assert_approx_eq!(fractions.eval, 0.2);
        assert_approx_eq!(fractions.valid, 0.25);
    }

    #[test]
    fn test_ratio_scale_does_not_matter() {
        let a = SplitFractions::from_lengths(0.7, 0.1, 0.2).unwrap();
        let b = SplitFractions::from_lengths(7.0, 1.0, 2.0).unwrap();
        assert_approx_eq!(a.eval, b.eval);
        assert_approx_eq!(a.valid, b.valid);
    }

    #[test]
    fn test_non_positive_length_is_rejected() {
        let err = SplitFractions::from_lengths(6.0, 0.0, 2.0).unwrap_err();
        assert_eq!(err.kind(), "InvalidParameterError");
        assert!(err.to_string().contains("valid_length"));
    }
}
