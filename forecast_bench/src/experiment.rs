//! Experiment orchestration
//!
//! An [`Experiment`] is a small state machine:
//!
//! ```text
//! Configured -> DataLoaded -> WindowsBuilt -> ModelFit -> Evaluated -> Reported
//!      \____________\_____________\______________\___________\------> Failed(stage)
//! ```
//!
//! [`Experiment::step`] performs exactly one transition and stores its output
//! only when the transition succeeds, so a run can be inspected or abandoned
//! between stages. [`Experiment::run`] drives it to a terminal state. A failed
//! transition keeps its error, available from [`Experiment::error`].

use crate::config::ExperimentConfig;
use crate::data::{Series, SeriesSource};
use crate::error::{ForecastError, Result};
use crate::evaluation::Evaluator;
use crate::metrics::MetricReport;
use crate::models::{EpochProgress, FitReport, ForecastModel, ModelKind, ModelRegistry};
use crate::report::{ModelRole, ModelSummary, PairCounts, RunReport};
use crate::window::{split, DatasetSplit, Windower};
use std::fmt;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Transition that can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadData,
    BuildWindows,
    FitModels,
    Evaluate,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::LoadData => "load data",
            Stage::BuildWindows => "build windows",
            Stage::FitModels => "fit models",
            Stage::Evaluate => "evaluate",
            Stage::Report => "report",
        };
        f.write_str(name)
    }
}

/// Lifecycle of an experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Configured,
    DataLoaded,
    WindowsBuilt,
    ModelFit,
    Evaluated,
    Reported,
    Failed(Stage),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Reported | RunState::Failed(_))
    }
}

/// A model instance together with how its fit went
#[derive(Debug)]
pub struct FittedModel {
    pub model: Box<dyn ForecastModel>,
    pub fit: FitReport,
    pub role: ModelRole,
    pub fit_seconds: f64,
}

/// One benchmark run over one dataset
#[derive(Debug)]
pub struct Experiment {
    config: ExperimentConfig,
    source: Box<dyn SeriesSource>,
    state: RunState,
    series: Option<Series>,
    total_pairs: usize,
    split: Option<DatasetSplit>,
    models: Vec<FittedModel>,
    metrics: Option<MetricReport>,
    report: Option<RunReport>,
    failure: Option<ForecastError>,
}

impl Experiment {
    pub fn new(config: ExperimentConfig, source: impl SeriesSource + 'static) -> Self {
        Self {
            config,
            source: Box::new(source),
            state: RunState::Configured,
            series: None,
            total_pairs: 0,
            split: None,
            models: Vec::new(),
            metrics: None,
            report: None,
            failure: None,
        }
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn series(&self) -> Option<&Series> {
        self.series.as_ref()
    }

    pub fn split(&self) -> Option<&DatasetSplit> {
        self.split.as_ref()
    }

    /// Fitted models, primary first
    pub fn models(&self) -> &[FittedModel] {
        &self.models
    }

    pub fn metric_report(&self) -> Option<&MetricReport> {
        self.metrics.as_ref()
    }

    pub fn report(&self) -> Option<&RunReport> {
        self.report.as_ref()
    }

    /// Error that moved the experiment to [`RunState::Failed`]
    pub fn error(&self) -> Option<&ForecastError> {
        self.failure.as_ref()
    }

    /// Perform the next transition and return the new state
    ///
    /// Terminal states are returned as they are.
    pub fn step(&mut self) -> Result<RunState> {
        let (stage, outcome) = match self.state {
            RunState::Reported | RunState::Failed(_) => return Ok(self.state),
            RunState::Configured => (Stage::LoadData, self.load_data()),
            RunState::DataLoaded => (Stage::BuildWindows, self.build_windows()),
            RunState::WindowsBuilt => (Stage::FitModels, self.fit_models()),
            RunState::ModelFit => (Stage::Evaluate, self.evaluate()),
            RunState::Evaluated => (Stage::Report, self.build_report()),
        };

        match outcome {
            Ok(next) => {
                info!(stage = %stage, state = ?next, "transition complete");
                self.state = next;
                Ok(next)
            }
            Err(err) => {
                error!(stage = %stage, kind = err.kind(), error = %err, "experiment failed");
                self.state = RunState::Failed(stage);
                self.failure = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Drive the experiment to completion
    ///
    /// An experiment that already failed returns its original error.
    pub fn run(&mut self) -> Result<RunReport> {
        while !self.state.is_terminal() {
            self.step()?;
        }

        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        match (&self.state, &self.report) {
            (RunState::Reported, Some(report)) => Ok(report.clone()),
            (state, _) => Err(ForecastError::Validation(format!(
                "Experiment ended in state {:?} without a report",
                state
            ))),
        }
    }

    fn load_data(&mut self) -> Result<RunState> {
        info!(source = %self.source.describe(), "loading series");
        let series = self.source.load()?;
        info!(
            observations = series.len(),
            nodes = series.num_nodes(),
            "series loaded"
        );
        self.series = Some(series);
        Ok(RunState::DataLoaded)
    }

    fn build_windows(&mut self) -> Result<RunState> {
        let series = self.series.as_ref().ok_or_else(|| missing("series"))?;
        let windower = Windower::new(
            self.config.window_size(),
            self.config.horizon(),
            self.config.stride(),
        )?;
        let pairs = windower.build(series)?;
        let dataset_split = split(&pairs, self.config.eval_fraction())?;

        if dataset_split.purged() > 0 {
            warn!(
                purged = dataset_split.purged(),
                "dropped training pairs whose targets overlap the evaluation period"
            );
        }
        info!(
            pairs = pairs.len(),
            train = dataset_split.train().len(),
            eval = dataset_split.eval().len(),
            "windows built"
        );

        self.total_pairs = pairs.len();
        self.split = Some(dataset_split);
        Ok(RunState::WindowsBuilt)
    }

    fn kinds_to_fit(&self) -> Vec<(ModelKind, ModelRole)> {
        let primary = self.config.model();
        let mut kinds = Vec::new();
        if !self.config.baseline_only() {
            kinds.push((primary, ModelRole::Primary));
        }
        if self.config.baseline() {
            for &kind in self.config.baselines() {
                let seen = kinds.iter().any(|(k, _)| *k == kind);
                if seen {
                    debug!(model = %kind, "baseline already scheduled");
                    continue;
                }
                kinds.push((kind, ModelRole::Baseline));
            }
        }
        kinds
    }

    fn fit_models(&mut self) -> Result<RunState> {
        let dataset_split = self.split.as_ref().ok_or_else(|| missing("split"))?;
        let training = self.config.training();

        let mut fitted = Vec::new();
        for (kind, role) in self.kinds_to_fit() {
            let mut model = ModelRegistry::create(kind, &self.config)?;
            let started = Instant::now();
            let fit = model.fit_with_progress(dataset_split.train(), training, &mut |p: &EpochProgress| {
                debug!(
                    epoch = p.epoch,
                    total = p.total_epochs,
                    train_loss = p.train_loss,
                    validation_loss = ?p.validation_loss,
                    "epoch"
                );
            })?;
            let fit_seconds = started.elapsed().as_secs_f64();

            if !fit.converged {
                warn!(model = model.name(), epochs = fit.epochs, "model did not converge");
            }
            info!(model = model.name(), role = %role, fit_seconds, "model fitted");

            fitted.push(FittedModel {
                model,
                fit,
                role,
                fit_seconds,
            });
        }

        self.models = fitted;
        Ok(RunState::ModelFit)
    }

    fn evaluate(&mut self) -> Result<RunState> {
        let dataset_split = self.split.as_ref().ok_or_else(|| missing("split"))?;
        let evaluator = Evaluator::new(self.config.metrics().clone());
        let models: Vec<&dyn ForecastModel> = self.models.iter().map(|m| m.model.as_ref()).collect();

        let report = evaluator.evaluate_all(&models, dataset_split.eval())?;
        self.metrics = Some(report);
        Ok(RunState::Evaluated)
    }

    fn build_report(&mut self) -> Result<RunState> {
        let series = self.series.as_ref().ok_or_else(|| missing("series"))?;
        let dataset_split = self.split.as_ref().ok_or_else(|| missing("split"))?;
        let metrics = self.metrics.clone().ok_or_else(|| missing("metrics"))?;

        let report = RunReport {
            config: self.config.clone(),
            dataset: self.source.describe(),
            series_len: series.len(),
            num_nodes: series.num_nodes(),
            pairs: PairCounts {
                total: self.total_pairs,
                train: dataset_split.train().len(),
                eval: dataset_split.eval().len(),
                purged: dataset_split.purged(),
            },
            models: self
                .models
                .iter()
                .map(|m| ModelSummary {
                    name: m.model.name().to_string(),
                    role: m.role,
                    fit: m.fit.clone(),
                    fit_seconds: m.fit_seconds,
                })
                .collect(),
            metrics,
        };

        self.report = Some(report);
        Ok(RunState::Reported)
    }
}

fn missing(what: &str) -> ForecastError {
    ForecastError::Validation(format!("Experiment has no {} yet", what))
}
