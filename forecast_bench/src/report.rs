//! Run report rendering and persistence

use crate::config::ExperimentConfig;
use crate::error::Result;
use crate::metrics::MetricReport;
use crate::models::FitReport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Whether a model is the one under test or a reference baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    Primary,
    Baseline,
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelRole::Primary => write!(f, "primary"),
            ModelRole::Baseline => write!(f, "baseline"),
        }
    }
}

/// Window pair bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairCounts {
    pub total: usize,
    pub train: usize,
    pub eval: usize,
    /// Training-side pairs discarded because their target overlapped evaluation
    pub purged: usize,
}

/// Fit summary of one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub name: String,
    pub role: ModelRole,
    pub fit: FitReport,
    pub fit_seconds: f64,
}

/// Terminal artefact of an experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub config: ExperimentConfig,
    /// Description of the series source
    pub dataset: String,
    pub series_len: usize,
    pub num_nodes: usize,
    pub pairs: PairCounts,
    pub models: Vec<ModelSummary>,
    pub metrics: MetricReport,
}

impl RunReport {
    /// Models whose fit ran out of epochs before converging
    pub fn non_converged(&self) -> Vec<&str> {
        self.models
            .iter()
            .filter(|m| !m.fit.converged)
            .map(|m| m.name.as_str())
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// One CSV row per model and horizon step, plus a `mean` row per model
    pub fn write_metrics_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(["model", "step", "mae", "rmse", "mape"])?;

        for metrics in self.metrics.models() {
            for s in &metrics.steps {
                let mape = s.mape.map(|m| m.to_string()).unwrap_or_default();
                csv.write_record([
                    metrics.model.clone(),
                    s.step.to_string(),
                    s.mae.to_string(),
                    s.rmse.to_string(),
                    mape,
                ])?;
            }
            let agg = &metrics.aggregate;
            let mape = agg.mape.map(|m| m.to_string()).unwrap_or_default();
            csv.write_record([
                metrics.model.clone(),
                "mean".to_string(),
                agg.mae.to_string(),
                agg.rmse.to_string(),
                mape,
            ])?;
        }

        csv.flush()?;
        Ok(())
    }

    /// Write `report.json`, `report.txt` and `metrics.csv` into `dir`
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        fs::write(dir.join("report.json"), self.to_json()?)?;
        fs::write(dir.join("report.txt"), self.to_string())?;
        self.write_metrics_csv(File::create(dir.join("metrics.csv"))?)?;

        info!(path = %dir.display(), "report saved");
        Ok(())
    }
}

/// `<base>/<model>/<dataset>/<window_size>/<horizon>`
pub fn output_dir_for<P: AsRef<Path>>(base: P, config: &ExperimentConfig) -> PathBuf {
    let dataset = Path::new(config.dataset())
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| config.dataset().to_string());

    base.as_ref()
        .join(config.model().name())
        .join(dataset)
        .join(config.window_size().to_string())
        .join(config.horizon().to_string())
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Experiment Report")?;
        writeln!(f, "=================")?;
        writeln!(f, "Dataset: {}", self.dataset)?;
        writeln!(
            f,
            "Series: {} observations, {} nodes",
            self.series_len, self.num_nodes
        )?;
        writeln!(
            f,
            "Window size: {}  Horizon: {}  Stride: {}",
            self.config.window_size(),
            self.config.horizon(),
            self.config.stride()
        )?;
        writeln!(
            f,
            "Pairs: {} total, {} train, {} eval, {} purged",
            self.pairs.total, self.pairs.train, self.pairs.eval, self.pairs.purged
        )?;
        writeln!(f)?;

        writeln!(f, "Models:")?;
        for m in &self.models {
            let status = if m.fit.converged { "converged" } else { "NOT converged" };
            write!(f, "  {} ({}): {}", m.name, m.role, status)?;
            if m.fit.epochs > 0 {
                write!(f, " after {} epochs", m.fit.epochs)?;
            }
            if let Some(loss) = m.fit.final_loss {
                write!(f, ", final loss {:.6}", loss)?;
            }
            if m.fit.early_stopped {
                write!(f, ", early stopped")?;
            }
            writeln!(f, " [{:.2}s]", m.fit_seconds)?;
        }
        writeln!(f)?;

        write!(f, "{}", self.metrics)
    }
}
