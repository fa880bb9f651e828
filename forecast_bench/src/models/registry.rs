//! Name-based model lookup

use crate::config::ExperimentConfig;
use crate::error::{ForecastError, Result};
use crate::models::{ForecastModel, GraphWaveNet, MovingAverage, Persistence};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every model variant the harness can run
///
/// Serialized as its report name and parsed back through [`FromStr`], so JSON
/// accepts the same spellings as the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModelKind {
    Gwn,
    Persistence,
    MovingAverage,
}

impl ModelKind {
    /// Default baseline set
    pub const BASELINES: [ModelKind; 2] = [ModelKind::Persistence, ModelKind::MovingAverage];

    /// Every registered variant
    pub const ALL: [ModelKind; 3] = [
        ModelKind::Gwn,
        ModelKind::Persistence,
        ModelKind::MovingAverage,
    ];

    /// Name used in reports and on the command line
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Gwn => GraphWaveNet::NAME,
            ModelKind::Persistence => Persistence::NAME,
            ModelKind::MovingAverage => MovingAverage::NAME,
        }
    }

    pub fn is_baseline(&self) -> bool {
        !matches!(self, ModelKind::Gwn)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gwn" => Ok(ModelKind::Gwn),
            "persistence" | "naive" => Ok(ModelKind::Persistence),
            "moving_average" | "mean" => Ok(ModelKind::MovingAverage),
            _ => Err(ForecastError::UnknownModel(s.to_string())),
        }
    }
}

impl TryFrom<String> for ModelKind {
    type Error = ForecastError;

    fn try_from(name: String) -> Result<Self> {
        name.parse()
    }
}

impl From<ModelKind> for String {
    fn from(kind: ModelKind) -> Self {
        kind.name().to_string()
    }
}

/// Builds fresh model instances from a [`ModelKind`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelRegistry;

impl ModelRegistry {
    /// Create an unfitted instance of `kind` configured for `config`
    pub fn create(kind: ModelKind, config: &ExperimentConfig) -> Result<Box<dyn ForecastModel>> {
        let horizon = config.horizon();
        Ok(match kind {
            ModelKind::Gwn => Box::new(GraphWaveNet::new(horizon, config.gwn())?),
            ModelKind::Persistence => Box::new(Persistence::new(horizon)?),
            ModelKind::MovingAverage => Box::new(MovingAverage::new(horizon)?),
        })
    }

    /// Look `name` up and create it
    pub fn create_by_name(name: &str, config: &ExperimentConfig) -> Result<Box<dyn ForecastModel>> {
        Self::create(name.parse()?, config)
    }

    /// Names of every registered model
    pub fn available() -> Vec<&'static str> {
        ModelKind::ALL.iter().map(ModelKind::name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("GWN".parse::<ModelKind>().unwrap(), ModelKind::Gwn);
        assert_eq!("gwn".parse::<ModelKind>().unwrap(), ModelKind::Gwn);
        assert_eq!(
            " Moving_Average ".parse::<ModelKind>().unwrap(),
            ModelKind::MovingAverage
        );
        assert_eq!("naive".parse::<ModelKind>().unwrap(), ModelKind::Persistence);
    }

    #[test]
    fn test_unknown_name() {
        let err = "unknown_xyz".parse::<ModelKind>().unwrap_err();
        assert!(matches!(err, ForecastError::UnknownModel(ref name) if name == "unknown_xyz"));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for kind in ModelKind::ALL {
            assert_eq!(kind.to_string().parse::<ModelKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_serde_uses_registry_names() {
        assert_eq!(serde_json::to_string(&ModelKind::Gwn).unwrap(), "\"GWN\"");
        let kind: ModelKind = serde_json::from_str("\"Moving_Average\"").unwrap();
        assert_eq!(kind, ModelKind::MovingAverage);
        assert!(serde_json::from_str::<ModelKind>("\"unknown_xyz\"").is_err());
    }

    #[test]
    fn test_baselines_are_baselines() {
        assert!(ModelKind::BASELINES.iter().all(ModelKind::is_baseline));
        assert!(!ModelKind::Gwn.is_baseline());
    }
}
