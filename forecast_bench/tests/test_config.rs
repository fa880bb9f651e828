use forecast_bench::config::{ExperimentConfig, TrainingConfig};
use forecast_bench::error::ForecastError;
use forecast_bench::models::ModelKind;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::io::Write;
use stdnn_math::NormMethod;
use tempfile::NamedTempFile;

#[test]
fn test_builder_defaults() {
    let config = ExperimentConfig::builder("gwn", 40, 10).build().unwrap();

    assert_eq!(config.model(), ModelKind::Gwn);
    assert_eq!(config.window_size(), 40);
    assert_eq!(config.horizon(), 10);
    assert_eq!(config.stride(), 1);
    assert_eq!(config.eval_fraction(), 0.2);
    assert_eq!(config.dataset(), "JSE_clean_truncated");
    assert!(!config.baseline());
    assert_eq!(config.baselines(), &ModelKind::BASELINES);
    assert_eq!(config.training(), &TrainingConfig::default());
    assert_eq!(config.training().norm_method, NormMethod::ZScore);
    assert!(config.gwn().gcn);
    assert!(!config.metrics().mape);
}

#[test]
fn test_unknown_model_fails_at_build() {
    let err = ExperimentConfig::builder("unknown_xyz", 40, 10)
        .build()
        .unwrap_err();
    assert!(matches!(err, ForecastError::UnknownModel(ref name) if name == "unknown_xyz"));
    assert_eq!(err.kind(), "UnknownModelError");
}

#[test]
fn test_baseline_only_implies_baseline() {
    let config = ExperimentConfig::builder("GWN", 10, 2)
        .baseline_only(true)
        .build()
        .unwrap();
    assert!(config.baseline());
    assert!(config.baseline_only());
}

#[test]
fn test_custom_baselines() {
    let config = ExperimentConfig::builder("GWN", 10, 2)
        .baseline(true)
        .baselines(["naive"])
        .build()
        .unwrap();
    assert_eq!(config.baselines(), &[ModelKind::Persistence]);

    let err = ExperimentConfig::builder("GWN", 10, 2)
        .baselines(["GWN"])
        .build()
        .unwrap_err();
    assert!(matches!(err, ForecastError::InvalidParameter(_)));

    let err = ExperimentConfig::builder("GWN", 10, 2)
        .baselines(["persistence", "nope"])
        .build()
        .unwrap_err();
    assert!(matches!(err, ForecastError::UnknownModel(_)));
}

#[rstest]
#[case(ExperimentConfig::builder("GWN", 0, 10))]
#[case(ExperimentConfig::builder("GWN", 40, 0))]
#[case(ExperimentConfig::builder("GWN", 40, 10).stride(0))]
#[case(ExperimentConfig::builder("GWN", 40, 10).eval_fraction(1.0))]
#[case(ExperimentConfig::builder("GWN", 40, 10).gap_tolerance(0.5))]
#[case(ExperimentConfig::builder("GWN", 40, 10).baseline_only(true).baselines(Vec::<String>::new()))]
#[case(ExperimentConfig::builder("GWN", 40, 10).training(TrainingConfig { epochs: 0, ..TrainingConfig::default() }))]
#[case(ExperimentConfig::builder("GWN", 40, 10).training(TrainingConfig { learning_rate: -1.0, ..TrainingConfig::default() }))]
#[case(ExperimentConfig::builder("GWN", 40, 10).training(TrainingConfig { decay_rate: 0.0, ..TrainingConfig::default() }))]
fn test_invalid_parameters(#[case] builder: forecast_bench::config::ExperimentConfigBuilder) {
    let err = builder.build().unwrap_err();
    assert_eq!(err.kind(), "InvalidParameterError");
}

#[test]
fn test_from_json_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "model": "persistence",
            "window_size": 12,
            "horizon": 3,
            "baseline": true,
            "training": {{ "epochs": 7, "norm_method": "min_max" }}
        }}"#
    )
    .unwrap();
    file.flush().unwrap();

    let config = ExperimentConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.model(), ModelKind::Persistence);
    assert_eq!(config.window_size(), 12);
    assert_eq!(config.horizon(), 3);
    assert!(config.baseline());
    assert_eq!(config.training().epochs, 7);
    assert_eq!(config.training().norm_method, NormMethod::MinMax);
    assert_eq!(config.training().batch_size, 32);
}

fn json_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_json_model_names_are_case_insensitive() {
    let file = json_file(
        r#"{"model": "gwn", "window_size": 12, "horizon": 3, "baselines": ["Persistence", "mean"]}"#,
    );
    let config = ExperimentConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.model(), ModelKind::Gwn);
    assert_eq!(
        config.baselines(),
        &[ModelKind::Persistence, ModelKind::MovingAverage]
    );
}

#[rstest]
#[case(r#"{"model": "unknown_xyz", "window_size": 40, "horizon": 10}"#, "unknown_xyz")]
#[case(r#"{"model": "GWN", "window_size": 40, "horizon": 10, "baselines": ["arima"]}"#, "arima")]
fn test_json_unknown_model(#[case] contents: &str, #[case] bad_name: &str) {
    let file = json_file(contents);
    let err = ExperimentConfig::from_json_file(file.path()).unwrap_err();
    assert_eq!(err.kind(), "UnknownModelError");
    assert!(matches!(err, ForecastError::UnknownModel(ref name) if name == bad_name));
}

#[test]
fn test_config_json_round_trip() {
    let config = ExperimentConfig::builder("GWN", 40, 10)
        .dataset("traffic")
        .baseline(true)
        .build()
        .unwrap();
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"model\":\"GWN\""));

    let parsed: ExperimentConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_error_kinds() {
    let cases: Vec<(ForecastError, &str)> = vec![
        (ForecastError::DataSource("x".into()), "DataSourceError"),
        (
            ForecastError::InsufficientData {
                required: 50,
                available: 45,
            },
            "InsufficientDataError",
        ),
        (ForecastError::InvalidSplit("x".into()), "InvalidSplitError"),
        (ForecastError::NotFitted("GWN".into()), "NotFittedError"),
        (ForecastError::Validation("x".into()), "ValidationError"),
    ];
    for (err, kind) in cases {
        assert_eq!(err.kind(), kind);
    }

    let err = ForecastError::InsufficientData {
        required: 50,
        available: 45,
    };
    assert_eq!(
        err.to_string(),
        "Insufficient data: need at least 50 observations, have 45"
    );
}
