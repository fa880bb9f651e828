use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

fn write_dataset(dir: &Path, rows: usize) -> PathBuf {
    let path = dir.join("series.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "a,b").unwrap();
    for t in 0..rows {
        let x = t as f64;
        writeln!(file, "{},{}", (x * 0.2).sin() * 5.0 + 20.0, x * 0.1 + 3.0).unwrap();
    }
    path
}

fn bench() -> Command {
    Command::cargo_bin("stdnn-main").unwrap()
}

fn workspace() -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let dataset = write_dataset(dir.path(), 300);
    (dir, dataset)
}

#[test]
fn test_baseline_run_succeeds() {
    let (dir, dataset) = workspace();
    let output = dir.path().join("out");

    bench()
        .args(["--model", "persistence", "--window_size", "20", "--horizon", "5"])
        .args(["--baseline", "True"])
        .arg("--dataset")
        .arg(&dataset)
        .arg("--output_dir")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Experiment Report"))
        .stdout(predicate::str::contains("moving_average"));

    let report_dir = output.join("persistence").join("series").join("20").join("5");
    assert!(report_dir.join("report.json").is_file());
    assert!(report_dir.join("metrics.csv").is_file());
}

#[test]
fn test_split_ratio_flags() {
    let (dir, dataset) = workspace();
    let output = dir.path().join("out");

    // 300 rows, window 20, horizon 5: 276 pairs, a 7:1:2 ratio holds out 55.
    bench()
        .args(["--model", "persistence", "--window_size", "20", "--horizon", "5"])
        .args(["--train_length", "7", "--valid_length", "1", "--test_length", "2"])
        .arg("--dataset")
        .arg(&dataset)
        .arg("--output_dir")
        .arg(&output)
        .assert()
        .success();

    let json = std::fs::read_to_string(
        output.join("persistence/series/20/5/report.json"),
    )
    .unwrap();
    let report: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(report["pairs"]["eval"], 55);

    bench()
        .args(["--model", "persistence", "--window_size", "20", "--horizon", "5"])
        .args(["--test_length", "0", "--save", "no"])
        .arg("--dataset")
        .arg(&dataset)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[InvalidParameterError]"));
}

#[test]
fn test_gwn_run_succeeds() {
    let (dir, dataset) = workspace();

    bench()
        .args(["--model", "GWN", "--window_size", "20", "--horizon", "5"])
        .args(["--epoch", "2", "--lr", "0.001", "--save", "no"])
        .arg("--dataset")
        .arg(&dataset)
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("GWN (primary)"));

    assert!(!dir.path().join("output").exists());
}

#[test]
fn test_unknown_model_fails() {
    let (dir, dataset) = workspace();
    let output = dir.path().join("out");

    bench()
        .args(["--model", "unknown_xyz", "--window_size", "40", "--horizon", "10"])
        .arg("--dataset")
        .arg(&dataset)
        .arg("--output_dir")
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[UnknownModelError]"));

    assert!(!output.exists());
}

#[test]
fn test_short_series_fails() {
    let dir = tempdir().unwrap();
    let dataset = write_dataset(dir.path(), 45);

    bench()
        .args(["--model", "persistence", "--window_size", "40", "--horizon", "10"])
        .args(["--save", "false"])
        .arg("--dataset")
        .arg(&dataset)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[InsufficientDataError]"));
}

#[test]
fn test_missing_dataset_fails() {
    let dir = tempdir().unwrap();

    bench()
        .args(["--model", "persistence", "--window_size", "4", "--horizon", "1"])
        .args(["--dataset", "missing", "--data_dir"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[DataSourceError]"));
}

#[test]
fn test_required_flags() {
    bench()
        .args(["--model", "GWN", "--window_size", "40"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--horizon"));
}

#[test]
fn test_bad_boolean_is_rejected() {
    bench()
        .args(["--model", "GWN", "--window_size", "40", "--horizon", "10"])
        .args(["--baseline", "maybe"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("boolean value expected"));
}
