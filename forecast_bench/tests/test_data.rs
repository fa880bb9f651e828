use chrono::{Duration, TimeZone, Utc};
use forecast_bench::data::{resolve_dataset_path, CsvSource, DataLoader, Series, SeriesSource};
use forecast_bench::error::ForecastError;
use ndarray::Array2;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

fn csv_file(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file.flush().unwrap();
    file
}

#[test]
fn test_data_loader_from_csv() {
    let file = csv_file(&[
        "date,node_a,node_b",
        "2023-01-01,100.0,5.0",
        "2023-01-02,103.0,6.0",
        "2023-01-03,106.0,7.0",
        "2023-01-04,108.0,8.0",
    ]);

    let series = DataLoader::from_csv(file.path()).unwrap();
    assert_eq!(series.len(), 4);
    assert_eq!(series.num_nodes(), 2);
    assert_eq!(series.node_names(), ["node_a", "node_b"]);
    assert_eq!(series.values()[[3, 0]], 108.0);
    assert_eq!(series.interval(), Duration::days(1));
    assert_eq!(
        series.timestamps()[0],
        Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
    );
}

#[test]
fn test_csv_without_time_column() {
    let file = csv_file(&["a,b,c", "1,2,3", "4,5,6", "7,8,9"]);

    let series = DataLoader::from_csv(file.path()).unwrap();
    assert_eq!(series.len(), 3);
    assert_eq!(series.num_nodes(), 3);
    assert_eq!(series.rows(1, 2)[[0, 2]], 6.0);
}

#[test]
fn test_csv_source_describes_path() {
    let file = csv_file(&["value", "1.0", "2.0"]);
    let source = CsvSource::new(file.path());

    assert_eq!(source.describe(), file.path().display().to_string());
    assert_eq!(source.load().unwrap().len(), 2);
}

#[test]
fn test_missing_file_is_data_source_error() {
    let err = DataLoader::from_csv("no/such/file.csv").unwrap_err();
    assert!(matches!(err, ForecastError::DataSource(_)));
}

#[test]
fn test_non_increasing_timestamps_are_rejected() {
    let file = csv_file(&[
        "date,value",
        "2023-01-01,1.0",
        "2023-01-03,2.0",
        "2023-01-02,3.0",
    ]);

    let err = DataLoader::from_csv(file.path()).unwrap_err();
    assert_eq!(err.kind(), "DataSourceError");
    assert!(err.to_string().contains("strictly increasing"));
}

#[test]
fn test_large_gap_is_rejected() {
    let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    let mut timestamps: Vec<_> = (0..6).map(|i| start + Duration::days(i)).collect();
    timestamps.push(start + Duration::days(30));
    let values = Array2::from_shape_fn((7, 1), |(r, _)| r as f64);

    let err = Series::new(timestamps.clone(), values.clone(), vec!["v".to_string()]).unwrap_err();
    assert!(matches!(err, ForecastError::DataSource(_)));

    // A wide enough tolerance accepts the same data.
    let series = Series::with_gap_tolerance(timestamps, values, vec!["v".to_string()], 30.0).unwrap();
    assert_eq!(series.len(), 7);
}

#[test]
fn test_non_finite_values_are_rejected() {
    let err = Series::from_values(vec![1.0, f64::NAN, 3.0]).unwrap_err();
    assert!(matches!(err, ForecastError::DataSource(_)));
}

#[test]
fn test_from_rows_requires_equal_widths() {
    let err = Series::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
    assert!(matches!(err, ForecastError::DataSource(_)));

    let series = Series::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
    assert_eq!(series.node_names(), ["node_0", "node_1"]);
}

#[test]
fn test_resolve_dataset_path() {
    let data_dir = Path::new("data");
    assert_eq!(
        resolve_dataset_path("JSE_clean_truncated", data_dir),
        data_dir.join("JSE_clean_truncated.csv")
    );
    assert_eq!(
        resolve_dataset_path("elsewhere/series.csv", data_dir),
        Path::new("elsewhere/series.csv")
    );
}
