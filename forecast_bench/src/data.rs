//! Time series data handling for forecasting
//!
//! A [`Series`] is a validated, uniformly sampled matrix of observations
//! (rows are timestamps, columns are nodes). Series reach the harness
//! through a [`SeriesSource`], the collaborator the experiment asks for
//! data; [`CsvSource`] reads a CSV file through [`DataLoader`].

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use ndarray::{s, Array2, ArrayView2};
use polars::prelude::{CsvReader, DataFrame, DataType, SerReader, TimeUnit};
use statrs::statistics::{Data, Median};
use std::fmt::Debug;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default maximum gap between consecutive observations, in sampling intervals
pub const DEFAULT_GAP_TOLERANCE: f64 = 5.0;

/// Validated time series with one or more nodes
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    timestamps: Vec<DateTime<Utc>>,
    values: Array2<f64>,
    node_names: Vec<String>,
    interval: Duration,
}

impl Series {
    /// Create a series, validating it with the default gap tolerance
    pub fn new(
        timestamps: Vec<DateTime<Utc>>,
        values: Array2<f64>,
        node_names: Vec<String>,
    ) -> Result<Self> {
        Self::with_gap_tolerance(timestamps, values, node_names, DEFAULT_GAP_TOLERANCE)
    }

    /// Create a series whose largest allowed gap is `gap_tolerance` sampling intervals
    pub fn with_gap_tolerance(
        timestamps: Vec<DateTime<Utc>>,
        values: Array2<f64>,
        node_names: Vec<String>,
        gap_tolerance: f64,
    ) -> Result<Self> {
        if values.nrows() == 0 || values.ncols() == 0 {
            return Err(ForecastError::DataSource(
                "Series must contain at least one observation of one node".to_string(),
            ));
        }
        if timestamps.len() != values.nrows() {
            return Err(ForecastError::DataSource(format!(
                "Series has {} timestamps but {} rows of values",
                timestamps.len(),
                values.nrows()
            )));
        }
        if node_names.len() != values.ncols() {
            return Err(ForecastError::DataSource(format!(
                "Series has {} node names but {} value columns",
                node_names.len(),
                values.ncols()
            )));
        }
        if gap_tolerance < 1.0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Gap tolerance must be at least 1 interval, got {}",
                gap_tolerance
            )));
        }
        if let Some(((row, col), value)) = values.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(ForecastError::DataSource(format!(
                "Non-finite value {} at row {} of node '{}'",
                value, row, node_names[col]
            )));
        }

        let mut deltas = Vec::with_capacity(timestamps.len().saturating_sub(1));
        for (i, pair) in timestamps.windows(2).enumerate() {
            let delta = pair[1] - pair[0];
            if delta <= Duration::zero() {
                return Err(ForecastError::DataSource(format!(
                    "Timestamps must be strictly increasing: {} at row {} follows {}",
                    pair[1],
                    i + 1,
                    pair[0]
                )));
            }
            deltas.push(delta.num_milliseconds() as f64);
        }

        let interval = if deltas.is_empty() {
            Duration::days(1)
        } else {
            let median = Data::new(deltas.clone()).median();
            Duration::milliseconds(median.round() as i64)
        };

        let max_gap = interval.num_milliseconds() as f64 * gap_tolerance;
        if let Some(pos) = deltas.iter().position(|&d| d > max_gap) {
            return Err(ForecastError::DataSource(format!(
                "Gap of {} ms between rows {} and {} exceeds tolerance of {} intervals ({} ms)",
                deltas[pos],
                pos,
                pos + 1,
                gap_tolerance,
                interval.num_milliseconds()
            )));
        }

        Ok(Self {
            timestamps,
            values,
            node_names,
            interval,
        })
    }

    /// Univariate series with daily timestamps starting at the Unix epoch
    pub fn from_values(values: Vec<f64>) -> Result<Self> {
        let len = values.len();
        let matrix = Array2::from_shape_vec((len, 1), values)
            .map_err(|e| ForecastError::DataSource(e.to_string()))?;
        Self::new(synthetic_timestamps(len), matrix, vec!["value".to_string()])
    }

    /// Multivariate series with daily timestamps; every row holds one value per node
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let len = rows.len();
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = rows.iter().position(|r| r.len() != width) {
            return Err(ForecastError::DataSource(format!(
                "Row {} has {} values, expected {}",
                bad,
                rows[bad].len(),
                width
            )));
        }

        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        let matrix = Array2::from_shape_vec((len, width), flat)
            .map_err(|e| ForecastError::DataSource(e.to_string()))?;
        let names = (0..width).map(|i| format!("node_{}", i)).collect();
        Self::new(synthetic_timestamps(len), matrix, names)
    }

    /// Number of observations
    pub fn len(&self) -> usize {
        self.values.nrows()
    }

    /// Check if the series is empty
    pub fn is_empty(&self) -> bool {
        self.values.nrows() == 0
    }

    /// Number of nodes (columns)
    pub fn num_nodes(&self) -> usize {
        self.values.ncols()
    }

    /// Observation timestamps
    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// The full value matrix
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// Rows `start..end` of the value matrix
    pub fn rows(&self, start: usize, end: usize) -> ArrayView2<'_, f64> {
        self.values.slice(s![start..end, ..])
    }

    /// Node (column) names
    pub fn node_names(&self) -> &[String] {
        &self.node_names
    }

    /// Sampling interval (median spacing of the timestamps)
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

fn synthetic_timestamps(len: usize) -> Vec<DateTime<Utc>> {
    let start = Utc.timestamp_opt(0, 0).single().unwrap_or_default();
    (0..len).map(|i| start + Duration::days(i as i64)).collect()
}

/// Collaborator that supplies the experiment with a validated series
pub trait SeriesSource: Debug + Send + Sync {
    /// Load and validate the series
    fn load(&self) -> Result<Series>;

    /// Short human readable description used in logs and reports
    fn describe(&self) -> String;
}

/// Series read from a CSV file on disk
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    gap_tolerance: f64,
}

impl CsvSource {
    /// Create a CSV source with the default gap tolerance
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            gap_tolerance: DEFAULT_GAP_TOLERANCE,
        }
    }

    /// Override the gap tolerance used when validating the loaded series
    pub fn with_gap_tolerance(mut self, gap_tolerance: f64) -> Self {
        self.gap_tolerance = gap_tolerance;
        self
    }

    /// Path of the CSV file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SeriesSource for CsvSource {
    fn load(&self) -> Result<Series> {
        DataLoader::from_csv_with_tolerance(&self.path, self.gap_tolerance)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Series that is already in memory
#[derive(Debug, Clone)]
pub struct InMemorySource {
    name: String,
    series: Series,
}

impl InMemorySource {
    /// Wrap an existing series
    pub fn new<S: Into<String>>(name: S, series: Series) -> Self {
        Self {
            name: name.into(),
            series,
        }
    }
}

impl SeriesSource for InMemorySource {
    fn load(&self) -> Result<Series> {
        Ok(self.series.clone())
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

/// Resolve a dataset argument to a CSV path
///
/// An existing path (or anything ending in `.csv`) is used as is, otherwise
/// the name is looked up as `<data_dir>/<name>.csv`.
pub fn resolve_dataset_path(dataset: &str, data_dir: &Path) -> PathBuf {
    let direct = PathBuf::from(dataset);
    if direct.exists() || dataset.to_lowercase().ends_with(".csv") {
        direct
    } else {
        data_dir.join(format!("{}.csv", dataset))
    }
}

/// Data loader for time series data
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a series from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Series> {
        Self::from_csv_with_tolerance(path, DEFAULT_GAP_TOLERANCE)
    }

    /// Load a series from a CSV file with an explicit gap tolerance
    pub fn from_csv_with_tolerance<P: AsRef<Path>>(path: P, gap_tolerance: f64) -> Result<Series> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            ForecastError::DataSource(format!("Cannot open '{}': {}", path.display(), e))
        })?;
        let df = CsvReader::new(file)
            .infer_schema(Some(100))
            .has_header(true)
            .finish()?;

        let series = Self::from_dataframe(df, gap_tolerance)?;
        info!(
            path = %path.display(),
            rows = series.len(),
            nodes = series.num_nodes(),
            "loaded series"
        );
        Ok(series)
    }

    /// Create a series from an existing DataFrame
    ///
    /// The time column is detected by name; every other numeric column
    /// becomes a node. Without a time column, daily timestamps are synthesised.
    pub fn from_dataframe(df: DataFrame, gap_tolerance: f64) -> Result<Series> {
        if df.height() == 0 {
            return Err(ForecastError::DataSource(
                "Data frame has no rows".to_string(),
            ));
        }

        let time_column = Self::detect_time_column(&df);
        let timestamps = match &time_column {
            Some(name) => Self::parse_timestamps(&df, name)?,
            None => {
                debug!("no time column found, using synthetic daily timestamps");
                synthetic_timestamps(df.height())
            }
        };

        let mut node_names = Vec::new();
        let mut columns = Vec::new();
        for column in df.get_columns() {
            let name = column.name();
            if Some(name) == time_column.as_deref() {
                continue;
            }
            if !column.dtype().is_numeric() {
                debug!(column = name, "skipping non-numeric column");
                continue;
            }
            columns.push(Self::column_as_f64(&df, name)?);
            node_names.push(name.to_string());
        }

        if columns.is_empty() {
            return Err(ForecastError::DataSource(
                "No numeric value columns found in data".to_string(),
            ));
        }

        let rows = df.height();
        let mut values = Array2::<f64>::zeros((rows, columns.len()));
        for (c, column) in columns.iter().enumerate() {
            for (r, value) in column.iter().enumerate() {
                values[[r, c]] = *value;
            }
        }

        Series::with_gap_tolerance(timestamps, values, node_names, gap_tolerance)
    }

    /// Detect the time column in a DataFrame
    fn detect_time_column(df: &DataFrame) -> Option<String> {
        for name in df.get_column_names() {
            let lower_name = name.to_lowercase();
            if lower_name.contains("time")
                || lower_name.contains("date")
                || lower_name.contains("timestamp")
            {
                return Some(name.to_string());
            }
        }

        df.get_columns()
            .first()
            .filter(|col| col.dtype().is_temporal())
            .map(|col| col.name().to_string())
    }

    fn parse_timestamps(df: &DataFrame, column_name: &str) -> Result<Vec<DateTime<Utc>>> {
        let col = df.column(column_name)?;

        let parsed: Vec<Option<DateTime<Utc>>> = match col.dtype() {
            DataType::Utf8 => col
                .utf8()?
                .into_iter()
                .map(|opt| opt.and_then(parse_timestamp))
                .collect(),
            DataType::Date => col
                .cast(&DataType::Int32)?
                .i32()?
                .into_iter()
                .map(|opt| opt.and_then(|days| {
                    NaiveDate::from_ymd_opt(1970, 1, 1)
                        .and_then(|epoch| epoch.checked_add_signed(Duration::days(days as i64)))
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                        .map(|naive| Utc.from_utc_datetime(&naive))
                }))
                .collect(),
            DataType::Datetime(unit, _) => {
                let unit = *unit;
                col.cast(&DataType::Int64)?
                    .i64()?
                    .into_iter()
                    .map(|opt| {
                        opt.and_then(|raw| {
                            let millis = match unit {
                                TimeUnit::Nanoseconds => raw / 1_000_000,
                                TimeUnit::Microseconds => raw / 1_000,
                                TimeUnit::Milliseconds => raw,
                            };
                            Utc.timestamp_millis_opt(millis).single()
                        })
                    })
                    .collect()
            }
            dtype if dtype.is_numeric() => col
                .cast(&DataType::Int64)?
                .i64()?
                .into_iter()
                .map(|opt| opt.and_then(|secs| Utc.timestamp_opt(secs, 0).single()))
                .collect(),
            other => {
                return Err(ForecastError::DataSource(format!(
                    "Time column '{}' has unsupported type {}",
                    column_name, other
                )))
            }
        };

        parsed
            .into_iter()
            .enumerate()
            .map(|(row, ts)| {
                ts.ok_or_else(|| {
                    ForecastError::DataSource(format!(
                        "Unparseable timestamp in column '{}' at row {}",
                        column_name, row
                    ))
                })
            })
            .collect()
    }

    /// Helper method to get a column as f64 values, rejecting missing cells
    fn column_as_f64(df: &DataFrame, column_name: &str) -> Result<Vec<f64>> {
        let col = df.column(column_name)?.cast(&DataType::Float64)?;

        col.f64()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                value.ok_or_else(|| {
                    ForecastError::DataSource(format!(
                        "Missing value in column '{}' at row {}",
                        column_name, row
                    ))
                })
            })
            .collect()
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|naive| Utc.from_utc_datetime(&naive));
        }
    }

    None
}
