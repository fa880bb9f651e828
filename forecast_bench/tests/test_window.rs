use forecast_bench::data::Series;
use forecast_bench::error::ForecastError;
use forecast_bench::window::{build, split, WindowPair, Windower};
use ndarray::array;
use pretty_assertions::assert_eq;
use rstest::rstest;

fn sequential(len: usize) -> Series {
    Series::from_values((0..len).map(|v| v as f64).collect()).unwrap()
}

#[test]
fn test_sequential_series_pairs() {
    let series = sequential(100);
    let pairs = build(&series, 40, 10, 1).unwrap();

    assert_eq!(pairs.len(), 51);

    let first = &pairs[0];
    let input: Vec<f64> = first.input().iter().copied().collect();
    let target: Vec<f64> = first.target().iter().copied().collect();
    assert_eq!(input, (0..40).map(|v| v as f64).collect::<Vec<_>>());
    assert_eq!(target, (40..50).map(|v| v as f64).collect::<Vec<_>>());

    let last = pairs.last().unwrap();
    assert_eq!(last.start(), 50);
    assert_eq!(last.target()[[9, 0]], 99.0);
}

#[rstest]
#[case(60, 10, 5)]
#[case(100, 40, 10)]
#[case(25, 1, 1)]
#[case(12, 6, 6)]
fn test_pair_count_and_contiguity(#[case] len: usize, #[case] window_size: usize, #[case] horizon: usize) {
    let series = sequential(len);
    let pairs = build(&series, window_size, horizon, 1).unwrap();
    assert_eq!(pairs.len(), len - window_size - horizon + 1);

    for (i, pair) in pairs.iter().enumerate() {
        assert_eq!(pair.index(), i);
        assert_eq!(pair.window_size(), window_size);
        assert_eq!(pair.horizon(), horizon);
        assert_eq!(pair.input_end(), pair.start() + window_size);
        // Values equal their row index, so the target continues where the input stops.
        assert_eq!(pair.input()[[window_size - 1, 0]] + 1.0, pair.target()[[0, 0]]);
        assert_eq!(pair.target()[[horizon - 1, 0]], (pair.target_end() - 1) as f64);
    }
}

#[test]
fn test_stride_skips_start_offsets() {
    let series = sequential(30);
    let windower = Windower::new(5, 2, 4).unwrap();
    let pairs = windower.build(&series).unwrap();

    assert_eq!(pairs.len(), windower.num_pairs(30));
    let starts: Vec<usize> = pairs.iter().map(WindowPair::start).collect();
    assert_eq!(starts, vec![0, 4, 8, 12, 16, 20]);
}

#[test]
fn test_build_is_deterministic() {
    let series = Series::from_rows((0..80).map(|i| vec![i as f64, (i as f64).sin()]).collect()).unwrap();
    let a = build(&series, 12, 4, 1).unwrap();
    let b = build(&series, 12, 4, 1).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_insufficient_data() {
    let series = sequential(45);
    let err = build(&series, 40, 10, 1).unwrap_err();
    assert!(matches!(
        err,
        ForecastError::InsufficientData {
            required: 50,
            available: 45
        }
    ));
    assert_eq!(err.kind(), "InsufficientDataError");
}

#[rstest]
#[case(0, 10, 1)]
#[case(40, 0, 1)]
#[case(40, 10, 0)]
fn test_zero_sizes_are_rejected(#[case] window_size: usize, #[case] horizon: usize, #[case] stride: usize) {
    let err = Windower::new(window_size, horizon, stride).unwrap_err();
    assert!(matches!(err, ForecastError::InvalidParameter(_)));
}

#[test]
fn test_split_has_no_leakage() {
    let series = sequential(400);
    let pairs = build(&series, 40, 10, 1).unwrap();
    let split = split(&pairs, 0.2).unwrap();

    assert_eq!(split.eval().len(), 70);
    assert_eq!(split.train().len(), 232);
    assert_eq!(split.purged(), 49);

    let eval_start = split.eval().iter().map(WindowPair::start).min().unwrap();
    let train_end = split.train().iter().map(WindowPair::target_end).max().unwrap();
    assert!(train_end <= eval_start);
}

#[test]
fn test_split_of_short_series_is_invalid() {
    // Every training candidate overlaps the evaluation period.
    let series = sequential(100);
    let pairs = build(&series, 40, 10, 1).unwrap();
    let err = split(&pairs, 0.2).unwrap_err();
    assert!(matches!(err, ForecastError::InvalidSplit(_)));
}

#[rstest]
#[case(0.0)]
#[case(1.0)]
#[case(-0.5)]
#[case(0.001)]
fn test_degenerate_split_fractions(#[case] fraction: f64) {
    let series = sequential(200);
    let pairs = build(&series, 5, 1, 1).unwrap();
    let err = split(&pairs, fraction).unwrap_err();
    assert_eq!(err.kind(), "InvalidSplitError");
}

#[test]
fn test_pair_rejects_mismatched_nodes() {
    let err = WindowPair::new(0, 0, array![[1.0, 2.0]], array![[1.0]]).unwrap_err();
    assert!(matches!(err, ForecastError::Validation(_)));
}
