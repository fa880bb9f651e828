use forecast_bench::config::{ExperimentConfig, TrainingConfig};
use forecast_bench::data::{InMemorySource, Series};
use forecast_bench::experiment::{Experiment, RunState};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Three coupled synthetic nodes
    let rows = (0..400)
        .map(|t| {
            let x = t as f64;
            let a = (x * 0.15).sin() * 4.0 + 10.0;
            vec![a, a * 0.5 + (x * 0.05).cos(), x * 0.02 + 3.0]
        })
        .collect();
    let series = Series::from_rows(rows)?;

    let config = ExperimentConfig::builder("GWN", 24, 6)
        .baseline(true)
        .training(TrainingConfig {
            epochs: 20,
            learning_rate: 0.005,
            ..TrainingConfig::default()
        })
        .build()?;

    let mut experiment = Experiment::new(config, InMemorySource::new("synthetic", series));

    // Drive the run one transition at a time
    while !experiment.state().is_terminal() {
        let state = experiment.step()?;
        println!("-> {:?}", state);
        if state == RunState::WindowsBuilt {
            if let Some(split) = experiment.split() {
                println!(
                    "   {} train / {} eval pairs ({} purged)",
                    split.train().len(),
                    split.eval().len(),
                    split.purged()
                );
            }
        }
    }

    if let Some(report) = experiment.report() {
        println!("{}", report);
    }
    Ok(())
}
