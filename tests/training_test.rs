// Training pipeline tests
//
// Trains against a generated CSV in a temp directory and inspects what the
// run left in the tracking store.

use anyhow::Result;
use housing_predictor::errors::ServiceError;
use housing_predictor::training::{load_csv, train_test_split, Trainer, TrainingConfig};
use housing_predictor::tracking::{FileStore, RunStore};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Roughly linear prices with a little deterministic noise
fn write_dataset(dir: &Path, rows: usize) -> Result<PathBuf> {
    let mut csv = String::from("area,bedrooms,price\n");
    for i in 0..rows {
        let area = 800.0 + 45.0 * i as f64;
        let noise = ((i * 7) % 5) as f64 * 1500.0 - 3000.0;
        let price = 150.0 * area + 20_000.0 + noise;
        writeln!(csv, "{},{},{}", area, 2 + i % 3, price)?;
    }
    let path = dir.join("housing.csv");
    std::fs::write(&path, csv)?;
    Ok(path)
}

fn config(data_path: PathBuf) -> TrainingConfig {
    TrainingConfig {
        data_path,
        ..TrainingConfig::default()
    }
}

#[test]
fn test_training_publishes_complete_run() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let data = write_dataset(temp_dir.path(), 30)?;
    let store = FileStore::new(temp_dir.path().join("mlruns"));

    let result = Trainer::new(&store, config(data)).run()?;

    assert_eq!(result.split.test.len(), 6);
    assert_eq!(result.split.train.len(), 24);
    assert!((result.model.coefficient - 150.0).abs() < 5.0);

    let metrics = &result.metrics;
    assert!(metrics.mse >= 0.0);
    assert!(metrics.mae >= 0.0);
    assert!((metrics.rmse - metrics.mse.sqrt()).abs() < 1e-9);
    assert!(metrics.r2 > 0.9);

    let experiment = store.find_experiment("Housing-Regression")?;
    let runs = store.list_runs(&experiment.experiment_id)?;
    assert_eq!(runs.len(), 1);

    let run = &runs[0];
    assert_eq!(run.run_id, result.run.run_id);
    assert_eq!(run.params["test_size"], "0.2");
    assert_eq!(run.params["random_state"], "42");
    assert_eq!(run.params["model_type"], "LinearRegression");
    for key in ["r2_score", "mse", "rmse", "mae"] {
        assert!(run.metrics.contains_key(key), "missing metric {}", key);
    }

    let artifacts = store.list_artifacts(&run.run_id)?;
    assert!(artifacts.contains(&"model/model.json".to_string()));
    assert!(artifacts.contains(&"plots/predictions.csv".to_string()));

    let artifact = store.load_artifact(&run.run_id)?;
    assert_eq!(artifact.model, result.model);
    assert_eq!(artifact.manifest.input_example.len(), 5);
    Ok(())
}

#[test]
fn test_same_seed_gives_same_partition() -> Result<()> {
    let a = train_test_split(50, 0.2, 42)?;
    let b = train_test_split(50, 0.2, 42)?;
    let set = |v: &[usize]| v.iter().copied().collect::<BTreeSet<_>>();

    assert_eq!(set(&a.test), set(&b.test));
    assert_eq!(set(&a.train), set(&b.train));
    assert_eq!(a.test.len(), 10);

    let c = train_test_split(50, 0.2, 7)?;
    assert_ne!(set(&a.test), set(&c.test));
    Ok(())
}

#[test]
fn test_repeated_training_is_reproducible() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let data = write_dataset(temp_dir.path(), 25)?;
    let store = FileStore::new(temp_dir.path().join("mlruns"));

    let first = Trainer::new(&store, config(data.clone())).run()?;
    let second = Trainer::new(&store, config(data)).run()?;

    assert_ne!(first.run.run_id, second.run.run_id);
    assert_eq!(first.split.test, second.split.test);
    assert_eq!(first.model, second.model);
    assert_eq!(first.metrics, second.metrics);
    Ok(())
}

#[test]
fn test_missing_column_leaves_no_run() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let data = temp_dir.path().join("housing.csv");
    std::fs::write(&data, "size,price\n1000,150000\n1200,180000\n1500,225000\n")?;
    let store = FileStore::new(temp_dir.path().join("mlruns"));

    let err = Trainer::new(&store, config(data)).run().unwrap_err();
    assert!(matches!(err, ServiceError::Dataset(_)), "got {:?}", err);

    match store.find_experiment("Housing-Regression") {
        Err(ServiceError::NotFound(_)) => {}
        Ok(experiment) => assert!(store.list_runs(&experiment.experiment_id)?.is_empty()),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

#[test]
fn test_non_numeric_value_reports_line() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let data = temp_dir.path().join("housing.csv");
    std::fs::write(&data, "area,price\n1000,150000\nbig,180000\n")?;

    let err = load_csv(&data, "area", "price").unwrap_err();
    assert!(matches!(err, ServiceError::Dataset(_)));
    assert!(err.to_string().contains("line 3"), "got {}", err);
    Ok(())
}
