// Offline trainer
//
// One invocation = one new run: load data, split, fit, evaluate on the
// held-out rows, then publish params, metrics, model and plot data together.

use std::path::{Path, PathBuf};
use std::time::Instant;

use super::dataset::load_csv;
use super::split::{train_test_split, Split};
use crate::errors::{Result, ServiceError};
use crate::models::{LinearModel, RegressionMetrics};
use crate::tracking::{FileStore, RunBuilder, RunMetadata};

pub const MODEL_TYPE: &str = "LinearRegression";
const INPUT_EXAMPLE_ROWS: usize = 5;

/// Inputs that fully determine a training run
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub data_path: PathBuf,
    pub feature: String,
    pub target: String,
    pub test_size: f64,
    pub random_seed: u64,
    pub experiment_name: String,
    pub run_name: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/housing.csv"),
            feature: "area".to_string(),
            target: "price".to_string(),
            test_size: 0.2,
            random_seed: 42,
            experiment_name: "Housing-Regression".to_string(),
            run_name: "linear_regression".to_string(),
        }
    }
}

/// Result of a training run
#[derive(Debug, Clone)]
pub struct TrainingResult {
    pub run: RunMetadata,
    pub model: LinearModel,
    pub metrics: RegressionMetrics,
    pub split: Split,
    /// Training duration in seconds
    pub duration_secs: f64,
}

/// Fits a model and records it as a run in the tracking store
pub struct Trainer<'a> {
    store: &'a FileStore,
    config: TrainingConfig,
}

impl<'a> Trainer<'a> {
    pub fn new(store: &'a FileStore, config: TrainingConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train and publish one run.
    ///
    /// Data problems surface before the run is opened; any later failure
    /// drops the unfinished run, so no partial run ever becomes visible.
    pub fn run(&self) -> Result<TrainingResult> {
        let started = Instant::now();
        let cfg = &self.config;

        let dataset = load_csv(&cfg.data_path, &cfg.feature, &cfg.target)?;
        let split = train_test_split(dataset.len(), cfg.test_size, cfg.random_seed)?;
        let (x_train, y_train) = dataset.select(&split.train);
        let (x_test, y_test) = dataset.select(&split.test);

        let model = LinearModel::fit(&cfg.feature, &cfg.target, &x_train, &y_train)?;
        let y_pred = model.predict(&x_test);
        let metrics = RegressionMetrics::evaluate(&y_test, &y_pred);

        tracing::info!(
            r2 = metrics.r2,
            mse = metrics.mse,
            rmse = metrics.rmse,
            mae = metrics.mae,
            "Evaluated model on held-out partition"
        );

        let experiment = self.store.get_or_create_experiment(&cfg.experiment_name)?;
        let mut run = self.store.begin_run(&experiment, &cfg.run_name)?;

        self.log_params(&mut run, &split);
        for (name, value) in metrics.as_pairs() {
            run.log_metric(name, value);
        }

        let example: Vec<f64> = x_train.iter().take(INPUT_EXAMPLE_ROWS).copied().collect();
        run.log_model(&model, &example)?;
        write_prediction_plot(&run.artifact_dir("plots"), &y_test, &y_pred)?;

        let meta = run.finish()?;
        let duration_secs = started.elapsed().as_secs_f64();

        tracing::info!(
            run_id = %meta.run_id,
            experiment = %cfg.experiment_name,
            duration_secs = duration_secs,
            "Training run complete"
        );

        Ok(TrainingResult {
            run: meta,
            model,
            metrics,
            split,
            duration_secs,
        })
    }

    fn log_params(&self, run: &mut RunBuilder, split: &Split) {
        let cfg = &self.config;
        run.log_param("test_size", cfg.test_size);
        run.log_param("random_state", cfg.random_seed);
        run.log_param("model_type", MODEL_TYPE);
        run.log_param("feature", &cfg.feature);
        run.log_param("target", &cfg.target);
        run.log_param("data_path", cfg.data_path.display());
        run.log_param("n_train", split.train.len());
        run.log_param("n_test", split.test.len());
    }
}

/// Actual vs predicted pairs for the held-out rows
fn write_prediction_plot(dir: &Path, actual: &[f64], predicted: &[f64]) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join("predictions.csv");
    let mut writer = csv::Writer::from_path(&path)
        .map_err(|e| ServiceError::Io(e.into()))?;

    writer
        .write_record(["actual", "predicted"])
        .map_err(|e| ServiceError::Io(e.into()))?;
    for (a, p) in actual.iter().zip(predicted) {
        writer
            .write_record([a.to_string(), p.to_string()])
            .map_err(|e| ServiceError::Io(e.into()))?;
    }
    writer.flush()?;
    Ok(())
}
