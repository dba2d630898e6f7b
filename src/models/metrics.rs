// Regression evaluation metrics

use serde::{Deserialize, Serialize};

/// Metrics computed on the held-out partition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub r2: f64,
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
}

impl RegressionMetrics {
    /// Evaluate predictions against ground truth.
    ///
    /// `rmse` is always derived from `mse`, never computed separately.
    pub fn evaluate(y_true: &[f64], y_pred: &[f64]) -> Self {
        let mse = mean_squared_error(y_true, y_pred);
        Self {
            r2: r2_score(y_true, y_pred),
            mse,
            rmse: mse.sqrt(),
            mae: mean_absolute_error(y_true, y_pred),
        }
    }

    /// Metric names as logged on a run
    pub fn as_pairs(&self) -> [(&'static str, f64); 4] {
        [
            ("r2_score", self.r2),
            ("mse", self.mse),
            ("rmse", self.rmse),
            ("mae", self.mae),
        ]
    }
}

pub fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let sum: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    sum / y_true.len() as f64
}

pub fn mean_absolute_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let sum: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()).sum();
    sum / y_true.len() as f64
}

/// R^2. A constant target scores 1.0 when predicted exactly, else 0.0.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean) * (t - mean)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p) * (t - p))
        .sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}
