// Single-feature ordinary least squares regression

use serde::{Deserialize, Serialize};

use crate::errors::{Result, ServiceError};

/// Fitted `target = coefficient * feature + intercept`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    /// Input feature name (e.g. "area")
    pub feature: String,
    /// Predicted column name (e.g. "price")
    pub target: String,
    pub coefficient: f64,
    pub intercept: f64,
}

impl LinearModel {
    /// Fit by closed-form least squares.
    ///
    /// Fails when the inputs are empty, of different lengths, or when the
    /// feature has zero variance (the slope is undefined).
    pub fn fit(feature: &str, target: &str, x: &[f64], y: &[f64]) -> Result<Self> {
        if x.len() != y.len() {
            return Err(ServiceError::Dataset(format!(
                "feature and target lengths differ ({} vs {})",
                x.len(),
                y.len()
            )));
        }
        if x.len() < 2 {
            return Err(ServiceError::Dataset(format!(
                "need at least 2 training rows, got {}",
                x.len()
            )));
        }

        let n = x.len() as f64;
        let mean_x = x.iter().sum::<f64>() / n;
        let mean_y = y.iter().sum::<f64>() / n;

        let mut sxx = 0.0;
        let mut sxy = 0.0;
        for (xi, yi) in x.iter().zip(y) {
            let dx = xi - mean_x;
            sxx += dx * dx;
            sxy += dx * (yi - mean_y);
        }

        if sxx == 0.0 {
            return Err(ServiceError::Dataset(format!(
                "feature '{}' has zero variance in the training partition",
                feature
            )));
        }

        let coefficient = sxy / sxx;
        Ok(Self {
            feature: feature.to_string(),
            target: target.to_string(),
            coefficient,
            intercept: mean_y - coefficient * mean_x,
        })
    }

    pub fn predict_one(&self, x: f64) -> f64 {
        self.coefficient * x + self.intercept
    }

    pub fn predict(&self, x: &[f64]) -> Vec<f64> {
        x.iter().map(|&v| self.predict_one(v)).collect()
    }

    /// Coefficient of determination on `(x, y)`
    pub fn score(&self, x: &[f64], y: &[f64]) -> f64 {
        super::metrics::r2_score(y, &self.predict(x))
    }
}
