// HTTP API types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::errors::ServiceError;
use crate::models::ColumnSpec;

/// Request body for POST /predict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub area: f64,
}

impl PredictRequest {
    /// Validate a raw JSON body.
    ///
    /// `area` must be present, a JSON number (strings are not coerced),
    /// finite, and strictly positive.
    pub fn from_json(body: &Value) -> Result<Self, ServiceError> {
        let object = body.as_object().ok_or_else(|| {
            ServiceError::Validation("request body must be a JSON object".to_string())
        })?;

        let raw = object
            .get("area")
            .ok_or_else(|| ServiceError::Validation("field 'area' is required".to_string()))?;

        let area = raw.as_f64().ok_or_else(|| {
            ServiceError::Validation(format!("field 'area' must be a number, got {}", raw))
        })?;

        if !area.is_finite() || area <= 0.0 {
            return Err(ServiceError::Validation(format!(
                "field 'area' must be greater than 0, got {}",
                area
            )));
        }

        Ok(Self { area })
    }
}

/// Response body for POST /predict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: f64,
    pub model_id: String,
    pub input_area: f64,
}

/// Response body for GET /health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_id: String,
    pub experiment_id: String,
    pub version: Option<u32>,
    pub strategy: String,
    pub cache_policy: String,
    pub loaded_at: String,
    pub uptime_seconds: u64,
}

/// Response body for GET /model-info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfoResponse {
    pub status: String,
    pub model_id: String,
    pub run_name: String,
    pub experiment_id: String,
    pub version: Option<u32>,
    pub strategy: String,
    /// Configured strategy chain, in order
    pub strategies: Vec<String>,
    pub model_path: String,
    pub artifacts: Vec<String>,
    pub input_schema: Vec<ColumnSpec>,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    pub started_at: String,
    pub loaded_at: String,
}

/// Response body for POST /admin/reload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub status: String,
    pub model_id: String,
    pub version: Option<u32>,
    pub strategy: String,
}

/// Error body for every non-2xx response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}
