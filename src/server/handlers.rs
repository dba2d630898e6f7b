// HTTP request handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::Value;
use std::sync::Arc;

use super::types::{
    ErrorBody, HealthResponse, ModelInfoResponse, PredictRequest, PredictResponse, ReloadResponse,
};
use super::AppState;
use crate::errors::ServiceError;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/predict", post(handle_predict))
        .route("/health", get(health_check))
        .route("/model-info", get(model_info))
        .route("/admin/reload", post(reload_model))
        .with_state(state)
}

/// Handle POST /predict
async fn handle_predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictResponse>, AppError> {
    // Validate before touching the model
    let Json(body) = payload
        .map_err(|rejection| ServiceError::Validation(rejection.body_text()))?;
    let request = PredictRequest::from_json(&body)?;

    let resolved = state.cache().get().await?;
    let prediction = resolved.model.predict_one(request.area);
    if !prediction.is_finite() {
        return Err(ServiceError::Load(format!(
            "model {} produced a non-finite prediction for area {}",
            resolved.run_id(),
            request.area
        ))
        .into());
    }

    tracing::info!(
        area = request.area,
        prediction = prediction,
        model_id = %resolved.run_id(),
        "Prediction served"
    );

    Ok(Json(PredictResponse {
        prediction,
        model_id: resolved.run_id().to_string(),
        input_area: request.area,
    }))
}

/// Handle GET /health - 503 whenever no model can be served
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, AppError> {
    let resolved = state.cache().get().await.map_err(AppError::unavailable)?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        model_id: resolved.run_id().to_string(),
        experiment_id: resolved.experiment_id().to_string(),
        version: resolved.version,
        strategy: resolved.source.to_string(),
        cache_policy: state.cache().policy().to_string(),
        loaded_at: resolved.resolved_at.to_rfc3339(),
        uptime_seconds: state.uptime().as_secs(),
    }))
}

/// Handle GET /model-info
async fn model_info(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ModelInfoResponse>, AppError> {
    let resolved = state.cache().get().await?;

    Ok(Json(ModelInfoResponse {
        status: "loaded".to_string(),
        model_id: resolved.run_id().to_string(),
        run_name: resolved.run.run_name.clone(),
        experiment_id: resolved.experiment_id().to_string(),
        version: resolved.version,
        strategy: resolved.source.to_string(),
        strategies: state.cache().resolver().describe(),
        model_path: resolved.location.clone(),
        artifacts: resolved.artifacts.clone(),
        input_schema: resolved.manifest.input_schema.clone(),
        params: resolved.run.params.clone(),
        metrics: resolved.run.metrics.clone(),
        started_at: resolved.run.start_time.to_rfc3339(),
        loaded_at: resolved.resolved_at.to_rfc3339(),
    }))
}

/// Handle POST /admin/reload - drop the cached model and resolve again
async fn reload_model(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReloadResponse>, AppError> {
    let resolved = state.cache().reload().await?;

    Ok(Json(ReloadResponse {
        status: "reloaded".to_string(),
        model_id: resolved.run_id().to_string(),
        version: resolved.version,
        strategy: resolved.source.to_string(),
    }))
}

/// Application error wrapper for proper HTTP error responses.
///
/// Validation messages go back to the caller verbatim. Everything else is
/// logged in full and answered with an opaque detail.
pub struct AppError {
    status: StatusCode,
    error: ServiceError,
}

impl AppError {
    /// Any failure reported as 503
    pub fn unavailable(error: ServiceError) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            error,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn public_detail(&self) -> String {
        match &self.error {
            ServiceError::Validation(msg) => msg.clone(),
            _ if self.status == StatusCode::SERVICE_UNAVAILABLE => {
                "Service unavailable: no model can be served right now".to_string()
            }
            _ => "Internal error while serving the model".to_string(),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(error: ServiceError) -> Self {
        let status = match &error {
            ServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            e if e.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, error }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                status = self.status.as_u16(),
                kind = self.error.kind(),
                error = %self.error,
                "Request failed"
            );
        } else {
            tracing::warn!(status = self.status.as_u16(), error = %self.error, "Rejected request");
        }

        let body = ErrorBody {
            detail: self.public_detail(),
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ServiceError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (ServiceError::NotFound("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (ServiceError::Ambiguous("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (ServiceError::Load("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            assert_eq!(AppError::from(error).status(), expected);
        }
    }

    #[test]
    fn test_internal_detail_is_opaque() {
        let err = AppError::from(ServiceError::Load("/secret/path/model.json".into()));
        assert!(!err.public_detail().contains("/secret"));
    }
}
