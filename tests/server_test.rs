// Integration tests for the HTTP prediction server
//
// Requests go through the real router with `tower::ServiceExt::oneshot`,
// backed by a tracking store in a temp directory. `create_app` adds the
// trace layer used in production.

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use housing_predictor::models::LinearModel;
use housing_predictor::monitor::count_errors;
use housing_predictor::resolver::{CachePolicy, ModelCache, ModelResolver, ResolverSettings};
use housing_predictor::server::{create_app, create_router, AppState};
use housing_predictor::tracking::{FileStore, RunMetadata, RunStore};
use regex::Regex;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

fn publish_run(store: &FileStore, coefficient: f64, intercept: f64) -> Result<RunMetadata> {
    let experiment = store.get_or_create_experiment("Housing-Regression")?;
    let mut run = store.begin_run(&experiment, "linear_regression")?;
    run.log_param("model_type", "LinearRegression");
    run.log_metric("rmse", 1234.5);
    run.log_model(
        &LinearModel {
            feature: "area".to_string(),
            target: "price".to_string(),
            coefficient,
            intercept,
        },
        &[1000.0],
    )?;
    Ok(run.finish()?)
}

fn state(store: &FileStore, policy: CachePolicy) -> Arc<AppState> {
    let settings = ResolverSettings {
        experiment_name: "Housing-Regression".to_string(),
        ..Default::default()
    };
    let store: Arc<dyn RunStore> = Arc::new(store.clone());
    let resolver = Arc::new(ModelResolver::from_settings(store, &settings));
    let cache = Arc::new(ModelCache::new(resolver, policy));
    Arc::new(AppState::new(cache))
}

fn app(store: &FileStore, policy: CachePolicy) -> Router {
    create_router(state(store, policy))
}

/// Formatted log output kept in memory
#[derive(Clone, Default)]
struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn corrupt_model(root: &std::path::Path, run: &RunMetadata) -> Result<()> {
    let payload = root
        .join(&run.experiment_id)
        .join(&run.run_id)
        .join("artifacts/model/model.json");
    std::fs::write(payload, "garbage")?;
    Ok(())
}

async fn send(app: Router, request: Request<Body>) -> Result<(StatusCode, Value)> {
    let response = app.oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, body))
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_predict_returns_prediction() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = FileStore::new(temp_dir.path());
    let run = publish_run(&store, 150.0, 20_000.0)?;

    let (status, body) = send(
        app(&store, CachePolicy::Startup),
        post_json("/predict", r#"{"area": 1200}"#),
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prediction"].as_f64(), Some(200_000.0));
    assert_eq!(body["model_id"], json!(run.run_id));
    assert_eq!(body["input_area"].as_f64(), Some(1200.0));
    Ok(())
}

#[tokio::test]
async fn test_predict_rejects_invalid_area() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = FileStore::new(temp_dir.path());
    publish_run(&store, 150.0, 0.0)?;

    for payload in [
        r#"{}"#,
        r#"{"area": "1200"}"#,
        r#"{"area": 0}"#,
        r#"{"area": -10}"#,
        r#"{"area": null}"#,
        r#"{"area": 12"#,
    ] {
        let (status, body) = send(
            app(&store, CachePolicy::Startup),
            post_json("/predict", payload),
        )
        .await?;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "payload {}", payload);
        assert!(
            body["detail"].as_str().is_some_and(|d| !d.is_empty()),
            "payload {} gave {}",
            payload,
            body
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_validation_happens_before_model_loading() -> Result<()> {
    // Empty store: a bad request is still a 422, not a 503
    let temp_dir = TempDir::new()?;
    let store = FileStore::new(temp_dir.path().join("mlruns"));

    let (status, _) = send(
        app(&store, CachePolicy::Startup),
        post_json("/predict", r#"{"area": -1}"#),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    Ok(())
}

#[tokio::test]
async fn test_no_model_is_service_unavailable() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = FileStore::new(temp_dir.path().join("mlruns"));

    let (status, body) = send(app(&store, CachePolicy::Startup), get("/health")).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let detail = body["detail"].as_str().unwrap_or_default();
    assert!(!detail.contains("mlruns"), "detail leaks a path: {}", detail);

    let (status, _) = send(
        app(&store, CachePolicy::Startup),
        post_json("/predict", r#"{"area": 1200}"#),
    )
    .await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}

#[tokio::test]
async fn test_corrupt_model_is_opaque_internal_error() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = FileStore::new(temp_dir.path());
    let run = publish_run(&store, 150.0, 0.0)?;
    corrupt_model(temp_dir.path(), &run)?;

    let (status, body) = send(
        app(&store, CachePolicy::Startup),
        post_json("/predict", r#"{"area": 1200}"#),
    )
    .await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body["detail"].as_str().unwrap_or_default();
    assert!(!detail.contains(&run.run_id));
    assert!(!detail.contains("model.json"));
    Ok(())
}

#[tokio::test]
async fn test_failed_request_logs_one_error_line() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = FileStore::new(temp_dir.path());
    let run = publish_run(&store, 150.0, 0.0)?;
    corrupt_model(temp_dir.path(), &run)?;

    let captured = CapturedLog::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    // Served router, trace layer included
    let (status, _) = send(
        create_app(state(&store, CachePolicy::Startup)),
        post_json("/predict", r#"{"area": 1200}"#),
    )
    .await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let text = String::from_utf8(captured.0.lock().unwrap().clone())?;
    let sample = count_errors(&text, &Regex::new(r"\bERROR\b")?);
    assert_eq!(sample.error_lines, 1, "log was:\n{}", text);
    Ok(())
}

#[tokio::test]
async fn test_health_reports_resolved_model() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = FileStore::new(temp_dir.path());
    let run = publish_run(&store, 150.0, 0.0)?;

    let (status, body) = send(app(&store, CachePolicy::Startup), get("/health")).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["model_id"], json!(run.run_id));
    assert_eq!(body["experiment_id"], json!(run.experiment_id));
    assert_eq!(body["strategy"], "latest_run");
    assert_eq!(body["cache_policy"], "startup");
    Ok(())
}

#[tokio::test]
async fn test_model_info_describes_run() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = FileStore::new(temp_dir.path());
    let run = publish_run(&store, 150.0, 0.0)?;

    let (status, body) = send(app(&store, CachePolicy::Startup), get("/model-info")).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "loaded");
    assert_eq!(body["model_id"], json!(run.run_id));
    assert_eq!(body["run_name"], "linear_regression");
    assert_eq!(body["params"]["model_type"], "LinearRegression");
    assert_eq!(body["metrics"]["rmse"].as_f64(), Some(1234.5));
    assert_eq!(body["input_schema"][0]["name"], "area");
    assert!(body["model_path"].as_str().is_some_and(|p| p.ends_with("model")));
    assert!(body["artifacts"]
        .as_array()
        .is_some_and(|a| a.contains(&json!("model/model.json"))));
    Ok(())
}

#[tokio::test]
async fn test_reload_picks_up_newer_run() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = FileStore::new(temp_dir.path());
    let first = publish_run(&store, 150.0, 0.0)?;
    let router = app(&store, CachePolicy::Startup);

    let (_, body) = send(router.clone(), get("/health")).await?;
    assert_eq!(body["model_id"], json!(first.run_id));

    // Runs published later start later
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let second = publish_run(&store, 175.0, 0.0)?;

    let (_, body) = send(router.clone(), get("/health")).await?;
    assert_eq!(body["model_id"], json!(first.run_id));

    let (status, body) = send(router.clone(), post_json("/admin/reload", "")).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "reloaded");
    assert_eq!(body["model_id"], json!(second.run_id));

    let (_, body) = send(router, post_json("/predict", r#"{"area": 1000}"#)).await?;
    assert_eq!(body["prediction"].as_f64(), Some(175_000.0));
    Ok(())
}

#[tokio::test]
async fn test_unknown_route_is_not_found() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = FileStore::new(temp_dir.path());

    let (status, _) = send(app(&store, CachePolicy::Startup), get("/debug")).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
