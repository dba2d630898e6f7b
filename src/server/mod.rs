// Prediction server module
// HTTP front end over the cached, resolved model

mod handlers;
pub mod types;

pub use handlers::{create_router, health_check, AppError};

use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::resolver::ModelCache;

/// State shared by every request handler
pub struct AppState {
    /// Model cache (owns the resolver and the cached model)
    cache: Arc<ModelCache>,
    started_at: Instant,
}

impl AppState {
    pub fn new(cache: Arc<ModelCache>) -> Self {
        Self {
            cache,
            started_at: Instant::now(),
        }
    }

    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Main prediction server structure
pub struct PredictionServer {
    state: Arc<AppState>,
    config: ServerConfig,
}

impl PredictionServer {
    pub fn new(config: ServerConfig, cache: Arc<ModelCache>) -> Self {
        Self {
            state: Arc::new(AppState::new(cache)),
            config,
        }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Start the HTTP server; returns after Ctrl-C
    pub async fn serve(self) -> Result<()> {
        let addr: SocketAddr = self.config.bind_address.parse()?;

        self.state.cache().warm().await;

        let app = create_app(self.state.clone());

        tracing::info!(
            %addr,
            cache_policy = %self.state.cache().policy(),
            "Starting prediction server"
        );

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Prediction server stopped");
        Ok(())
    }
}

/// Router with request tracing, as served.
///
/// A failed request produces exactly one ERROR line (from `AppError`), so the
/// trace layer logs no failures of its own.
pub fn create_app(state: Arc<AppState>) -> Router {
    create_router(state).layer(TraceLayer::new_for_http().on_failure(()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
