// Model resolution
//
// Picks exactly one run as "the current model" by walking an ordered chain
// of strategies, then loads that run's artifact.

mod cache;
mod strategy;

pub use cache::{CachePolicy, ModelCache};
pub use strategy::{
    Candidate, LatestStartTime, PinnedRun, RegisteredVersion, ResolutionStrategy, StrategySource,
};

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::errors::{Result, ServiceError};
use crate::models::{LinearModel, ModelManifest};
use crate::tracking::{RunMetadata, RunStore, Stage};

/// A resolved and loaded model, plus everything needed to report on it
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    pub model: LinearModel,
    pub manifest: ModelManifest,
    pub run: RunMetadata,
    pub version: Option<u32>,
    pub source: StrategySource,
    /// Artifact location inside the store
    pub location: String,
    /// Files stored with the run
    pub artifacts: Vec<String>,
    pub resolved_at: DateTime<Utc>,
}

impl ResolvedModel {
    pub fn run_id(&self) -> &str {
        &self.run.run_id
    }

    pub fn experiment_id(&self) -> &str {
        &self.run.experiment_id
    }
}

/// Which strategies to chain, in order
#[derive(Debug, Clone, Default)]
pub struct ResolverSettings {
    pub experiment_name: String,
    pub registered_model: Option<String>,
    pub stage: Option<Stage>,
    pub pinned_run: Option<String>,
}

impl ResolverSettings {
    /// A pinned run wins, then a registered model, then the latest run.
    ///
    /// Each is exclusive: a configured registry never falls back to runs that
    /// were trained but not registered.
    pub fn strategies(&self) -> Vec<Box<dyn ResolutionStrategy>> {
        if let Some(run_id) = &self.pinned_run {
            return vec![Box::new(PinnedRun::new(run_id.clone()))];
        }
        if let Some(name) = &self.registered_model {
            return vec![Box::new(RegisteredVersion::new(name.clone(), self.stage))];
        }
        vec![Box::new(LatestStartTime::new(self.experiment_name.clone()))]
    }
}

/// Ordered strategy chain over a run store
pub struct ModelResolver {
    store: Arc<dyn RunStore>,
    strategies: Vec<Box<dyn ResolutionStrategy>>,
}

impl ModelResolver {
    pub fn new(store: Arc<dyn RunStore>, strategies: Vec<Box<dyn ResolutionStrategy>>) -> Self {
        Self { store, strategies }
    }

    pub fn from_settings(store: Arc<dyn RunStore>, settings: &ResolverSettings) -> Self {
        Self::new(store, settings.strategies())
    }

    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.store
    }

    /// Descriptions of the configured strategies, in order
    pub fn describe(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.describe()).collect()
    }

    /// Try each strategy in order and return the first candidate.
    ///
    /// Only `NotFound` moves on to the next strategy. Any other failure
    /// (an ambiguous registry, a bad name) ends the chain as-is. When every
    /// strategy reports `NotFound`, the error lists each one's reason.
    pub fn select(&self) -> Result<Candidate> {
        let mut failures: Vec<(String, ServiceError)> = Vec::new();

        for (idx, strategy) in self.strategies.iter().enumerate() {
            match strategy.select(self.store.as_ref()) {
                Ok(candidate) => {
                    if idx > 0 {
                        tracing::info!(
                            strategy = %strategy.describe(),
                            run_id = %candidate.run_id,
                            "Resolved after {} failed strategies",
                            idx
                        );
                    } else {
                        tracing::debug!(
                            strategy = %strategy.describe(),
                            run_id = %candidate.run_id,
                            "Primary strategy resolved"
                        );
                    }
                    return Ok(candidate);
                }
                Err(e) => {
                    tracing::warn!(
                        strategy = %strategy.describe(),
                        attempt = idx + 1,
                        of = self.strategies.len(),
                        error = %e,
                        "Resolution strategy failed"
                    );
                    if !matches!(e, ServiceError::NotFound(_)) {
                        return Err(e);
                    }
                    failures.push((strategy.describe(), e));
                }
            }
        }

        if failures.is_empty() {
            return Err(ServiceError::NotFound(
                "no resolution strategies configured".to_string(),
            ));
        }

        let detail = failures
            .iter()
            .map(|(strategy, e)| format!("{}: {}", strategy, e))
            .collect::<Vec<_>>()
            .join("; ");
        Err(ServiceError::NotFound(detail))
    }

    /// Select a run and load its model
    pub fn resolve(&self) -> Result<ResolvedModel> {
        let candidate = self.select()?;
        let artifact = self.store.load_artifact(&candidate.run_id)?;
        let run = self.store.get_run(&candidate.run_id)?;
        let artifacts = self.store.list_artifacts(&candidate.run_id)?;

        tracing::info!(
            run_id = %candidate.run_id,
            experiment_id = %candidate.experiment_id,
            version = ?candidate.version,
            source = %candidate.source,
            location = %artifact.location,
            "Loaded model"
        );

        Ok(ResolvedModel {
            model: artifact.model,
            manifest: artifact.manifest,
            run,
            version: candidate.version,
            source: candidate.source,
            location: artifact.location,
            artifacts,
            resolved_at: Utc::now(),
        })
    }
}
