// Resolution strategies
//
// Each strategy inspects metadata only and names one run, or reports why it
// cannot. Loading the artifact is the resolver's job, so a corrupt artifact
// never sends the chain on to the next strategy.

use std::fmt;

use crate::errors::{Result, ServiceError};
use crate::tracking::{RunStore, Stage};

/// Which policy produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategySource {
    /// Explicitly configured run id
    Pinned,
    /// Highest registered version
    Registered,
    /// Most recently started run
    LatestRun,
}

impl fmt::Display for StrategySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategySource::Pinned => "pinned",
            StrategySource::Registered => "registered",
            StrategySource::LatestRun => "latest_run",
        };
        f.write_str(name)
    }
}

/// The run a strategy selected
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub run_id: String,
    pub experiment_id: String,
    /// Registered version, when selected through the registry
    pub version: Option<u32>,
    pub source: StrategySource,
}

/// One policy in the resolver's ordered chain
pub trait ResolutionStrategy: Send + Sync {
    /// Human-readable description for logs
    fn describe(&self) -> String;

    /// Select a candidate run, without loading it
    fn select(&self, store: &dyn RunStore) -> Result<Candidate>;
}

/// Always the configured run
pub struct PinnedRun {
    run_id: String,
}

impl PinnedRun {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }
}

impl ResolutionStrategy for PinnedRun {
    fn describe(&self) -> String {
        format!("pinned run {}", self.run_id)
    }

    fn select(&self, store: &dyn RunStore) -> Result<Candidate> {
        let run = store.get_run(&self.run_id)?;
        Ok(Candidate {
            run_id: run.run_id,
            experiment_id: run.experiment_id,
            version: None,
            source: StrategySource::Pinned,
        })
    }
}

/// Highest version of a registered model, optionally restricted to a stage
pub struct RegisteredVersion {
    model_name: String,
    stage: Option<Stage>,
}

impl RegisteredVersion {
    pub fn new(model_name: impl Into<String>, stage: Option<Stage>) -> Self {
        Self {
            model_name: model_name.into(),
            stage,
        }
    }
}

impl ResolutionStrategy for RegisteredVersion {
    fn describe(&self) -> String {
        match self.stage {
            Some(stage) => format!("registered model '{}' ({})", self.model_name, stage),
            None => format!("registered model '{}'", self.model_name),
        }
    }

    fn select(&self, store: &dyn RunStore) -> Result<Candidate> {
        let mut versions = store.list_versions(&self.model_name)?;
        if let Some(stage) = self.stage {
            versions.retain(|v| v.stage == stage);
        }

        let top = versions.iter().map(|v| v.version).max().ok_or_else(|| {
            ServiceError::NotFound(format!("no versions of {}", self.describe()))
        })?;

        let mut at_top: Vec<_> = versions.into_iter().filter(|v| v.version == top).collect();
        if at_top.len() > 1 {
            let runs: Vec<&str> = at_top.iter().map(|v| v.run_id.as_str()).collect();
            return Err(ServiceError::Ambiguous(format!(
                "{} entries claim version {} of '{}' (runs: {})",
                at_top.len(),
                top,
                self.model_name,
                runs.join(", ")
            )));
        }

        let chosen = at_top.remove(0);
        Ok(Candidate {
            run_id: chosen.run_id,
            experiment_id: chosen.experiment_id,
            version: Some(chosen.version),
            source: StrategySource::Registered,
        })
    }
}

/// Run with the greatest recorded start time, regardless of listing order
pub struct LatestStartTime {
    experiment_name: String,
}

impl LatestStartTime {
    pub fn new(experiment_name: impl Into<String>) -> Self {
        Self {
            experiment_name: experiment_name.into(),
        }
    }
}

impl ResolutionStrategy for LatestStartTime {
    fn describe(&self) -> String {
        format!("latest run of experiment '{}'", self.experiment_name)
    }

    fn select(&self, store: &dyn RunStore) -> Result<Candidate> {
        if self.experiment_name.trim().is_empty() {
            return Err(ServiceError::Validation(
                "experiment name must not be empty".to_string(),
            ));
        }

        let experiment = store.find_experiment(&self.experiment_name)?;
        let mut runs = store.list_runs(&experiment.experiment_id)?;
        if runs.is_empty() {
            return Err(ServiceError::NotFound(format!(
                "experiment '{}' has no runs",
                self.experiment_name
            )));
        }

        runs.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        if runs.len() > 1 && runs[0].start_time == runs[1].start_time {
            return Err(ServiceError::Ambiguous(format!(
                "runs {} and {} share the latest start time {}",
                runs[0].run_id,
                runs[1].run_id,
                runs[0].start_time.to_rfc3339()
            )));
        }

        let latest = runs.swap_remove(0);
        Ok(Candidate {
            run_id: latest.run_id,
            experiment_id: latest.experiment_id,
            version: None,
            source: StrategySource::LatestRun,
        })
    }
}
