// Tracking data types: experiments, runs, registered versions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::ServiceError;
use crate::models::{LinearModel, ModelManifest};

/// Named grouping of runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub experiment_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// One immutable training invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub run_name: String,
    pub experiment_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    /// Model artifact directory, relative to the run's `artifacts/`
    pub artifact_path: String,
}

/// Registry lifecycle label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    None,
    Staging,
    Production,
    Archived,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::None => "none",
            Stage::Staging => "staging",
            Stage::Production => "production",
            Stage::Archived => "archived",
        };
        f.write_str(name)
    }
}

impl FromStr for Stage {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Stage::None),
            "staging" => Ok(Stage::Staging),
            "production" => Ok(Stage::Production),
            "archived" => Ok(Stage::Archived),
            other => Err(ServiceError::Validation(format!(
                "unknown stage '{}' (expected none, staging, production or archived)",
                other
            ))),
        }
    }
}

/// A run's artifact promoted into the versioned serving namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub name: String,
    pub version: u32,
    pub run_id: String,
    pub experiment_id: String,
    #[serde(default)]
    pub stage: Stage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A loaded, verified model artifact
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub run_id: String,
    pub experiment_id: String,
    /// Where the artifact lives (a path for the file store)
    pub location: String,
    pub manifest: ModelManifest,
    pub model: LinearModel,
}
