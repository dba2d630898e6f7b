// Configuration structs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::resolver::{CachePolicy, ResolverSettings};
use crate::tracking::Stage;
use crate::training::TrainingConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tracking store location (`file:///abs/path` or a plain path)
    pub tracking_uri: String,

    /// Experiment that training writes to and the fallback resolver reads
    pub experiment_name: String,

    /// Registered model to serve, if the registry is in use
    pub registered_model: Option<String>,

    /// Only serve registered versions in this stage
    pub model_stage: Option<Stage>,

    /// Serve exactly this run, bypassing every other policy
    pub pinned_run: Option<String>,

    pub cache: CacheConfig,
    pub server: ServerConfig,
    pub training: TrainingSettings,
    pub monitor: MonitorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tracking_uri: "mlruns".to_string(),
            experiment_name: "Housing-Regression".to_string(),
            registered_model: None,
            model_stage: None,
            pinned_run: None,
            cache: CacheConfig::default(),
            server: ServerConfig::default(),
            training: TrainingSettings::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl Config {
    /// Filesystem root of the tracking store
    pub fn tracking_dir(&self) -> anyhow::Result<PathBuf> {
        let uri = self.tracking_uri.trim();
        if let Some(rest) = uri.strip_prefix("file://") {
            // file:///abs -> /abs ; file://relative -> relative
            return Ok(PathBuf::from(rest));
        }
        if uri.contains("://") {
            anyhow::bail!(
                "Unsupported tracking URI '{}': only local paths and file:// URIs are supported",
                uri
            );
        }
        Ok(PathBuf::from(uri))
    }

    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            experiment_name: self.experiment_name.clone(),
            registered_model: self.registered_model.clone(),
            stage: self.model_stage,
            pinned_run: self.pinned_run.clone(),
        }
    }

    pub fn training_config(&self) -> TrainingConfig {
        TrainingConfig {
            data_path: self.training.data_path.clone(),
            feature: self.training.feature.clone(),
            target: self.training.target.clone(),
            test_size: self.training.test_size,
            random_seed: self.training.random_seed,
            experiment_name: self.experiment_name.clone(),
            run_name: self.training.run_name.clone(),
        }
    }
}

/// Model cache behaviour of the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// startup | ttl | per_request
    pub policy: String,
    /// Entry lifetime for the `ttl` policy
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            policy: "startup".to_string(),
            ttl_seconds: 300,
        }
    }
}

impl CacheConfig {
    pub fn policy(&self) -> crate::errors::Result<CachePolicy> {
        CachePolicy::parse(&self.policy, self.ttl_seconds)
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8000")
    pub bind_address: String,
    /// Log file the server appends to (read by the monitor)
    pub log_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
            log_file: Some(PathBuf::from("logs/logs.txt")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    pub data_path: PathBuf,
    pub feature: String,
    pub target: String,
    pub test_size: f64,
    pub random_seed: u64,
    pub run_name: String,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        let defaults = TrainingConfig::default();
        Self {
            data_path: defaults.data_path,
            feature: defaults.feature,
            target: defaults.target,
            test_size: defaults.test_size,
            random_seed: defaults.random_seed,
            run_name: defaults.run_name,
        }
    }
}

/// Log monitor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub log_file: PathBuf,
    /// Slack-compatible incoming webhook; alerts are only logged when unset
    pub webhook_url: Option<String>,
    /// Alert when error_lines / total_lines exceeds this
    pub error_threshold: f64,
    /// Minimum seconds between two alerts
    pub alert_interval_secs: u64,
    pub poll_interval_secs: u64,
    /// Regex marking a line as an error
    pub error_pattern: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("logs/logs.txt"),
            webhook_url: None,
            error_threshold: 0.3,
            alert_interval_secs: 15 * 60,
            poll_interval_secs: 10,
            error_pattern: r"\bERROR\b".to_string(),
        }
    }
}

impl MonitorConfig {
    pub fn alert_interval(&self) -> Duration {
        Duration::from_secs(self.alert_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}
