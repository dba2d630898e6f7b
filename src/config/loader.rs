// Configuration loader
// Reads an optional TOML file, then applies environment overrides

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::settings::Config;

const LOCAL_CONFIG: &str = "housing.toml";

/// Load configuration from `path`, or the first default location that exists.
///
/// Search order without an explicit path: `./housing.toml`, then
/// `<config dir>/housing-predictor/config.toml`. With no file at all the
/// built-in defaults are used. Environment variables always win.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => load_file(path)?,
        None => match default_config_path() {
            Some(found) => load_file(&found)?,
            None => Config::default(),
        },
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("housing-predictor").join("config.toml"))
        .filter(|p| p.is_file())
}

fn load_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    tracing::debug!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// Apply environment overrides through `lookup` (injectable for tests).
/// Empty values are treated as unset.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(uri) = get("HOUSING_TRACKING_URI").or_else(|| get("MLFLOW_TRACKING_URI")) {
        config.tracking_uri = uri;
    }
    if let Some(name) = get("HOUSING_EXPERIMENT") {
        config.experiment_name = name;
    }
    if let Some(name) = get("HOUSING_REGISTERED_MODEL") {
        config.registered_model = Some(name);
    }
    if let Some(stage) = get("HOUSING_MODEL_STAGE") {
        config.model_stage = Some(stage.parse().context("HOUSING_MODEL_STAGE")?);
    }
    if let Some(run_id) = get("HOUSING_MODEL_RUN") {
        config.pinned_run = Some(run_id);
    }
    if let Some(policy) = get("HOUSING_CACHE_POLICY") {
        config.cache.policy = policy;
    }
    if let Some(ttl) = get("HOUSING_CACHE_TTL_SECS") {
        config.cache.ttl_seconds = parse_env("HOUSING_CACHE_TTL_SECS", &ttl)?;
    }
    if let Some(bind) = get("HOUSING_BIND") {
        config.server.bind_address = bind;
    }
    if let Some(log_file) = get("HOUSING_LOG_FILE") {
        config.server.log_file = Some(PathBuf::from(&log_file));
        config.monitor.log_file = PathBuf::from(log_file);
    }
    if let Some(url) = get("SLACK_WEBHOOK_URL") {
        config.monitor.webhook_url = Some(url);
    }
    if let Some(threshold) = get("HOUSING_ERROR_THRESHOLD") {
        config.monitor.error_threshold = parse_env("HOUSING_ERROR_THRESHOLD", &threshold)?;
    }
    if let Some(secs) = get("HOUSING_ALERT_INTERVAL_SECS") {
        config.monitor.alert_interval_secs = parse_env("HOUSING_ALERT_INTERVAL_SECS", &secs)?;
    }
    if let Some(secs) = get("HOUSING_POLL_INTERVAL_SECS") {
        config.monitor.poll_interval_secs = parse_env("HOUSING_POLL_INTERVAL_SECS", &secs)?;
    }

    Ok(())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    match value.trim().parse() {
        Ok(parsed) => Ok(parsed),
        Err(_) => bail!("{} has an invalid value: '{}'", key, value),
    }
}

/// Reject configurations that would fail later in a less obvious place
pub fn validate(config: &Config) -> Result<()> {
    if config.experiment_name.trim().is_empty() {
        bail!("experiment_name must not be empty");
    }
    config.tracking_dir()?;
    config.cache.policy().context("Invalid cache policy")?;

    let threshold = config.monitor.error_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        bail!("monitor.error_threshold must be within [0, 1], got {}", threshold);
    }
    let test_size = config.training.test_size;
    if !(test_size > 0.0 && test_size < 1.0) {
        bail!("training.test_size must be within (0, 1), got {}", test_size);
    }
    regex::Regex::new(&config.monitor.error_pattern).context("Invalid monitor.error_pattern")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::Stage;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        validate(&config).unwrap();
        assert_eq!(config.experiment_name, "Housing-Regression");
        assert_eq!(config.monitor.error_threshold, 0.3);
        assert_eq!(config.monitor.alert_interval_secs, 900);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("MLFLOW_TRACKING_URI", "file:///app/mlruns"),
                ("HOUSING_REGISTERED_MODEL", "HousingPricePredictor"),
                ("HOUSING_MODEL_STAGE", "production"),
                ("SLACK_WEBHOOK_URL", "https://hooks.example/abc"),
                ("HOUSING_ERROR_THRESHOLD", "0.5"),
                ("HOUSING_CACHE_POLICY", ""),
            ]),
        )
        .unwrap();

        assert_eq!(config.tracking_dir().unwrap(), PathBuf::from("/app/mlruns"));
        assert_eq!(config.registered_model.as_deref(), Some("HousingPricePredictor"));
        assert_eq!(config.model_stage, Some(Stage::Production));
        assert_eq!(config.monitor.webhook_url.as_deref(), Some("https://hooks.example/abc"));
        assert_eq!(config.monitor.error_threshold, 0.5);
        // Empty values do not override
        assert_eq!(config.cache.policy, "startup");
    }

    #[test]
    fn test_housing_uri_beats_mlflow_uri() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("MLFLOW_TRACKING_URI", "/a"),
                ("HOUSING_TRACKING_URI", "/b"),
            ]),
        )
        .unwrap();
        assert_eq!(config.tracking_uri, "/b");
    }

    #[test]
    fn test_invalid_env_value_rejected() {
        let mut config = Config::default();
        let result = apply_env_overrides(&mut config, env(&[("HOUSING_CACHE_TTL_SECS", "soon")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_remote_uri_rejected() {
        let config = Config {
            tracking_uri: "http://127.0.0.1:5000".to_string(),
            ..Config::default()
        };
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_toml_file_partial() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("housing.toml");
        fs::write(
            &path,
            r#"
experiment_name = "Staging-Exp"

[cache]
policy = "ttl"
ttl_seconds = 60

[monitor]
error_threshold = 0.1
"#,
        )
        .unwrap();

        let config = load_file(&path).unwrap();
        assert_eq!(config.experiment_name, "Staging-Exp");
        assert_eq!(config.cache.ttl_seconds, 60);
        assert_eq!(config.monitor.error_threshold, 0.1);
        // Untouched sections keep defaults
        assert_eq!(config.server.bind_address, "127.0.0.1:8000");
    }
}
