// Local filesystem tracking store
//
// Layout:
//   <root>/<experiment_id>/meta.json                      experiment
//   <root>/<experiment_id>/<run_id>/meta.json             run
//   <root>/<experiment_id>/<run_id>/artifacts/model/...   model artifact
//   <root>/models/<name>/version-<n>/meta.json            registered version
//
// Runs are assembled under `<experiment_id>/.staging-<run_id>` and renamed
// into place once complete. Listings skip hidden entries, so readers only
// ever observe whole runs.

use chrono::Utc;
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::store::RunStore;
use super::types::{Experiment, ModelArtifact, ModelVersion, RunMetadata, Stage};
use crate::errors::{Result, ServiceError};
use crate::models::{load_model_artifact, save_model_artifact, LinearModel, ModelManifest};

const META_FILE: &str = "meta.json";
const ARTIFACTS_DIR: &str = "artifacts";
const REGISTRY_DIR: &str = "models";
const MODEL_ARTIFACT: &str = "model";
const LOCK_FILE: &str = ".lock";

/// Tracking store rooted at a local directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store handle. Nothing is created on disk until the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fetch the experiment with this name, creating it if needed
    pub fn get_or_create_experiment(&self, name: &str) -> Result<Experiment> {
        validate_name("experiment name", name)?;
        fs::create_dir_all(&self.root)?;

        // Serialize concurrent creators so a name maps to one experiment
        let _lock = lock_exclusive(&self.root.join(LOCK_FILE))?;

        match self.find_experiment(name) {
            Ok(experiment) => return Ok(experiment),
            Err(ServiceError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let experiment = Experiment {
            experiment_id: new_id(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        let dir = self.root.join(&experiment.experiment_id);
        fs::create_dir_all(&dir)?;
        write_json_atomic(&dir.join(META_FILE), &experiment)?;

        tracing::info!(
            experiment_id = %experiment.experiment_id,
            name = %name,
            "Created experiment"
        );
        Ok(experiment)
    }

    /// Start assembling a new run. It stays invisible until `finish`.
    pub fn begin_run(&self, experiment: &Experiment, run_name: &str) -> Result<RunBuilder> {
        let run_id = new_id();
        let experiment_dir = self.root.join(&experiment.experiment_id);
        if !experiment_dir.join(META_FILE).exists() {
            return Err(ServiceError::NotFound(format!(
                "experiment directory {}",
                experiment_dir.display()
            )));
        }

        let staging_dir = experiment_dir.join(format!(".staging-{}", run_id));
        fs::create_dir_all(staging_dir.join(ARTIFACTS_DIR))?;

        Ok(RunBuilder {
            final_dir: experiment_dir.join(&run_id),
            staging_dir,
            meta: RunMetadata {
                run_id,
                run_name: run_name.to_string(),
                experiment_id: experiment.experiment_id.clone(),
                start_time: Utc::now(),
                end_time: Utc::now(),
                params: Default::default(),
                metrics: Default::default(),
                artifact_path: MODEL_ARTIFACT.to_string(),
            },
            finished: false,
        })
    }

    /// Promote a run's model into the registry under the next version number
    pub fn register_model(&self, name: &str, run_id: &str) -> Result<ModelVersion> {
        validate_name("registered model name", name)?;
        let run = self.get_run(run_id)?;

        let model_dir = self.root.join(REGISTRY_DIR).join(name);
        fs::create_dir_all(&model_dir)?;
        let _lock = lock_exclusive(&model_dir.join(LOCK_FILE))?;

        let next = self
            .list_versions(name)?
            .iter()
            .map(|v| v.version)
            .max()
            .unwrap_or(0)
            + 1;

        let now = Utc::now();
        let version = ModelVersion {
            name: name.to_string(),
            version: next,
            run_id: run.run_id,
            experiment_id: run.experiment_id,
            stage: Stage::None,
            created_at: now,
            updated_at: now,
        };
        let version_dir = model_dir.join(format!("version-{}", next));
        fs::create_dir_all(&version_dir)?;
        write_json_atomic(&version_dir.join(META_FILE), &version)?;

        tracing::info!(
            model = %name,
            version = next,
            run_id = %version.run_id,
            "Registered model version"
        );
        Ok(version)
    }

    /// Move a registered version to another stage
    pub fn transition_stage(&self, name: &str, version: u32, stage: Stage) -> Result<ModelVersion> {
        validate_name("registered model name", name)?;
        let model_dir = self.root.join(REGISTRY_DIR).join(name);
        let meta_path = model_dir.join(format!("version-{}", version)).join(META_FILE);
        if !meta_path.exists() {
            return Err(ServiceError::NotFound(format!(
                "registered model '{}' version {}",
                name, version
            )));
        }

        let _lock = lock_exclusive(&model_dir.join(LOCK_FILE))?;
        let mut entry: ModelVersion = read_json(&meta_path)?;
        let previous = entry.stage;
        entry.stage = stage;
        entry.updated_at = Utc::now();
        write_json_atomic(&meta_path, &entry)?;

        tracing::info!(
            model = %name,
            version = version,
            from = %previous,
            to = %stage,
            "Transitioned model stage"
        );
        Ok(entry)
    }

    fn ensure_root(&self) -> Result<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(ServiceError::NotFound(format!(
                "tracking store {}",
                self.root.display()
            )))
        }
    }

    /// Directories directly under `dir` that carry a `meta.json`
    fn meta_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if !hidden && path.is_dir() && path.join(META_FILE).is_file() {
                dirs.push(path);
            }
        }
        Ok(dirs)
    }

    fn experiments(&self) -> Result<Vec<(PathBuf, Experiment)>> {
        self.ensure_root()?;
        let mut experiments = Vec::new();
        for dir in Self::meta_dirs(&self.root)? {
            match read_json::<Experiment>(&dir.join(META_FILE)) {
                Ok(experiment) => experiments.push((dir, experiment)),
                Err(e) => {
                    tracing::warn!(path = ?dir, error = %e, "Skipping unreadable experiment");
                }
            }
        }
        Ok(experiments)
    }

    fn run_dir(&self, run_id: &str) -> Result<PathBuf> {
        validate_name("run id", run_id)?;
        for (dir, _) in self.experiments()? {
            let candidate = dir.join(run_id);
            if candidate.join(META_FILE).is_file() {
                return Ok(candidate);
            }
        }
        Err(ServiceError::NotFound(format!("run {}", run_id)))
    }
}

impl RunStore for FileStore {
    fn location(&self) -> String {
        self.root.display().to_string()
    }

    fn find_experiment(&self, name: &str) -> Result<Experiment> {
        validate_name("experiment name", name)?;
        let mut matches: Vec<Experiment> = self
            .experiments()?
            .into_iter()
            .map(|(_, experiment)| experiment)
            .filter(|experiment| experiment.name == name)
            .collect();

        match matches.len() {
            0 => Err(ServiceError::NotFound(format!("experiment '{}'", name))),
            1 => Ok(matches.remove(0)),
            n => Err(ServiceError::Ambiguous(format!(
                "{} experiments are named '{}'",
                n, name
            ))),
        }
    }

    fn list_runs(&self, experiment_id: &str) -> Result<Vec<RunMetadata>> {
        validate_name("experiment id", experiment_id)?;
        self.ensure_root()?;
        let experiment_dir = self.root.join(experiment_id);
        if !experiment_dir.is_dir() {
            return Err(ServiceError::NotFound(format!(
                "experiment directory {}",
                experiment_dir.display()
            )));
        }

        let mut runs = Vec::new();
        for dir in Self::meta_dirs(&experiment_dir)? {
            match read_json::<RunMetadata>(&dir.join(META_FILE)) {
                Ok(run) => runs.push(run),
                Err(e) => {
                    tracing::warn!(path = ?dir, error = %e, "Skipping unreadable run metadata");
                }
            }
        }
        Ok(runs)
    }

    fn get_run(&self, run_id: &str) -> Result<RunMetadata> {
        let dir = self.run_dir(run_id)?;
        read_json(&dir.join(META_FILE))
    }

    fn load_artifact(&self, run_id: &str) -> Result<ModelArtifact> {
        let dir = self.run_dir(run_id)?;
        let run: RunMetadata = read_json(&dir.join(META_FILE))?;
        let artifact_dir = dir.join(ARTIFACTS_DIR).join(&run.artifact_path);
        let (manifest, model) = load_model_artifact(&artifact_dir)?;

        Ok(ModelArtifact {
            run_id: run.run_id,
            experiment_id: run.experiment_id,
            location: artifact_dir.display().to_string(),
            manifest,
            model,
        })
    }

    fn list_artifacts(&self, run_id: &str) -> Result<Vec<String>> {
        let base = self.run_dir(run_id)?.join(ARTIFACTS_DIR);
        if !base.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&base).min_depth(1) {
            let entry = entry.map_err(|e| ServiceError::Io(e.into()))?;
            if entry.file_type().is_file() {
                if let Ok(relative) = entry.path().strip_prefix(&base) {
                    files.push(relative.to_string_lossy().replace('\\', "/"));
                }
            }
        }
        files.sort();
        Ok(files)
    }

    fn list_versions(&self, model_name: &str) -> Result<Vec<ModelVersion>> {
        validate_name("registered model name", model_name)?;
        let model_dir = self.root.join(REGISTRY_DIR).join(model_name);
        if !model_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        for dir in Self::meta_dirs(&model_dir)? {
            match read_json::<ModelVersion>(&dir.join(META_FILE)) {
                Ok(version) => versions.push(version),
                Err(e) => {
                    tracing::warn!(path = ?dir, error = %e, "Skipping unreadable model version");
                }
            }
        }
        Ok(versions)
    }
}

/// A run being written. Dropped without `finish`, its staging directory is removed.
pub struct RunBuilder {
    staging_dir: PathBuf,
    final_dir: PathBuf,
    meta: RunMetadata,
    finished: bool,
}

impl RunBuilder {
    pub fn run_id(&self) -> &str {
        &self.meta.run_id
    }

    pub fn log_param(&mut self, key: &str, value: impl ToString) {
        self.meta.params.insert(key.to_string(), value.to_string());
    }

    pub fn log_metric(&mut self, key: &str, value: f64) {
        self.meta.metrics.insert(key.to_string(), value);
    }

    /// Persist the run's model artifact
    pub fn log_model(&self, model: &LinearModel, input_example: &[f64]) -> Result<ModelManifest> {
        let dir = self.artifact_dir(&self.meta.artifact_path);
        save_model_artifact(&dir, model, input_example)
    }

    /// Directory for an auxiliary artifact group (e.g. "plots"), created on demand
    pub fn artifact_dir(&self, name: &str) -> PathBuf {
        self.staging_dir.join(ARTIFACTS_DIR).join(name)
    }

    /// Write metadata and publish the run
    pub fn finish(mut self) -> Result<RunMetadata> {
        if !model_artifact_written(&self.staging_dir, &self.meta.artifact_path) {
            return Err(ServiceError::Validation(
                "a run must log a model before it is finished".to_string(),
            ));
        }

        self.meta.end_time = Utc::now();
        write_json_atomic(&self.staging_dir.join(META_FILE), &self.meta)?;
        fs::rename(&self.staging_dir, &self.final_dir)?;
        self.finished = true;

        tracing::info!(
            run_id = %self.meta.run_id,
            experiment_id = %self.meta.experiment_id,
            "Published run"
        );
        Ok(self.meta.clone())
    }
}

impl Drop for RunBuilder {
    fn drop(&mut self) {
        if !self.finished && self.staging_dir.exists() {
            if let Err(e) = fs::remove_dir_all(&self.staging_dir) {
                tracing::warn!(path = ?self.staging_dir, error = %e, "Failed to clean up staging run");
            }
        }
    }
}

fn model_artifact_written(staging_dir: &Path, artifact_path: &str) -> bool {
    crate::models::persistence::model_exists(&staging_dir.join(ARTIFACTS_DIR).join(artifact_path))
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Names become path components, so keep them to a single plain segment
fn validate_name(what: &str, value: &str) -> Result<()> {
    let bad = value.trim().is_empty()
        || value.starts_with('.')
        || value.contains(['/', '\\'])
        || value.contains("..");
    if bad {
        return Err(ServiceError::Validation(format!("invalid {}: '{}'", what, value)));
    }
    Ok(())
}

fn lock_exclusive(path: &Path) -> Result<File> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)?;
    FileExt::lock_exclusive(&file)?;
    Ok(file)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
