// RunStore - read-side seam between the resolver and wherever runs live

use super::types::{Experiment, ModelArtifact, ModelVersion, RunMetadata};
use crate::errors::Result;

/// Read-only view of a tracking store.
///
/// All methods are reads against immutable data, so implementations must be
/// safe to call concurrently without extra locking. Listing order carries no
/// meaning; callers impose their own ordering.
pub trait RunStore: Send + Sync {
    /// Human-readable location, for logs and health output
    fn location(&self) -> String;

    /// Look up an experiment by name
    fn find_experiment(&self, name: &str) -> Result<Experiment>;

    /// All visible runs of an experiment, in no particular order
    fn list_runs(&self, experiment_id: &str) -> Result<Vec<RunMetadata>>;

    /// Metadata for a single run
    fn get_run(&self, run_id: &str) -> Result<RunMetadata>;

    /// Load and verify the run's model artifact
    fn load_artifact(&self, run_id: &str) -> Result<ModelArtifact>;

    /// Relative paths of every file under the run's artifacts
    fn list_artifacts(&self, run_id: &str) -> Result<Vec<String>>;

    /// Registered versions of a model, in no particular order.
    /// Unknown model names yield an empty list.
    fn list_versions(&self, model_name: &str) -> Result<Vec<ModelVersion>>;
}
