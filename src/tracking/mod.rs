// Tracking module
// Experiments, runs, model artifacts and the model registry

mod file_store;
mod store;
mod types;

pub use file_store::{FileStore, RunBuilder};
pub use store::RunStore;
pub use types::{Experiment, ModelArtifact, ModelVersion, RunMetadata, Stage};
