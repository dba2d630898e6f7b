// Regression model, evaluation metrics and on-disk artifact format

mod linear;
pub mod metrics;
pub mod persistence;

pub use linear::LinearModel;
pub use metrics::RegressionMetrics;
pub use persistence::{load_model_artifact, save_model_artifact, ColumnSpec, ModelManifest};
