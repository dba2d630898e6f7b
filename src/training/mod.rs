// Training module - dataset loading, deterministic split and the run-producing trainer

pub mod dataset;
pub mod split;
pub mod trainer;

pub use dataset::{load_csv, Dataset};
pub use split::{train_test_split, Split};
pub use trainer::{Trainer, TrainingConfig, TrainingResult, MODEL_TYPE};
