// Configuration module
// Public interface for configuration loading

mod loader;
mod settings;

pub use loader::{apply_env_overrides, load_config, validate};
pub use settings::{CacheConfig, Config, MonitorConfig, ServerConfig, TrainingSettings};
