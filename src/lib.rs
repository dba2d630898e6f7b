// Housing price predictor
// Library exports

pub mod config;
pub mod errors;
pub mod models; // Linear regression + artifact format
pub mod monitor; // Log error-rate alerting
pub mod resolver; // Which run is "the current model"
pub mod server; // HTTP prediction service
pub mod tracking; // Experiments, runs, registry
pub mod training;
