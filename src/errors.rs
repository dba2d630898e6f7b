// Error taxonomy and user-friendly messages
//
// `ServiceError` is the typed error shared by the tracking store, resolver,
// trainer and monitor. The HTTP layer maps each kind onto a status code;
// the CLI wraps it with actionable hints.

use anyhow::Context;
use std::fmt;
use thiserror::Error;

/// Result alias for library code
pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed or out-of-domain input (surfaced as 422)
    #[error("{0}")]
    Validation(String),

    /// Experiment, run, or registered model absent
    #[error("not found: {0}")]
    NotFound(String),

    /// More than one candidate at the same rank
    #[error("ambiguous model resolution: {0}")]
    Ambiguous(String),

    /// Artifact present but unusable (corrupt or incompatible)
    #[error("failed to load model artifact: {0}")]
    Load(String),

    /// Notification delivery failed
    #[error("notification transport failed: {0}")]
    Transport(String),

    /// Training data unreadable or wrong schema
    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ServiceError {
    /// Short machine-readable kind, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Ambiguous(_) => "ambiguous",
            ServiceError::Load(_) => "load",
            ServiceError::Transport(_) => "transport",
            ServiceError::Dataset(_) => "dataset",
            ServiceError::Io(_) => "io",
            ServiceError::Serialization(_) => "serialization",
        }
    }

    /// True for failures that mean "nothing to serve yet" rather than breakage
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ServiceError::NotFound(_) | ServiceError::Ambiguous(_))
    }
}

/// Wrap an error with user-friendly context
pub trait UserFriendlyError {
    /// Add user-friendly context with a suggestion
    fn user_context_with_suggestion(self, problem: &str, suggestion: &str) -> Self;
}

impl<T> UserFriendlyError for anyhow::Result<T> {
    fn user_context_with_suggestion(self, problem: &str, suggestion: &str) -> Self {
        self.with_context(|| wrap_error_with_suggestion(problem, suggestion))
    }
}

/// Format a missing tracking store error with helpful suggestions
pub fn tracking_store_missing_error(path: &str) -> String {
    format!(
        "Tracking store not found at {}\n\n\
        \x1b[1;33mPossible causes:\x1b[0m\n\
        • No model has been trained yet\n\
        • HOUSING_TRACKING_URI points somewhere else\n\n\
        \x1b[1;32mTry:\x1b[0m\n\
        1. Train a model:\n\
           \x1b[36mhousing-predictor train --data data/housing.csv\x1b[0m\n\n\
        2. Check the configured location:\n\
           \x1b[36mecho $HOUSING_TRACKING_URI\x1b[0m",
        path
    )
}

/// Format a dataset error with helpful suggestions
pub fn dataset_error(path: &str, error: &str) -> String {
    format!(
        "Failed to read training data from {}\n\n\
        \x1b[1;33mError:\x1b[0m {}\n\n\
        \x1b[1;32mTry:\x1b[0m\n\
        1. Check that the file is a CSV with a header row\n\
        2. Make sure it has numeric `area` and `price` columns:\n\
           \x1b[36mhead -3 {}\x1b[0m",
        path, error, path
    )
}

/// Wrap a generic error with suggestions
pub fn wrap_error_with_suggestion(error: impl fmt::Display, suggestion: &str) -> String {
    format!("{}\n\n\x1b[1;33mSuggestion:\x1b[0m {}", error, suggestion)
}
