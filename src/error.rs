//! Error types for afinar
//!
//! Structural definition errors fail fast before any training starts;
//! per-vector labeling collisions are resolved algorithmically and only
//! logged, never raised.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Afinar error types
#[derive(Error, Debug)]
pub enum Error {
    /// A parameter name declared in both the static and explorable buckets
    #[error("parameter '{0}' defined both as static and explorable")]
    DuplicateParameter(String),

    /// One or more mandatory parameters absent from both buckets
    #[error("missing required parameters: [{}]", .0.join(", "))]
    MissingRequiredParameters(Vec<String>),

    /// Lookup of a tracked/final metric name that was never declared
    #[error("no tracked or final metric named '{0}'")]
    UnknownMetric(String),

    /// A results record that violates the ingestion schema
    #[error("malformed results record: {0}")]
    MalformedResults(String),

    /// Trainer collaborator failed while producing a model
    #[error("training failed for '{label}': {reason}")]
    Training {
        /// Label of the parameter vector being trained
        label: String,
        /// Collaborator-reported failure description
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
