//! Common error types for PPD

use thiserror::Error;

/// Common result type for PPD operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across PPD crates
///
/// Computation failures are always local and synchronous; nothing in the
/// analysis pipeline retries.
#[derive(Error, Debug)]
pub enum Error {
    /// No data to compute over
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Value outside the configured valid interval (clamping disabled)
    #[error("Raw score out of range: {value}. Expected [{min}, {max}].")]
    Range { value: f64, min: f64, max: f64 },

    /// Normalization divisor is zero
    #[error("Division error: {0}")]
    Division(String),

    /// Adjacency requested over an empty dimension ordering
    #[error("Dimension ordering is empty")]
    EmptyOrder,

    /// Dimension named in an ordering is absent from the score map
    #[error("Missing score for dimension: {0}")]
    MissingDimension(String),

    /// Required field absent from a classifier input
    #[error("Missing required field: '{0}'")]
    MissingField(String),

    /// Predicate invoked while a threshold it depends on is null
    #[error("Threshold '{0}' is not configured")]
    ThresholdNotConfigured(String),

    /// Namespacing collision while building a score map
    #[error("Duplicate dimension key: {0}")]
    DuplicateKey(String),

    /// Input or output shape invariant broken
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
