//! Error types for the schema critic

use thiserror::Error;

use crate::graph::QualifiedName;

/// Result type for crate-level operations
pub type Result<T> = std::result::Result<T, CriticError>;

/// Fatal error while assembling a schema graph. No partial graph is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphConstructionError {
    #[error("Duplicate table in schema graph: {name}")]
    DuplicateTable { name: QualifiedName },

    #[error("Cannot fingerprint table {name}: {reason}")]
    Fingerprint { name: QualifiedName, reason: String },
}

/// Fatal configuration error, raised before any analysis stage runs
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Unknown intent priority: {0}")]
    UnknownPriority(String),

    #[error("Unknown intent preset: {0}")]
    UnknownPreset(String),

    #[error("Unknown pattern type: {0}")]
    UnknownPattern(String),

    #[error("Weight for {priority} must be within [0, 1], got {value}")]
    WeightOutOfRange { priority: String, value: f64 },

    #[error("Confidence threshold for {pattern} must be within [0, 1], got {value}")]
    ThresholdOutOfRange { pattern: String, value: f64 },

    #[error("Config error: {0}")]
    Source(#[from] config_crate::ConfigError),
}

/// A single rule failed internally. Isolated: recorded as a diagnostic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Rule '{rule}' failed: {message}")]
pub struct DetectionError {
    pub rule: String,
    pub message: String,
}

impl DetectionError {
    pub fn new(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            message: message.into(),
        }
    }
}

/// Errors raised at the introspection boundary
#[derive(Error, Debug)]
pub enum IntrospectionError {
    #[error("No introspector registered for dialect: {0}")]
    UnknownDialect(String),

    #[error("Introspection source missing: {0}")]
    MissingSource(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Graph(#[from] GraphConstructionError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Crate-level error
#[derive(Error, Debug)]
pub enum CriticError {
    #[error(transparent)]
    Graph(#[from] GraphConstructionError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Introspection(#[from] IntrospectionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
