//! Error types for predictor configuration and validation.

use crate::config::Framework;
use thiserror::Error;

/// Problems with the framework registry.
///
/// These surface at load time so a misconfigured registry never reaches the
/// defaulting pass.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// The registry has no entry for a supported framework
    #[error("no predictor configuration found for framework '{}'", .framework.key())]
    MissingFramework { framework: Framework },

    /// A required field of a framework entry is empty
    #[error("predictor configuration for '{}' is missing '{field}'", .framework.key())]
    MissingDefault {
        framework: Framework,
        field: &'static str,
    },

    /// The `ConfigMap` exists but does not carry the expected key
    #[error("ConfigMap is missing key '{key}'")]
    MissingKey { key: String },

    /// The predictor table could not be parsed
    #[error("failed to parse predictor configuration: {0}")]
    Parse(String),

    #[error("failed to read predictor configuration {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch predictor configuration: {0}")]
    Kube(#[from] kube::Error),
}

/// Reasons a predictor or `InferenceService` is rejected.
///
/// The display text is returned verbatim to the user by admission, so each
/// variant reads as a complete sentence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// GPU resources requested, but the image tag is a CPU build
    #[error("{framework} RuntimeVersion is not GPU enabled but GPU resources are requested.")]
    RuntimeIncludesGpu { framework: Framework },

    /// GPU image tag selected, but no GPU resources requested
    #[error("{framework} RuntimeVersion is GPU enabled but GPU resources are not requested.")]
    RuntimeExcludesGpu { framework: Framework },

    #[error("Expected storageUri file extension to be {expected} but got {actual}")]
    InvalidStorageUriExtension { expected: String, actual: String },

    #[error("Exactly one of [{frameworks}] must be specified in PredictorSpec")]
    NoPredictor { frameworks: String },

    #[error("Exactly one of [{frameworks}] must be specified in PredictorSpec, got [{specified}]")]
    MultiplePredictors {
        frameworks: String,
        specified: String,
    },

    #[error("InferenceService name '{name}' must consist of lower case alphanumeric characters or '-', start with an alphabetic character, and end with an alphanumeric character")]
    InvalidName { name: String },

    #[error("{0}")]
    InvalidReplicas(String),

    #[error("Parallelism cannot be less than 0, got {0}")]
    InvalidParallelism(i32),

    #[error("CanaryTrafficPercent must be between 0 and 100, got {0}")]
    InvalidCanaryTrafficPercent(i32),

    #[error("CanaryTrafficPercent is set but no canary endpoint is specified")]
    CanaryTrafficWithoutCanary,
}

/// Top-level error for callers that drive the full admit pipeline.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Type alias for `Result` with the crate error
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Whether the failure is caused by the submitted object rather than the
    /// platform configuration
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        !matches!(self, Error::Configuration(_))
    }
}
