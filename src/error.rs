//! Error types for higlass-manage

use thiserror::Error;

/// Errors that can occur while managing instances and ingesting datasets
#[derive(Error, Debug)]
pub enum ManageError {
    /// File format or data category could not be determined
    #[error("{message}{}", suggestion_text(.suggestion))]
    TypeInference {
        message: String,
        suggestion: Option<String>,
    },

    /// A required companion input is missing or the request combination is unsupported
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The instance's HTTP API could not be reached
    #[error("Registry unavailable: {0}")]
    RegistryUnavailable(String),

    /// The instance's HTTP API answered with an error status
    #[error("Registry error: HTTP {status}: {message}")]
    Registry { status: u16, message: String },

    /// The in-instance registration command exited non-zero
    #[error("Registration command failed (exit code {exit_code}): {output}")]
    Registration { exit_code: i64, output: String },

    /// Container runtime errors
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    /// No container exists for the requested instance
    #[error("Instance not running: {0}")]
    InstanceNotFound(String),

    /// Interval aggregation failed
    #[error("Aggregation error: {0}")]
    Aggregation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

fn suggestion_text(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (you may want to try: {})", s),
        None => String::new(),
    }
}

impl ManageError {
    /// Create a new type inference error
    pub fn type_inference(msg: impl Into<String>, suggestion: Option<String>) -> Self {
        Self::TypeInference {
            message: msg.into(),
            suggestion,
        }
    }

    /// Create a new precondition error
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new lifecycle error
    pub fn lifecycle(msg: impl Into<String>) -> Self {
        Self::Lifecycle(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type for higlass-manage operations
pub type ManageResult<T> = std::result::Result<T, ManageError>;
