use thiserror::Error;

/// Local, pre-flight rejection of learner metrics. Never reaches the network.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("missing selection: choose both a course category and a device type")]
    MissingSelection,

    #[error("non-positive duration: time spent on course must be greater than 0")]
    NonPositiveDuration,

    #[error("{field} out of range: expected {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        expected: &'static str,
        value: f64,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("The prediction service is temporarily unavailable. Please try again in a moment.")]
    ServiceUnavailable,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Unable to connect to the prediction service. Please check your internet connection.")]
    Connectivity,

    #[error("{message} (HTTP {status})")]
    Server { status: u16, message: String },

    #[error("Unexpected response from the prediction service: {0}")]
    Protocol(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("Assistant API key not configured. Please check the backend configuration.")]
    Configuration,

    #[error("Request timed out. Please try again.")]
    Timeout,

    #[error("Invalid assistant API key. Please check your configuration.")]
    Auth,

    #[error("{message} (HTTP {status})")]
    Backend { status: u16, message: String },

    #[error("Unable to reach the assistant backend: {0}")]
    Connectivity(String),

    #[error("Unexpected response from the assistant backend: {0}")]
    Protocol(String),
}

/// Why one batch row produced no prediction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("unreadable row: {0}")]
    Unreadable(String),

    #[error(transparent)]
    Scoring(#[from] ScoringError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("API base URL '{0}' must use http or https")]
    UnsupportedScheme(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}
