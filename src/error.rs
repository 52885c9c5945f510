use thiserror::Error;

/// Main error type for apigraph
#[derive(Error, Debug)]
pub enum ApigraphError {
    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reading errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Graph invariant violations (wrong edge endpoints, unknown nodes)
    #[error("Graph error: {0}")]
    Graph(String),

    /// Transient semantic service failure (timeout, throttling, 5xx, network)
    #[error("Semantic service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Hard semantic service failure (credentials, malformed request)
    #[error("Semantic service rejected request: {0}")]
    ServiceRejected(String),

    /// Semantic service answered with something we cannot use
    #[error("Semantic service response error: {0}")]
    ServiceResponse(String),

    /// Export errors
    #[error("Export error: {0}")]
    Export(String),
}

impl ApigraphError {
    /// True for failures worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApigraphError::ServiceUnavailable(_))
    }
}

/// Convenient Result type using ApigraphError
pub type Result<T> = std::result::Result<T, ApigraphError>;
