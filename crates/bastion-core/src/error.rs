use thiserror::Error;

/// Application-wide error types for Bastion.
#[derive(Error, Debug)]
pub enum AppError {
    /// The target (or the extraction service on its behalf) answered with a
    /// non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// HTTP request failed for a reason other than a status code.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error (DNS, refused, reset).
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The extraction service reported a failure without a status code.
    #[error("Extraction error: {0}")]
    ExtractionError(String),

    /// Missing or malformed input, rejected at the boundary without retry.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Posting to a webhook target failed.
    #[error("Webhook error: {0}")]
    WebhookError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Reading or writing a local file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// HTTP status carried by the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AppError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true for errors that must be rejected at the boundary
    /// instead of going through the retry policy.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            AppError::InvalidInput(_) | AppError::SerializationError(_)
        )
    }
}
