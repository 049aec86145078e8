//! Custom error types for paperdigest.
//!
//! Every library function returns `Result<T, DigestError>`. Per-item errors
//! (`Auth`, `ContentNotFound`, `UndersizedDocument`, `RemoteCall`) are caught
//! by the stage drivers; the rest are setup or plumbing failures.

use thiserror::Error;

/// Main error type for paperdigest operations.
#[derive(Debug, Error)]
pub enum DigestError {
    /// Login to the institutional proxy could not be completed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The article content region never appeared
    #[error("Content not found for {id}")]
    ContentNotFound {
        /// Work item identifier
        id: String,
    },

    /// The assembled document is too small to be a full article
    #[error("Document {id} is {bytes} bytes, below the {min} byte minimum")]
    UndersizedDocument {
        /// Work item identifier
        id: String,
        /// Size of the staged artifact
        bytes: u64,
        /// Required minimum size
        min: u64,
    },

    /// A summarization or upload call failed
    #[error("{service} call failed: {message}")]
    RemoteCall {
        /// Remote service name
        service: &'static str,
        /// Failure description
        message: String,
    },

    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// External API returned an error status
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: i32,
        /// Error message from API
        message: String,
    },

    /// HTML or response parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A stage was started with nothing to process
    #[error("Nothing to process: {0}")]
    EmptyBatch(String),
}

impl DigestError {
    /// Shorthand for a Gemini/Notion failure
    pub fn remote(service: &'static str, message: impl Into<String>) -> Self {
        Self::RemoteCall {
            service,
            message: message.into(),
        }
    }
}

/// Result type alias using `DigestError`
pub type Result<T> = std::result::Result<T, DigestError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| DigestError::Parse(msg.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undersized_message() {
        let err = DigestError::UndersizedDocument {
            id: "j.cities.2024.1".to_string(),
            bytes: 812,
            min: 4096,
        };
        assert_eq!(
            err.to_string(),
            "Document j.cities.2024.1 is 812 bytes, below the 4096 byte minimum"
        );
    }

    #[test]
    fn test_ok_or_parse() {
        let missing: Option<u8> = None;
        assert!(matches!(missing.ok_or_parse("no value"), Err(DigestError::Parse(_))));
    }
}
