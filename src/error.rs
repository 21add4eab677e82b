//! Custom error types for journalscope.
//!
//! Every library function returns `Result<T, PipelineError>`. Per-unit failures
//! (one DOI, one author, one ISSN) are converted into ledger entries by the
//! stage that owns the unit; only stage-level failures reach the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for journalscope operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Connection-level failure reported by a non-reqwest transport
    #[error("Transport error: {0}")]
    Transport(String),

    /// Rate limited by external API
    #[error("Rate limited by {host} (HTTP {status})")]
    RateLimited {
        /// Host that refused the request
        host: String,
        /// Status code (429 or 503)
        status: u16,
    },

    /// External API returned a non-success status
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Error message
        message: String,
    },

    /// Response body did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// All attempts for one request failed
    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<PipelineError>,
    },

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV export error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Required stage input is absent
    #[error("Missing input: {0}")]
    MissingInput(PathBuf),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Validation error (malformed identifier and the like)
    #[error("Validation error: {0}")]
    Validation(String),
}

impl PipelineError {
    /// Whether another attempt at the same request could succeed.
    ///
    /// 5xx, 408, 429, timeouts and connection errors are transient. Other 4xx
    /// responses, malformed bodies and invalid identifiers are not.
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::Network(e) => !e.is_builder() && !e.is_decode(),
            PipelineError::Transport(_) => true,
            PipelineError::RateLimited { .. } => true,
            PipelineError::Api { code, .. } => *code >= 500 || *code == 408,
            _ => false,
        }
    }
}

/// Result type alias using `PipelineError`
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(PipelineError::Api { code: 503, message: String::new() }.is_transient());
        assert!(PipelineError::Api { code: 408, message: String::new() }.is_transient());
        assert!(!PipelineError::Api { code: 404, message: String::new() }.is_transient());
        assert!(PipelineError::Transport("reset".into()).is_transient());
        assert!(!PipelineError::Parse("bad".into()).is_transient());
        assert!(!PipelineError::Validation("bad id".into()).is_transient());
    }
}
