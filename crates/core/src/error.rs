//! Error types for the Deep Researcher domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Client mistakes, load failures, and processing failures are kept apart so
//! the HTTP layer can map each to the right status class.

use thiserror::Error;

/// The top-level error type for request handling.
#[derive(Debug, Error)]
pub enum Error {
    // --- Client errors ---
    #[error("{0}")]
    Validation(String),

    // --- Resource lifecycle ---
    #[error(transparent)]
    Init(#[from] InitError),

    // --- Capability errors ---
    #[error("Research error: {0}")]
    Research(#[from] ResearchError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Why the research capability could not be brought up.
///
/// Cloneable: a failed load is cached and replayed verbatim to every later
/// caller instead of being retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InitError {
    #[error("Failed to load agent: {0}")]
    Construction(String),

    #[error("Failed to load agent: construction did not finish within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Failed to load agent: construction panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone, Error)]
pub enum ResearchError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Model download failed: {0}")]
    Download(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error("Capability not available: {0}")]
    Unavailable(String),

    #[error("Processing failed: {0}")]
    Processing(String),
}

impl From<ResearchError> for InitError {
    fn from(err: ResearchError) -> Self {
        InitError::Construction(err.to_string())
    }
}

impl From<std::io::Error> for ResearchError {
    fn from(err: std::io::Error) -> Self {
        ResearchError::Corpus(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_error_carries_cause() {
        let err: InitError = ResearchError::ModelNotFound("all-MiniLM-L6-v2".into()).into();
        let msg = err.to_string();
        assert!(msg.starts_with("Failed to load agent"));
        assert!(msg.contains("all-MiniLM-L6-v2"));
    }

    #[test]
    fn init_error_replays_identically() {
        let err = InitError::Timeout { timeout_ms: 30_000 };
        let replay = err.clone();
        assert_eq!(err, replay);
        assert_eq!(err.to_string(), replay.to_string());
        assert!(err.to_string().contains("30000ms"));
    }

    #[test]
    fn validation_error_displays_bare_message() {
        let err = Error::Validation("query must not be empty".into());
        assert_eq!(err.to_string(), "query must not be empty");
    }

    #[test]
    fn init_error_is_transparent_at_top_level() {
        let err = Error::from(InitError::Construction("out of memory".into()));
        assert_eq!(err.to_string(), "Failed to load agent: out of memory");
    }
}
