//! Error types for Fabula.
//!
//! A single error enum covers the whole engine. Collaborator failures
//! (embedding service, chat model, storage) are mapped into these variants
//! at the component boundary; raw transport or serde errors never cross a
//! crate API.

use thiserror::Error;

/// Result type alias used throughout Fabula.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Fabula operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Invalid input from the caller (empty document, bad character name, ...).
    ///
    /// Recovery: fix the input; the engine state is unchanged.
    #[error("Invalid input: {0}")]
    Input(String),

    /// Invalid configuration (zero chunk size, overlap >= size, missing API key).
    ///
    /// Recovery: correct the configuration before retrying.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transient failure in an external service.
    ///
    /// Recovery: retryable; the retry layer backs off and tries again.
    #[error("Service error: {0}")]
    Service(String),

    /// An external service stayed unavailable after retries were exhausted.
    ///
    /// Recovery: not retryable here; surface to the caller.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The external service rejected the request due to rate limiting.
    ///
    /// Recovery: retryable after backoff.
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// The external service rejected the request as malformed.
    ///
    /// Recovery: not retryable; the request itself must change.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// An operation exceeded its deadline.
    ///
    /// Recovery: retryable once; persistent timeouts become `ServiceUnavailable`.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Chapter or character analysis failed after the corrective retry.
    ///
    /// Recovery: the failed unit is skipped and reported; the batch continues.
    #[error("Extraction failed for chapter {chapter}: {message}")]
    Extraction {
        /// 1-based chapter number the failure belongs to.
        chapter: usize,
        /// What went wrong.
        message: String,
    },

    /// A search was issued against an index with no stored chunks.
    #[error("Search issued before any chunks were indexed")]
    EmptyIndex,

    /// Embedding failed for one or more chunk batches after a retry.
    ///
    /// The named chunks are not in the index; previously indexed chunks are
    /// untouched.
    #[error("Indexing failed for chunks {chunk_ids:?}")]
    Indexing {
        /// Ids of the chunks whose embedding failed.
        chunk_ids: Vec<usize>,
    },

    /// Model output could not be parsed into the expected schema.
    ///
    /// Recovery: retried once with a corrective instruction, then becomes
    /// `Extraction`.
    #[error("Output parsing failed: {0}")]
    OutputParsing(String),

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the retry layer may try the operation again.
    ///
    /// Only transient service-side conditions qualify. Everything the caller
    /// controls (input, configuration, request shape) is permanent.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Service(_) | Error::RateLimit(_) | Error::Timeout(_)
        )
    }

    /// Convenience constructor for transient service errors.
    pub fn service(message: impl Into<String>) -> Self {
        Error::Service(message.into())
    }
}
