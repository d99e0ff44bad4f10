//! Splitter error types.

use thiserror::Error;

/// Result type alias for splitter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during text splitting.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The splitter configuration is invalid (zero chunk size, overlap not
    /// smaller than chunk size).
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Splitting failed for the given input.
    #[error("Splitting error: {0}")]
    SplittingError(String),

    /// An error from the core crate.
    #[error(transparent)]
    Core(#[from] fabula::Error),
}

impl From<Error> for fabula::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidConfiguration(msg) => fabula::Error::Configuration(msg),
            Error::SplittingError(msg) => fabula::Error::Input(msg),
            Error::Core(inner) => inner,
        }
    }
}
