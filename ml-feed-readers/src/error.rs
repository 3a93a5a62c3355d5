//! Error types for cursor sources

use thiserror::Error;

/// Error type for cursor sources
#[derive(Error, Debug)]
pub enum Error {
    /// Core library error
    #[error("Core error: {0}")]
    Core(#[from] ml_feed_core::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Format error
    #[error("Format error: {0}")]
    Format(String),
}

/// Result type for cursor sources
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for ml_feed_core::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::Core(e) => e,
            Error::Io(e) => ml_feed_core::Error::Io(e),
            Error::Format(msg) => ml_feed_core::Error::Cursor(msg),
        }
    }
}
