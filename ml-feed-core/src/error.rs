//! Error types for shared record feeding

use std::io;
use thiserror::Error;

/// Result type for record feeding operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for record feeding operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error while opening or reading a source
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The cursor over a source could not be opened
    #[error("Failed to open source {key}: {reason}")]
    SourceOpen {
        /// Source key
        key: String,
        /// Underlying failure
        reason: String,
    },

    /// The source holds no records at all
    #[error("Source {key} contains no records")]
    EmptySource {
        /// Source key
        key: String,
    },

    /// A record could not be decoded into its buffer
    #[error("Failed to decode record from {key}: {reason}")]
    Decode {
        /// Source key
        key: String,
        /// Underlying failure
        reason: String,
    },

    /// A cursor failed while moving over its source
    #[error("Cursor error: {0}")]
    Cursor(String),

    /// A reader for this key already exists with a different record type
    #[error("Source {key} is already being read with a different record type")]
    RecordTypeMismatch {
        /// Source key
        key: String,
    },

    /// The reader thread for a source has stopped
    #[error("Reader for {key} stopped: {reason}")]
    ReaderStopped {
        /// Source key
        key: String,
        /// Why the reader stopped
        reason: String,
    },

    /// The other side of a queue is gone
    #[error("Queue disconnected")]
    Disconnected,

    /// Configuration could not be parsed
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}
