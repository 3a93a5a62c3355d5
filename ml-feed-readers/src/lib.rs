//! Cursor sources for shared record readers
//!
//! This crate provides concrete sources that `ml-feed-core` readers can walk.

mod error;
pub mod record_file;

pub use error::{Error, Result};
pub use record_file::{RecordFileCursor, RecordFileSource, RecordFileWriter};

// Re-export core types
pub use ml_feed_core::{Cursor, CursorFactory, SourceIdentity};
