//! Shared, deduplicated background record feeding for ML training
//!
//! This crate lets any number of consumers (for example parallel training
//! replicas) read the same source through a single background reader thread.
//! Records are decoded into a fixed set of reusable buffers per consumer and
//! dealt round-robin in registration order, so every consumer sees a
//! disjoint, deterministic share of the source.

#![warn(missing_docs)]

mod body;
pub mod config;
pub mod cursor;
pub mod error;
mod handle;
pub mod queue;
pub mod record;
mod registry;
pub mod worker;

// Re-export key types for convenience
pub use body::ReaderStats;
pub use config::{ReaderConfig, SourceIdentity, SourceKey};
pub use cursor::{Cursor, CursorFactory, MemoryCursor, MemorySource};
pub use error::{Error, Result};
pub use handle::ReaderHandle;
pub use queue::{FreeQueue, FullQueue, QueuePair};
pub use record::{RawRecord, Record};
pub use registry::Registry;
