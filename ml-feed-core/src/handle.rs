//! Consumer-facing handle onto a shared reader

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::body::{ReaderBody, ReaderStats};
use crate::config::{ReaderConfig, SourceKey};
use crate::cursor::CursorFactory;
use crate::error::Result;
use crate::queue::{FreeQueue, FullQueue, QueuePair};
use crate::record::Record;
use crate::registry::Registry;

/// A consumer's view of the reader for one source
///
/// Every handle for the same source key shares a single reader thread and
/// receives its own disjoint, round-robin share of the records. Records are
/// taken from [`ReaderHandle::full`] and must be handed back through
/// [`ReaderHandle::free`] once consumed, otherwise the reader stalls on this
/// handle's turn.
///
/// Dropping the last handle for a key stops and joins its reader thread.
///
/// When the reader was started with `expected_consumers > 1`, nothing is
/// delivered to any handle until that many handles have attached. A thread
/// that opens one handle and pops from it before the others exist blocks
/// until they do.
///
/// ```no_run
/// use ml_feed_core::{MemorySource, RawRecord, ReaderConfig, ReaderHandle, SourceIdentity};
///
/// let source = MemorySource::from_values(["a", "b", "c"]);
/// let config = ReaderConfig::new(SourceIdentity::new("data", "mem"));
/// let handle: ReaderHandle<RawRecord> = ReaderHandle::open(&config, &source)?;
///
/// let record = handle.full().pop()?;
/// println!("{:?}", record.value);
/// handle.free().push(record)?;
/// # Ok::<(), ml_feed_core::Error>(())
/// ```
pub struct ReaderHandle<R: Record> {
    // Dropped before `body` so the reader sees this pair detach first
    pair: QueuePair<R>,
    body: Arc<ReaderBody<R>>,
}

impl<R: Record> ReaderHandle<R> {
    /// Attach to the reader for `config.source` in the process-wide registry
    pub fn open<F: CursorFactory>(config: &ReaderConfig, factory: &F) -> Result<Self> {
        Registry::global().open(config, factory)
    }

    pub(crate) fn attach<F: CursorFactory>(
        registry: &Registry,
        config: &ReaderConfig,
        factory: &F,
    ) -> Result<Self> {
        config.validate()?;

        let body = registry.find_or_start::<R, F>(config, factory)?;
        let (pair, feed) = QueuePair::new(config.queue_capacity)?;
        body.register(feed)?;

        debug!(
            source = %body.key(),
            capacity = config.queue_capacity,
            "attached reader handle"
        );

        Ok(Self { pair, body })
    }

    /// Queue for handing consumed records back to the reader
    pub fn free(&self) -> &FreeQueue<R> {
        self.pair.free()
    }

    /// Queue of records filled by the reader
    pub fn full(&self) -> &FullQueue<R> {
        self.pair.full()
    }

    /// Key of the source this handle reads
    pub fn key(&self) -> &SourceKey {
        self.body.key()
    }

    /// Number of record buffers owned by this handle
    pub fn capacity(&self) -> usize {
        self.pair.free().capacity()
    }

    /// Progress of the shared reader
    pub fn stats(&self) -> ReaderStats {
        self.body.stats()
    }

    /// Why the shared reader stopped, if it failed
    pub fn failure(&self) -> Option<String> {
        self.body.failure()
    }
}

impl<R: Record> fmt::Debug for ReaderHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderHandle")
            .field("key", self.body.key())
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}
