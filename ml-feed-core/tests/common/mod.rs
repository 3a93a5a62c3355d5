#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ml_feed_core::{
    Cursor, CursorFactory, MemoryCursor, MemorySource, RawRecord, ReaderConfig, Result,
    SourceIdentity,
};

/// Enable log output for a test run
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Config with a short poll interval so shutdown is quick
pub fn config(name: &str) -> ReaderConfig {
    ReaderConfig::new(SourceIdentity::new(name, "mem")).with_poll_interval(Duration::from_millis(5))
}

/// Source whose values are "0", "1", ... "len-1"
pub fn numbered_source(len: usize) -> MemorySource {
    MemorySource::from_values((0..len).map(|i| i.to_string()))
}

/// Parse the numeric value of a record from `numbered_source`
pub fn value_of(record: &RawRecord) -> usize {
    std::str::from_utf8(&record.value).unwrap().parse().unwrap()
}

/// Cursor that counts how often it is dropped
pub struct TrackedCursor {
    inner: MemoryCursor,
    drops: Arc<AtomicUsize>,
}

impl Drop for TrackedCursor {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

impl Cursor for TrackedCursor {
    fn seek_to_first(&mut self) -> Result<()> {
        self.inner.seek_to_first()
    }

    fn next(&mut self) -> Result<()> {
        self.inner.next()
    }

    fn valid(&self) -> bool {
        self.inner.valid()
    }

    fn key(&self) -> &[u8] {
        self.inner.key()
    }

    fn value(&self) -> &[u8] {
        self.inner.value()
    }
}

/// Memory source whose cursors report when the reader thread releases them
#[derive(Clone)]
pub struct TrackedSource {
    pub inner: MemorySource,
    pub drops: Arc<AtomicUsize>,
}

impl TrackedSource {
    pub fn new(inner: MemorySource) -> Self {
        Self {
            inner,
            drops: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn opens(&self) -> usize {
        self.inner.open_count()
    }

    pub fn released(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
}

impl CursorFactory for TrackedSource {
    type Cursor = TrackedCursor;

    fn open(&self, source: &SourceIdentity) -> Result<TrackedCursor> {
        Ok(TrackedCursor {
            inner: self.inner.open(source)?,
            drops: Arc::clone(&self.drops),
        })
    }
}

/// How a [`FaultySource`] cursor misbehaves
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// Every record disappears once the cursor is rewound after its first pass
    ShrinkOnRewind,

    /// `next()` fails when asked to move past the given number of records
    FailNextAfter(usize),
}

/// Numbered source whose cursors hit a [`Fault`] mid-stream
#[derive(Debug, Clone)]
pub struct FaultySource {
    pub len: usize,
    pub fault: Fault,
}

pub struct FaultyCursor {
    values: Vec<Vec<u8>>,
    position: usize,
    seeks: usize,
    fault: Fault,
}

impl Cursor for FaultyCursor {
    fn seek_to_first(&mut self) -> Result<()> {
        self.seeks += 1;
        if matches!(self.fault, Fault::ShrinkOnRewind) && self.seeks > 1 {
            self.values.clear();
        }
        self.position = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        if let Fault::FailNextAfter(limit) = self.fault {
            if self.position + 1 >= limit {
                return Err(ml_feed_core::Error::Cursor("disk read failed".into()));
            }
        }
        self.position += 1;
        Ok(())
    }

    fn valid(&self) -> bool {
        self.position < self.values.len()
    }

    fn key(&self) -> &[u8] {
        b""
    }

    fn value(&self) -> &[u8] {
        self.values.get(self.position).map_or(&[][..], Vec::as_slice)
    }
}

impl CursorFactory for FaultySource {
    type Cursor = FaultyCursor;

    fn open(&self, _source: &SourceIdentity) -> Result<FaultyCursor> {
        Ok(FaultyCursor {
            values: (0..self.len).map(|i| i.to_string().into_bytes()).collect(),
            position: 0,
            seeks: 0,
            fault: self.fault,
        })
    }
}
