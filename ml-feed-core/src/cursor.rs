//! Cursor abstraction over a keyed record source

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::SourceIdentity;
use crate::error::Result;

/// A positioned cursor over the entries of a source
///
/// The reader thread treats an invalid cursor as the end of the source and
/// rewinds it with [`Cursor::seek_to_first`].
pub trait Cursor: Send {
    /// Move to the first entry of the source
    fn seek_to_first(&mut self) -> Result<()>;

    /// Advance one entry
    fn next(&mut self) -> Result<()>;

    /// Whether the cursor is positioned on an entry
    fn valid(&self) -> bool;

    /// Key of the current entry
    fn key(&self) -> &[u8];

    /// Value of the current entry
    fn value(&self) -> &[u8];
}

/// A factory for opening cursors over sources
pub trait CursorFactory: Send + Sync {
    /// The type of cursor this factory opens
    type Cursor: Cursor + 'static;

    /// Open a cursor over the given source
    fn open(&self, source: &SourceIdentity) -> Result<Self::Cursor>;
}

type Entries = Arc<Vec<(Vec<u8>, Vec<u8>)>>;

/// An in-memory source of key/value entries
///
/// The source path is ignored; every open yields a cursor over the same
/// entries. Opens are counted, which makes it handy for checking that a
/// source is only read once.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    entries: Entries,
    opens: Arc<AtomicUsize>,
}

impl MemorySource {
    /// Create a source over the given entries
    pub fn new(entries: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        Self {
            entries: Arc::new(entries),
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a source whose values are the given items and whose keys are
    /// their zero-padded indices
    pub fn from_values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Vec<u8>>,
    {
        let entries = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| (format!("{i:08}").into_bytes(), v.into()))
            .collect();
        Self::new(entries)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the source has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of cursors opened so far
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl CursorFactory for MemorySource {
    type Cursor = MemoryCursor;

    fn open(&self, _source: &SourceIdentity) -> Result<MemoryCursor> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryCursor {
            entries: Arc::clone(&self.entries),
            position: 0,
        })
    }
}

/// Cursor over a [`MemorySource`]
#[derive(Debug)]
pub struct MemoryCursor {
    entries: Entries,
    position: usize,
}

impl Cursor for MemoryCursor {
    fn seek_to_first(&mut self) -> Result<()> {
        self.position = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        if self.position < self.entries.len() {
            self.position += 1;
        }
        Ok(())
    }

    fn valid(&self) -> bool {
        self.position < self.entries.len()
    }

    fn key(&self) -> &[u8] {
        self.entries.get(self.position).map_or(&[][..], |(k, _)| k.as_slice())
    }

    fn value(&self) -> &[u8] {
        self.entries.get(self.position).map_or(&[][..], |(_, v)| v.as_slice())
    }
}
