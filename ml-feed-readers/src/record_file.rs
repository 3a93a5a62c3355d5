//! Memory-mapped key/value record files
//!
//! Layout:
//! - 8 bytes: magic `MLFEED01`
//! - repeated records:
//!   - 4 bytes: key length (u32 little endian)
//!   - N bytes: key
//!   - 4 bytes: value length (u32 little endian)
//!   - M bytes: value
//!
//! The whole file is indexed when a cursor is opened, so truncated or
//! corrupt files are rejected up front instead of failing mid-read.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::debug;

use ml_feed_core::error::Result as CoreResult;
use ml_feed_core::{Cursor, CursorFactory, SourceIdentity};

use crate::error::{Error, Result};

/// Magic bytes at the start of every record file
pub const MAGIC: &[u8; 8] = b"MLFEED01";

/// Writer for record files
pub struct RecordFileWriter {
    writer: BufWriter<File>,
    records: usize,
}

impl RecordFileWriter {
    /// Create (or truncate) a record file at `path`
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(MAGIC)?;
        Ok(Self { writer, records: 0 })
    }

    /// Append one key/value record
    pub fn append(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        for field in [key, value] {
            let len = u32::try_from(field.len())
                .map_err(|_| Error::Format(format!("field of {} bytes is too large", field.len())))?;
            self.writer.write_all(&len.to_le_bytes())?;
            self.writer.write_all(field)?;
        }
        self.records += 1;
        Ok(())
    }

    /// Flush the file and return the number of records written
    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush()?;
        Ok(self.records)
    }
}

/// Byte ranges of one record inside the mapped file
#[derive(Debug, Clone)]
struct Entry {
    key: Range<usize>,
    value: Range<usize>,
}

/// Cursor over a memory-mapped record file
#[derive(Debug)]
pub struct RecordFileCursor {
    map: Mmap,
    entries: Vec<Entry>,
    position: usize,
}

impl RecordFileCursor {
    /// Map and index the record file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        if file_size < MAGIC.len() as u64 {
            return Err(Error::Format(format!(
                "{} is too short to be a record file",
                path.display()
            )));
        }

        // Safety: the map is read-only and record files are not modified
        // while they are being read
        #[allow(unsafe_code)]
        let map = unsafe { Mmap::map(&file)? };

        if &map[..MAGIC.len()] != MAGIC {
            return Err(Error::Format(format!(
                "{} does not start with the record file magic",
                path.display()
            )));
        }

        let entries = index(&map)?;
        debug!(path = %path.display(), records = entries.len(), "opened record file");

        Ok(Self {
            map,
            entries,
            position: 0,
        })
    }

    /// Number of records in the file
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the file holds no records
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Walk the length prefixes after the magic and collect record ranges
fn index(data: &[u8]) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    let mut offset = MAGIC.len();

    while offset < data.len() {
        let key = field(data, &mut offset)?;
        let value = field(data, &mut offset)?;
        entries.push(Entry { key, value });
    }

    Ok(entries)
}

fn field(data: &[u8], offset: &mut usize) -> Result<Range<usize>> {
    let start = *offset;
    let len_bytes: [u8; 4] = data
        .get(start..start + 4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| Error::Format(format!("truncated length prefix at byte {start}")))?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    let begin = start + 4;
    let end = begin + len;
    if end > data.len() {
        return Err(Error::Format(format!(
            "record field at byte {begin} runs past end of file ({len} bytes)"
        )));
    }

    *offset = end;
    Ok(begin..end)
}

impl Cursor for RecordFileCursor {
    fn seek_to_first(&mut self) -> CoreResult<()> {
        self.position = 0;
        Ok(())
    }

    fn next(&mut self) -> CoreResult<()> {
        if self.position < self.entries.len() {
            self.position += 1;
        }
        Ok(())
    }

    fn valid(&self) -> bool {
        self.position < self.entries.len()
    }

    fn key(&self) -> &[u8] {
        self.entries
            .get(self.position)
            .map_or(&[][..], |entry| &self.map[entry.key.clone()])
    }

    fn value(&self) -> &[u8] {
        self.entries
            .get(self.position)
            .map_or(&[][..], |entry| &self.map[entry.value.clone()])
    }
}

/// Opens record files named by [`SourceIdentity::path`]
#[derive(Debug, Clone, Default)]
pub struct RecordFileSource {
    base_dir: Option<PathBuf>,
}

impl RecordFileSource {
    /// Resolve source paths as given
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative source paths against `base_dir`
    pub fn with_base_dir<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    /// Path of the file backing `source`
    pub fn resolve(&self, source: &SourceIdentity) -> PathBuf {
        match &self.base_dir {
            Some(base) => base.join(&source.path),
            None => PathBuf::from(&source.path),
        }
    }
}

impl CursorFactory for RecordFileSource {
    type Cursor = RecordFileCursor;

    fn open(&self, source: &SourceIdentity) -> CoreResult<RecordFileCursor> {
        Ok(RecordFileCursor::open(self.resolve(source))?)
    }
}
