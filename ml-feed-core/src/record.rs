//! Reusable record buffers
//!
//! A [`Record`] is an opaque buffer that the reader thread decodes source
//! entries into. Buffers are allocated once per queue pair and then cycled
//! between the `free` and `full` queues, so implementations should reuse
//! their existing storage in [`Record::decode`] rather than reallocating.

use crate::error::Result;

/// A buffer that a source entry can be decoded into
pub trait Record: Default + Send + 'static {
    /// Overwrite this buffer with the entry at the cursor's current position
    fn decode(&mut self, key: &[u8], value: &[u8]) -> Result<()>;
}

/// A record that keeps the raw key and value bytes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    /// Key bytes of the last decoded entry
    pub key: Vec<u8>,

    /// Value bytes of the last decoded entry
    pub value: Vec<u8>,
}

impl Record for RawRecord {
    fn decode(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.key.clear();
        self.key.extend_from_slice(key);
        self.value.clear();
        self.value.extend_from_slice(value);
        Ok(())
    }
}
