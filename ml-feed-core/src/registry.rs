//! Process-wide deduplication of readers by source key
//!
//! The registry only holds weak references. Handles own the bodies, so a body
//! lives exactly as long as some handle for its key does; an expired entry is
//! simply overwritten by the next lookup for that key.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;

use crate::body::ReaderBody;
use crate::config::{ReaderConfig, SourceKey};
use crate::cursor::CursorFactory;
use crate::error::{Error, Result};
use crate::handle::ReaderHandle;
use crate::record::Record;

type ErasedBody = dyn Any + Send + Sync;

/// Mapping from source key to the reader currently serving it
#[derive(Debug, Default)]
pub struct Registry {
    bodies: Mutex<HashMap<SourceKey, Weak<ErasedBody>>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry used by [`ReaderHandle::open`]
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::new)
    }

    /// Attach a new handle to the reader for `config.source`, starting the
    /// reader if none is alive
    pub fn open<R, F>(&self, config: &ReaderConfig, factory: &F) -> Result<ReaderHandle<R>>
    where
        R: Record,
        F: CursorFactory,
    {
        ReaderHandle::attach(self, config, factory)
    }

    /// Number of sources with a live reader
    pub fn live_sources(&self) -> usize {
        let mut bodies = self.bodies.lock();
        bodies.retain(|_, body| body.strong_count() > 0);
        bodies.len()
    }

    /// Look up the live body for the configured key or start a new one
    ///
    /// The lock is held across the cursor open so that two threads racing on
    /// the same key cannot both start a reader.
    pub(crate) fn find_or_start<R, F>(
        &self,
        config: &ReaderConfig,
        factory: &F,
    ) -> Result<Arc<ReaderBody<R>>>
    where
        R: Record,
        F: CursorFactory,
    {
        let key = config.key();
        let mut bodies = self.bodies.lock();

        if let Some(existing) = bodies.get(&key).and_then(Weak::upgrade) {
            return existing
                .downcast::<ReaderBody<R>>()
                .map_err(|_| Error::RecordTypeMismatch {
                    key: key.to_string(),
                });
        }

        let cursor = factory
            .open(&config.source)
            .map_err(|e| Error::SourceOpen {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        let body = Arc::new(ReaderBody::<R>::start(config, cursor)?);

        let erased: Arc<ErasedBody> = body.clone();
        bodies.insert(key, Arc::downgrade(&erased));

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceIdentity;
    use crate::cursor::MemorySource;
    use crate::record::RawRecord;
    use std::time::Duration;

    fn config(name: &str) -> ReaderConfig {
        ReaderConfig::new(SourceIdentity::new(name, "mem"))
            .with_poll_interval(Duration::from_millis(5))
    }

    #[test]
    fn test_same_key_shares_body() {
        let registry = Registry::new();
        let source = MemorySource::from_values(["a", "b"]);
        let config = config("shared");

        let first = registry.find_or_start::<RawRecord, _>(&config, &source).unwrap();
        let second = registry.find_or_start::<RawRecord, _>(&config, &source).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.open_count(), 1);
        assert_eq!(registry.live_sources(), 1);
    }

    #[test]
    fn test_expired_entry_is_replaced() {
        let registry = Registry::new();
        let source = MemorySource::from_values(["a"]);
        let config = config("expiring");

        drop(registry.find_or_start::<RawRecord, _>(&config, &source).unwrap());
        assert_eq!(registry.live_sources(), 0);

        let _body = registry.find_or_start::<RawRecord, _>(&config, &source).unwrap();
        assert_eq!(source.open_count(), 2);
        assert_eq!(registry.live_sources(), 1);
    }

    #[test]
    fn test_different_names_get_different_bodies() {
        let registry = Registry::new();
        let source = MemorySource::from_values(["a"]);

        let train = registry.find_or_start::<RawRecord, _>(&config("train"), &source).unwrap();
        let test = registry.find_or_start::<RawRecord, _>(&config("test"), &source).unwrap();

        assert!(!Arc::ptr_eq(&train, &test));
        assert_eq!(registry.live_sources(), 2);
    }

    #[test]
    fn test_record_type_mismatch() {
        #[derive(Default)]
        struct Other;

        impl Record for Other {
            fn decode(&mut self, _key: &[u8], _value: &[u8]) -> Result<()> {
                Ok(())
            }
        }

        let registry = Registry::new();
        let source = MemorySource::from_values(["a"]);
        let config = config("typed");

        let _raw = registry.find_or_start::<RawRecord, _>(&config, &source).unwrap();
        let result = registry.find_or_start::<Other, _>(&config, &source);
        assert!(matches!(result, Err(Error::RecordTypeMismatch { .. })));
    }

    #[test]
    fn test_open_failure_is_reported() {
        struct Missing;

        impl CursorFactory for Missing {
            type Cursor = crate::cursor::MemoryCursor;

            fn open(&self, source: &SourceIdentity) -> Result<Self::Cursor> {
                Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    source.path.clone(),
                )))
            }
        }

        let registry = Registry::new();
        let result = registry.find_or_start::<RawRecord, _>(&config("missing"), &Missing);
        assert!(matches!(result, Err(Error::SourceOpen { .. })));
        assert_eq!(registry.live_sources(), 0);
    }

    #[test]
    fn test_nul_in_source_is_rejected() {
        let registry = Registry::new();
        let source = MemorySource::from_values(["a"]);

        let result: Result<ReaderHandle<RawRecord>> = registry.open(&config("bad\0name"), &source);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        assert_eq!(source.open_count(), 0);
        assert_eq!(registry.live_sources(), 0);
    }
}
