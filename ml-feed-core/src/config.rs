//! Source identity and reader configuration

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identifies a physical source as requested by a named consumer
///
/// The same path read under two different names yields two independent
/// readers, so that two layers reading one database each get the full stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceIdentity {
    /// Consumer-visible name of the reader
    pub name: String,

    /// Path of the physical source
    pub path: String,
}

impl SourceIdentity {
    /// Create a new source identity
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// The key under which the reader for this source is shared
    pub fn key(&self) -> SourceKey {
        SourceKey(format!("{}:{}", self.name, self.path))
    }
}

/// Key under which a single reader is shared between handles
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceKey(String);

impl SourceKey {
    /// The key as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Configuration for a shared reader and the handles attached to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Source to read
    pub source: SourceIdentity,

    /// Number of record buffers allocated per handle
    pub queue_capacity: usize,

    /// Number of handles that must be registered before delivery starts
    ///
    /// Only the handle that starts the reader decides this value.
    pub expected_consumers: usize,

    /// How often a blocked reader thread re-checks its stop flag
    ///
    /// Written as `poll_interval_ms` in JSON.
    #[serde(rename = "poll_interval_ms", with = "millis")]
    pub poll_interval: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            source: SourceIdentity::default(),
            queue_capacity: 3,
            expected_consumers: 1,
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl ReaderConfig {
    /// Create a configuration for the given source with default settings
    pub fn new(source: SourceIdentity) -> Self {
        Self {
            source,
            ..Default::default()
        }
    }

    /// Parse a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the number of record buffers per handle
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the number of handles to wait for before delivering
    #[must_use]
    pub fn with_expected_consumers(mut self, consumers: usize) -> Self {
        self.expected_consumers = consumers;
        self
    }

    /// Set the stop-flag polling interval
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Key of the configured source
    pub fn key(&self) -> SourceKey {
        self.source.key()
    }

    /// Check that the configuration can run
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::InvalidArgument(
                "queue_capacity must be at least 1".into(),
            ));
        }
        if self.expected_consumers == 0 {
            return Err(Error::InvalidArgument(
                "expected_consumers must be at least 1".into(),
            ));
        }
        if self.source.name.contains('\0') || self.source.path.contains('\0') {
            return Err(Error::InvalidArgument(format!(
                "source {:?} contains a NUL byte",
                self.key().as_str()
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidArgument(
                "poll_interval must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
