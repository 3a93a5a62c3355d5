//! Background worker thread with a cooperative stop flag

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{debug, error};

use crate::error::{Error, Result};

/// Shared flag asking a worker loop to stop
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    /// Create a cleared flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the worker to stop
    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop has been requested
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A named thread that is asked to stop and joined when dropped
///
/// The loop is expected to check its [`StopFlag`] at iteration granularity;
/// the thread is never terminated forcefully.
#[derive(Debug)]
pub struct Worker {
    name: String,
    stop: StopFlag,
    handle: Option<thread::JoinHandle<()>>,
}

impl Worker {
    /// Spawn `body` on a new thread called `name`
    ///
    /// NUL bytes cannot appear in thread names and are replaced.
    pub fn spawn<F>(name: impl Into<String>, body: F) -> Result<Self>
    where
        F: FnOnce(StopFlag) + Send + 'static,
    {
        let name = name.into().replace('\0', "\u{fffd}");
        let stop = StopFlag::new();
        let thread_stop = stop.clone();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || body(thread_stop))
            .map_err(Error::Io)?;

        Ok(Self {
            name,
            stop,
            handle: Some(handle),
        })
    }

    /// Name of the worker thread
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the thread has returned
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, thread::JoinHandle::is_finished)
    }

    /// Signal the loop to stop and wait for the thread to exit
    pub fn stop(&mut self) {
        self.stop.set();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!(worker = %self.name, "worker thread panicked");
            } else {
                debug!(worker = %self.name, "worker thread joined");
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}
