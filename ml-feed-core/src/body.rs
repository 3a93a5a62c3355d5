//! The single background reader shared by every handle on one source
//!
//! A body owns one thread that walks a cursor over its source forever,
//! rewinding at the end, and deals the decoded records round-robin to every
//! registered queue pair. New pairs are announced through an unbounded
//! registration channel and only join the active set between passes, so the
//! active set and the cursor are touched by the reader thread alone.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::config::{ReaderConfig, SourceKey};
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::queue::{PairFeed, Take};
use crate::record::Record;
use crate::worker::{StopFlag, Worker};

/// Snapshot of a reader's progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Records decoded and delivered to a consumer
    pub records_read: u64,

    /// Number of times the cursor wrapped back to the first record
    pub passes: u64,

    /// Queue pairs currently in the active set
    pub consumers: usize,
}

/// State shared between a body and its thread
#[derive(Debug, Default)]
struct BodyState {
    records_read: AtomicU64,
    passes: AtomicU64,
    consumers: AtomicUsize,
    failure: Mutex<Option<String>>,
}

/// One reader thread per source
pub(crate) struct ReaderBody<R: Record> {
    key: SourceKey,

    // Dropped before `worker` so a reader waiting for registrations wakes up
    registrations: Sender<PairFeed<R>>,

    state: Arc<BodyState>,
    worker: Worker,
}

impl<R: Record> ReaderBody<R> {
    /// Rewind `cursor` and start the reader thread over it
    ///
    /// Fails without starting a thread if the source has no records.
    pub(crate) fn start<C>(config: &ReaderConfig, mut cursor: C) -> Result<Self>
    where
        C: Cursor + 'static,
    {
        let key = config.key();

        cursor.seek_to_first()?;
        if !cursor.valid() {
            return Err(Error::EmptySource {
                key: key.to_string(),
            });
        }

        let (registrations, pending) = unbounded();
        let state = Arc::new(BodyState::default());

        let read_loop = ReadLoop {
            key: key.clone(),
            cursor,
            pending,
            active: Vec::new(),
            started: false,
            expected_consumers: config.expected_consumers,
            poll_interval: config.poll_interval,
            state: Arc::clone(&state),
        };

        let worker = Worker::spawn(format!("feed:{key}"), move |stop| read_loop.run(&stop))?;

        info!(
            source = %key,
            expected_consumers = config.expected_consumers,
            "started reader"
        );

        Ok(Self {
            key,
            registrations,
            state,
            worker,
        })
    }

    /// Announce a new queue pair to the reader thread
    pub(crate) fn register(&self, feed: PairFeed<R>) -> Result<()> {
        self.registrations
            .send(feed)
            .map_err(|_| Error::ReaderStopped {
                key: self.key.to_string(),
                reason: self
                    .failure()
                    .unwrap_or_else(|| "reader thread exited".into()),
            })
    }

    pub(crate) fn key(&self) -> &SourceKey {
        &self.key
    }

    pub(crate) fn stats(&self) -> ReaderStats {
        ReaderStats {
            records_read: self.state.records_read.load(Ordering::SeqCst),
            passes: self.state.passes.load(Ordering::SeqCst),
            consumers: self.state.consumers.load(Ordering::SeqCst),
        }
    }

    /// Why the reader thread stopped, if it failed
    pub(crate) fn failure(&self) -> Option<String> {
        self.state.failure.lock().clone()
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        !self.worker.is_finished()
    }
}

/// Result of serving one queue pair
enum Served {
    Delivered,
    Detached,
    Stopped,
}

/// Everything the reader thread owns
struct ReadLoop<R, C> {
    key: SourceKey,
    cursor: C,
    pending: Receiver<PairFeed<R>>,
    active: Vec<PairFeed<R>>,
    started: bool,
    expected_consumers: usize,
    poll_interval: Duration,
    state: Arc<BodyState>,
}

impl<R: Record, C: Cursor> ReadLoop<R, C> {
    fn run(mut self, stop: &StopFlag) {
        match self.serve(stop) {
            Ok(()) => info!(
                source = %self.key,
                records_read = self.state.records_read.load(Ordering::SeqCst),
                "reader stopped"
            ),
            Err(e) => {
                error!(source = %self.key, error = %e, "reader failed");
                *self.state.failure.lock() = Some(e.to_string());
            }
        }
        self.state.consumers.store(0, Ordering::SeqCst);
    }

    fn serve(&mut self, stop: &StopFlag) -> Result<()> {
        while !stop.is_set() {
            if !self.admit(stop) {
                break;
            }

            let mut index = 0;
            while index < self.active.len() && !stop.is_set() {
                match self.read_one(index, stop)? {
                    Served::Delivered | Served::Stopped => index += 1,
                    Served::Detached => {
                        self.active.remove(index);
                        let remaining = self.state.consumers.fetch_sub(1, Ordering::SeqCst) - 1;
                        debug!(source = %self.key, remaining, "queue pair detached");
                    }
                }
            }
        }
        Ok(())
    }

    /// Move newly registered pairs into the active set, blocking while there
    /// is nobody to serve. Returns false if the body is gone.
    fn admit(&mut self, stop: &StopFlag) -> bool {
        while let Ok(feed) = self.pending.try_recv() {
            self.attach(feed);
        }

        while self.waiting() {
            if stop.is_set() {
                return false;
            }
            match self.pending.recv_timeout(self.poll_interval) {
                Ok(feed) => {
                    self.attach(feed);
                    while let Ok(feed) = self.pending.try_recv() {
                        self.attach(feed);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }

        self.started = true;
        true
    }

    fn waiting(&self) -> bool {
        self.active.is_empty() || (!self.started && self.active.len() < self.expected_consumers)
    }

    fn attach(&mut self, feed: PairFeed<R>) {
        self.active.push(feed);
        let consumers = self.state.consumers.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(source = %self.key, consumers, "queue pair registered");
    }

    /// Fill one free buffer of the pair at `index` from the cursor and advance
    fn read_one(&mut self, index: usize, stop: &StopFlag) -> Result<Served> {
        let feed = &self.active[index];
        let mut record = match feed.take_free(stop, self.poll_interval) {
            Take::Record(record) => record,
            Take::Stopped => return Ok(Served::Stopped),
            Take::Detached => return Ok(Served::Detached),
        };

        record
            .decode(self.cursor.key(), self.cursor.value())
            .map_err(|e| Error::Decode {
                key: self.key.to_string(),
                reason: e.to_string(),
            })?;

        // An undelivered record is read again for the next pair
        if !feed.deliver(record) {
            return Ok(Served::Detached);
        }
        self.state.records_read.fetch_add(1, Ordering::SeqCst);

        self.cursor.next()?;
        if !self.cursor.valid() {
            debug!(source = %self.key, "restarting data prefetching from start");
            self.cursor.seek_to_first()?;
            self.state.passes.fetch_add(1, Ordering::SeqCst);
            if !self.cursor.valid() {
                return Err(Error::EmptySource {
                    key: self.key.to_string(),
                });
            }
        }

        Ok(Served::Delivered)
    }
}
