//! Double-buffered queue pairs between a reader thread and one consumer
//!
//! Each pair owns a fixed set of record buffers that circulate in a closed
//! loop: the reader pops an empty buffer from `free`, decodes into it and
//! pushes it to `full`; the consumer pops from `full` and hands the buffer
//! back through `free` when done. Memory per consumer is therefore bounded by
//! the pair's capacity and a slow consumer naturally throttles the reader.
//!
//! Both queues are bounded crossbeam channels. The consumer holds the sending
//! end of `free` and the receiving end of `full`; the reader holds the other
//! two. Dropping either side disconnects the pair, which is how the reader
//! learns that a handle went away and how a consumer learns that the reader
//! stopped.

use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::trace;

use crate::error::{Error, Result};
use crate::record::Record;
use crate::worker::StopFlag;

/// Queue through which a consumer returns consumed buffers to the reader
#[derive(Debug)]
pub struct FreeQueue<R> {
    tx: Sender<Box<R>>,
    capacity: usize,
}

impl<R> FreeQueue<R> {
    /// Return a buffer for reuse, blocking while the queue is at capacity
    pub fn push(&self, record: Box<R>) -> Result<()> {
        self.tx.send(record).map_err(|_| Error::Disconnected)
    }

    /// Number of buffers waiting to be refilled
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    /// Whether no buffers are waiting to be refilled
    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Maximum number of buffers the queue holds
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Queue from which a consumer takes filled buffers
#[derive(Debug)]
pub struct FullQueue<R> {
    rx: Receiver<Box<R>>,
    capacity: usize,
}

impl<R> FullQueue<R> {
    /// Take the next filled buffer, blocking until one is ready
    ///
    /// Fails with [`Error::Disconnected`] once the reader has stopped and
    /// every buffer it filled has been taken.
    pub fn pop(&self) -> Result<Box<R>> {
        if self.rx.is_empty() {
            trace!("full queue empty, waiting for data");
        }
        self.rx.recv().map_err(|_| Error::Disconnected)
    }

    /// Take the next filled buffer if one is ready
    pub fn try_pop(&self) -> Option<Box<R>> {
        self.rx.try_recv().ok()
    }

    /// Take the next filled buffer, waiting at most `timeout`
    pub fn pop_timeout(&self, timeout: Duration) -> Result<Option<Box<R>>> {
        match self.rx.recv_timeout(timeout) {
            Ok(record) => Ok(Some(record)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(Error::Disconnected),
        }
    }

    /// Number of filled buffers ready to be taken
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether no filled buffers are ready
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Maximum number of buffers the queue holds
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// The consumer's side of a free/full queue pair
#[derive(Debug)]
pub struct QueuePair<R> {
    free: FreeQueue<R>,
    full: FullQueue<R>,
}

impl<R: Record> QueuePair<R> {
    /// Allocate `capacity` empty buffers onto `free` and split the pair into
    /// the consumer's side and the reader's side
    pub(crate) fn new(capacity: usize) -> Result<(Self, PairFeed<R>)> {
        if capacity == 0 {
            return Err(Error::InvalidArgument(
                "queue pair capacity must be at least 1".into(),
            ));
        }

        let (free_tx, free_rx) = bounded(capacity);
        let (full_tx, full_rx) = bounded(capacity);

        for _ in 0..capacity {
            free_tx
                .try_send(Box::default())
                .map_err(|_| Error::InvalidArgument("free queue rejected initial buffer".into()))?;
        }

        let pair = Self {
            free: FreeQueue {
                tx: free_tx,
                capacity,
            },
            full: FullQueue {
                rx: full_rx,
                capacity,
            },
        };
        let feed = PairFeed {
            free: free_rx,
            full: full_tx,
        };
        Ok((pair, feed))
    }
}

impl<R> QueuePair<R> {
    /// Queue for returning consumed buffers
    pub fn free(&self) -> &FreeQueue<R> {
        &self.free
    }

    /// Queue of filled buffers
    pub fn full(&self) -> &FullQueue<R> {
        &self.full
    }
}

/// Outcome of waiting for an empty buffer
pub(crate) enum Take<R> {
    Record(Box<R>),
    Stopped,
    Detached,
}

/// The reader's side of a queue pair
#[derive(Debug)]
pub(crate) struct PairFeed<R> {
    free: Receiver<Box<R>>,
    full: Sender<Box<R>>,
}

impl<R> PairFeed<R> {
    /// Wait for the consumer to hand back an empty buffer
    ///
    /// Re-checks `stop` every `poll` while blocked.
    pub(crate) fn take_free(&self, stop: &StopFlag, poll: Duration) -> Take<R> {
        loop {
            match self.free.try_recv() {
                Ok(record) => return Take::Record(record),
                Err(TryRecvError::Disconnected) => return Take::Detached,
                Err(TryRecvError::Empty) => {}
            }
            if stop.is_set() {
                return Take::Stopped;
            }
            match self.free.recv_timeout(poll) {
                Ok(record) => return Take::Record(record),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Take::Detached,
            }
        }
    }

    /// Hand a filled buffer to the consumer
    ///
    /// Returns false if the consumer is gone; the buffer is dropped.
    pub(crate) fn deliver(&self, record: Box<R>) -> bool {
        self.full.send(record).is_ok()
    }
}
