//! Push sources for pipestream
//!
//! A push source pairs a producer handle with a [`Readable`]. The producer
//! awaits readiness before each enqueue: once `high_water_mark` items are
//! waiting, [`PushHandle::enqueue`] suspends until the reader pulls. The
//! bounded queue itself is a `tokio::sync::mpsc` channel.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::{StreamError, StreamResult};
use crate::readable::Readable;
use crate::stream_configuration::QueueConfig;

/// Create a bounded push source
pub fn push_channel<T>(config: &QueueConfig) -> (PushHandle<T>, Readable<T>)
where
    T: Send + 'static,
{
    let capacity = config.high_water_mark.max(1);
    let (sender, receiver) = mpsc::channel(capacity);
    let handle = PushHandle {
        sender,
        capacity,
        errored: Arc::new(AtomicBool::new(false)),
    };
    (handle, Readable::new(ReceiverStream::new(receiver)))
}

/// Producer side of a push source.
///
/// The source closes once every clone of the handle has been dropped or
/// [`PushHandle::close`]d.
pub struct PushHandle<T> {
    sender: mpsc::Sender<StreamResult<T>>,
    capacity: usize,
    errored: Arc<AtomicBool>,
}

impl<T> Clone for PushHandle<T> {
    fn clone(&self) -> Self {
        PushHandle {
            sender: self.sender.clone(),
            capacity: self.capacity,
            errored: Arc::clone(&self.errored),
        }
    }
}

impl<T> PushHandle<T>
where
    T: Send + 'static,
{
    /// Enqueue an item, waiting while the queue is at its high-water mark
    pub async fn enqueue(&self, item: T) -> StreamResult<()> {
        if self.errored.load(Ordering::Acquire) {
            return Err(StreamError::Closed);
        }
        self.sender
            .send(Ok(item))
            .await
            .map_err(|_| StreamError::Closed)
    }

    /// Wait until the queue has room for one more item
    pub async fn ready(&self) -> StreamResult<()> {
        self.sender
            .reserve()
            .await
            .map(|_permit| ())
            .map_err(|_| StreamError::Closed)
    }

    /// Number of items that can be enqueued without waiting
    pub fn desired_size(&self) -> usize {
        self.sender.capacity()
    }

    /// Signal an error to the reader. Later enqueues fail with `Closed`.
    pub async fn error(&self, err: StreamError) -> StreamResult<()> {
        if self.errored.swap(true, Ordering::AcqRel) {
            return Err(StreamError::Closed);
        }
        log::debug!("Push source errored: {}", err);
        self.sender
            .send(Err(err))
            .await
            .map_err(|_| StreamError::Closed)
    }

    /// Close this handle. The reader sees end-of-stream after draining what
    /// was already enqueued, once no other handle is alive.
    pub fn close(self) {}

    /// Whether the reading side has gone away (cancelled or dropped)
    pub fn is_cancelled(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            length: self.capacity - self.sender.capacity(),
            capacity: self.capacity,
            is_cancelled: self.is_cancelled(),
        }
    }
}

/// Snapshot of a push source queue
#[derive(Debug, Clone, PartialEq)]
pub struct QueueStats {
    pub length: usize,
    pub capacity: usize,
    pub is_cancelled: bool,
}

impl fmt::Display for QueueStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Queue({}/{}{})",
            self.length,
            self.capacity,
            if self.is_cancelled { ", cancelled" } else { "" }
        )
    }
}

impl<T> fmt::Debug for PushHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushHandle")
            .field("capacity", &self.capacity)
            .field("available", &self.sender.capacity())
            .field("errored", &self.errored.load(Ordering::Acquire))
            .finish()
    }
}
