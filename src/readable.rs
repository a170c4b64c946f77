//! Readable endpoints with a single-reader lock
//!
//! A [`Readable`] is a cheap, cloneable handle over one underlying stream of
//! `StreamResult<T>` items. Only one [`Reader`] may be attached at a time;
//! the reader is an owned lock guard, so the lock is released on every exit
//! path simply by dropping it.

use async_stream::stream;
use futures_core::Stream;
use futures_util::future;
use futures_util::stream::{self, BoxStream, StreamExt};
use std::fmt::{self, Display};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{StreamError, StreamResult};
use crate::stage::TransformStage;

/// A boxed, heap-allocated stream of fallible items flowing between stages
pub type ItemStream<T> = BoxStream<'static, StreamResult<T>>;

#[derive(Debug, Clone, PartialEq)]
enum ChannelState {
    Readable,
    Closed,
    Errored(StreamError),
}

struct Channel<T> {
    stream: ItemStream<T>,
    state: ChannelState,
}

impl<T: Send + 'static> Channel<T> {
    /// Drop the underlying stream (and with it every upstream stage).
    fn release_stream(&mut self) {
        self.stream = stream::empty().boxed();
    }
}

/// Pull-based source endpoint that allows at most one active reader
pub struct Readable<T> {
    channel: Arc<Mutex<Channel<T>>>,
}

impl<T> Clone for Readable<T> {
    fn clone(&self) -> Self {
        Readable {
            channel: Arc::clone(&self.channel),
        }
    }
}

impl<T> fmt::Debug for Readable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Readable")
            .field("locked", &self.channel.try_lock().is_err())
            .finish()
    }
}

impl<T: Send + 'static> Readable<T> {
    /// Wrap a stream of fallible items. The first `Err` ends the stream.
    pub fn new<S>(source: S) -> Self
    where
        S: Stream<Item = StreamResult<T>> + Send + 'static,
    {
        Readable {
            channel: Arc::new(Mutex::new(Channel {
                stream: source.boxed(),
                state: ChannelState::Readable,
            })),
        }
    }

    /// Create a readable from an infallible stream
    pub fn from_stream<S>(source: S) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        Self::new(source.map(Ok))
    }

    /// Create a readable from a stream of results; an `Err` becomes a source error
    pub fn from_try_stream<S, E>(source: S) -> Self
    where
        S: Stream<Item = Result<T, E>> + Send + 'static,
        E: Display,
    {
        Self::new(source.map(|item| item.map_err(StreamError::source)))
    }

    /// Create a readable from an iterator
    pub fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Self::new(stream::iter(iter.into_iter().map(Ok)))
    }

    /// Create a readable from an iterator of results.
    ///
    /// Iteration stops at the first `Err`, which is reported as a
    /// [`StreamError::Source`]; exhausting the iterator closes the stream.
    pub fn from_try_iter<I, E>(iter: I) -> Self
    where
        I: IntoIterator<Item = Result<T, E>>,
        I::IntoIter: Send + 'static,
        E: Display,
    {
        Self::new(stream::iter(
            iter.into_iter()
                .map(|item| item.map_err(StreamError::source)),
        ))
    }

    /// A readable that closes without producing anything
    pub fn empty() -> Self {
        Self::new(stream::empty())
    }

    /// A readable whose first read fails with `err`
    pub fn failed(err: StreamError) -> Self {
        Self::new(stream::once(future::ready(Err(err))))
    }

    /// Whether a reader is currently attached
    pub fn is_locked(&self) -> bool {
        self.channel.try_lock().is_err()
    }

    /// Acquire the exclusive reader.
    ///
    /// Fails with [`StreamError::ConcurrentAccess`] while another reader is
    /// attached. The lock is released when the returned [`Reader`] drops.
    pub fn get_reader(&self) -> StreamResult<Reader<T>> {
        let guard = Arc::clone(&self.channel)
            .try_lock_owned()
            .map_err(|_| StreamError::ConcurrentAccess)?;
        Ok(Reader { guard })
    }

    /// Lock this readable and feed it through `f`, returning the readable end
    /// of the result.
    ///
    /// The reader stays attached for as long as the derived stream lives. If
    /// the lock is already taken the derived stream fails with
    /// [`StreamError::ConcurrentAccess`] on its first read.
    pub fn through<O, F>(&self, f: F) -> Readable<O>
    where
        O: Send + 'static,
        F: FnOnce(ItemStream<T>) -> ItemStream<O>,
    {
        let upstream = match self.get_reader() {
            Ok(reader) => reader.into_stream(),
            Err(err) => stream::once(future::ready(Err(err))).boxed(),
        };
        Readable::new(f(upstream))
    }

    /// Connect this readable to the input port of `stage`
    pub fn pipe_through<O>(&self, stage: TransformStage<T, O>) -> Readable<O>
    where
        O: Send + 'static,
    {
        self.through(move |upstream| stage.apply(upstream))
    }
}

/// Exclusive reader of a [`Readable`]
pub struct Reader<T> {
    guard: OwnedMutexGuard<Channel<T>>,
}

impl<T: Send + 'static> Reader<T> {
    /// Request the next item.
    ///
    /// Returns `Ok(None)` once the stream is closed. After an error every
    /// subsequent read returns the same error.
    pub async fn read(&mut self) -> StreamResult<Option<T>> {
        let channel = &mut *self.guard;
        match &channel.state {
            ChannelState::Closed => return Ok(None),
            ChannelState::Errored(err) => return Err(err.clone()),
            ChannelState::Readable => {}
        }

        match channel.stream.next().await {
            Some(Ok(item)) => Ok(Some(item)),
            Some(Err(err)) => {
                channel.state = ChannelState::Errored(err.clone());
                channel.release_stream();
                Err(err)
            }
            None => {
                channel.state = ChannelState::Closed;
                channel.release_stream();
                Ok(None)
            }
        }
    }

    /// Abandon the rest of the stream.
    ///
    /// The underlying stream is dropped, cancelling every upstream stage.
    /// Later readers observe a closed stream. No-op once closed or errored.
    pub fn cancel(&mut self) {
        let channel = &mut *self.guard;
        if channel.state == ChannelState::Readable {
            log::debug!("Reader cancelled; dropping upstream");
            channel.state = ChannelState::Closed;
            channel.release_stream();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.guard.state == ChannelState::Closed
    }

    /// Release the lock without consuming anything further
    pub fn release(self) {}

    /// Turn the reader into a stream that holds the lock until it is dropped.
    ///
    /// Dropping the stream before it ends cancels the readable.
    pub fn into_stream(self) -> ItemStream<T> {
        let mut attached = CancelOnDrop { reader: self };
        stream! {
            loop {
                match attached.reader.read().await {
                    Ok(Some(item)) => yield Ok(item),
                    Ok(None) => break,
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                }
            }
        }
        .boxed()
    }
}

/// Reader owned by a derived stream; abandoning the stream cancels upstream
struct CancelOnDrop<T: Send + 'static> {
    reader: Reader<T>,
}

impl<T: Send + 'static> Drop for CancelOnDrop<T> {
    fn drop(&mut self) {
        self.reader.cancel();
    }
}
