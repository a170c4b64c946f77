//! Writable endpoints with a single-writer lock

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{StreamError, StreamResult};

/// Underlying sink driven by a [`Writable`]
#[async_trait]
pub trait WritableSink<T>: Send
where
    T: Send + 'static,
{
    /// Accept one chunk. The next chunk is not offered until this resolves.
    async fn write(&mut self, chunk: T) -> StreamResult<()>;

    /// Normal completion
    async fn close(&mut self) -> StreamResult<()> {
        Ok(())
    }

    /// Cancellation; must not attempt further writes
    async fn abort(&mut self, _reason: StreamError) -> StreamResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum WriterState {
    Writable,
    Closed,
    Errored(StreamError),
}

struct SinkSlot<T> {
    sink: Box<dyn WritableSink<T>>,
    state: WriterState,
    /// Set once the sink has seen `close` or `abort`
    finished: bool,
}

impl<T: Send + 'static> SinkSlot<T> {
    async fn abort_sink(&mut self, reason: StreamError) -> StreamResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.sink.abort(reason).await
    }
}

/// Sink endpoint that allows at most one active writer
pub struct Writable<T> {
    slot: Arc<Mutex<SinkSlot<T>>>,
}

impl<T> Clone for Writable<T> {
    fn clone(&self) -> Self {
        Writable {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> fmt::Debug for Writable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writable")
            .field("locked", &self.slot.try_lock().is_err())
            .finish()
    }
}

impl<T: Send + 'static> Writable<T> {
    pub fn new<S>(sink: S) -> Self
    where
        S: WritableSink<T> + 'static,
    {
        Writable {
            slot: Arc::new(Mutex::new(SinkSlot {
                sink: Box::new(sink),
                state: WriterState::Writable,
                finished: false,
            })),
        }
    }

    /// Whether a writer is currently attached
    pub fn is_locked(&self) -> bool {
        self.slot.try_lock().is_err()
    }

    /// Acquire the exclusive writer.
    ///
    /// Fails with [`StreamError::ConcurrentAccess`] while another writer is
    /// attached. The lock is released when the returned [`Writer`] drops.
    pub fn get_writer(&self) -> StreamResult<Writer<T>> {
        let guard = Arc::clone(&self.slot)
            .try_lock_owned()
            .map_err(|_| StreamError::ConcurrentAccess)?;
        Ok(Writer { guard })
    }

    /// Close through a short-lived writer
    pub async fn close(&self) -> StreamResult<()> {
        self.get_writer()?.close().await
    }

    /// Abort through a short-lived writer
    pub async fn abort(&self, reason: StreamError) -> StreamResult<()> {
        self.get_writer()?.abort(reason).await
    }
}

/// Exclusive writer of a [`Writable`]
pub struct Writer<T> {
    guard: OwnedMutexGuard<SinkSlot<T>>,
}

impl<T: Send + 'static> Writer<T> {
    /// Write one chunk; a sink failure errors the endpoint
    pub async fn write(&mut self, chunk: T) -> StreamResult<()> {
        let slot = &mut *self.guard;
        match &slot.state {
            WriterState::Writable => {}
            WriterState::Closed => return Err(StreamError::Closed),
            WriterState::Errored(err) => return Err(err.clone()),
        }

        if let Err(err) = slot.sink.write(chunk).await {
            slot.state = WriterState::Errored(err.clone());
            return Err(err);
        }
        Ok(())
    }

    /// Close the sink. Closing twice is a no-op; closing an errored endpoint
    /// aborts the sink (if it has not finished yet) and returns the error.
    pub async fn close(&mut self) -> StreamResult<()> {
        let slot = &mut *self.guard;
        match slot.state.clone() {
            WriterState::Closed => Ok(()),
            WriterState::Errored(err) => {
                if let Err(abort_err) = slot.abort_sink(err.clone()).await {
                    log::warn!("Abort after failed write also failed: {}", abort_err);
                }
                Err(err)
            }
            WriterState::Writable => {
                slot.finished = true;
                match slot.sink.close().await {
                    Ok(()) => {
                        slot.state = WriterState::Closed;
                        Ok(())
                    }
                    Err(err) => {
                        slot.state = WriterState::Errored(err.clone());
                        Err(err)
                    }
                }
            }
        }
    }

    /// Abort the sink. A no-op after a successful close or an earlier abort.
    pub async fn abort(&mut self, reason: StreamError) -> StreamResult<()> {
        let slot = &mut *self.guard;
        if slot.state == WriterState::Closed {
            return Ok(());
        }
        if slot.state == WriterState::Writable {
            slot.state = WriterState::Errored(StreamError::Aborted(reason.to_string()));
        }
        slot.abort_sink(reason).await
    }

    pub fn is_closed(&self) -> bool {
        self.guard.state == WriterState::Closed
    }

    /// Release the lock without closing
    pub fn release(self) {}
}

/// Sink built from an async closure
pub struct FnSink<F, Fut> {
    f: F,
    _fut: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnSink<F, Fut> {
    pub fn new(f: F) -> Self {
        FnSink {
            f,
            _fut: PhantomData,
        }
    }
}

#[async_trait]
impl<T, F, Fut> WritableSink<T> for FnSink<F, Fut>
where
    T: Send + 'static,
    F: FnMut(T) -> Fut + Send,
    Fut: Future<Output = StreamResult<()>> + Send + 'static,
{
    async fn write(&mut self, chunk: T) -> StreamResult<()> {
        (self.f)(chunk).await
    }
}
