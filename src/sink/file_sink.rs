//! Partial-write-safe file sink
//!
//! [`FileSink`] drives a [`RandomAccessWriter`] whose `write` may accept
//! fewer bytes than requested. Each chunk is retried from the write cursor
//! until every byte has landed. On close the target is truncated to the
//! cursor so stale trailing bytes of a pre-existing file disappear.

use async_trait::async_trait;
use std::io::{self, SeekFrom};
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use crate::error::{StreamError, StreamResult};
use crate::sink::writable::WritableSink;
use crate::stream_configuration::FileSinkConfig;

/// Random-access target with a possibly partial `write`
#[async_trait]
pub trait RandomAccessWriter: Send {
    /// Write up to `length` bytes of `buffer[offset..]` at `position`,
    /// returning how many bytes were actually written.
    async fn write(
        &mut self,
        buffer: &[u8],
        offset: usize,
        length: usize,
        position: u64,
    ) -> io::Result<usize>;

    async fn truncate(&mut self, len: u64) -> io::Result<()>;

    async fn close(&mut self) -> io::Result<()>;
}

/// [`RandomAccessWriter`] over a tokio file
#[derive(Debug)]
pub struct FileHandle {
    file: File,
    sync_on_close: bool,
}

impl FileHandle {
    /// Open `path` for writing without truncating it
    pub async fn open(path: impl AsRef<Path>, config: &FileSinkConfig) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(config.create)
            .truncate(false)
            .open(path)
            .await?;
        Ok(Self::from_file(file, config))
    }

    pub fn from_file(file: File, config: &FileSinkConfig) -> Self {
        FileHandle {
            file,
            sync_on_close: config.sync_on_close,
        }
    }
}

#[async_trait]
impl RandomAccessWriter for FileHandle {
    async fn write(
        &mut self,
        buffer: &[u8],
        offset: usize,
        length: usize,
        position: u64,
    ) -> io::Result<usize> {
        let end = offset
            .checked_add(length)
            .filter(|&end| end <= buffer.len())
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "write range exceeds buffer")
            })?;
        self.file.seek(SeekFrom::Start(position)).await?;
        self.file.write(&buffer[offset..end]).await
    }

    async fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.file.flush().await?;
        self.file.set_len(len).await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.file.flush().await?;
        if self.sync_on_close {
            self.file.sync_all().await?;
        }
        Ok(())
    }
}

/// Sink writing byte chunks sequentially through a [`RandomAccessWriter`]
pub struct FileSink<W> {
    handle: Option<W>,
    position: u64,
    config: FileSinkConfig,
}

impl FileSink<FileHandle> {
    /// Open `path` and wrap it in a sink starting at offset 0
    pub async fn open(path: impl AsRef<Path>, config: FileSinkConfig) -> StreamResult<Self> {
        let handle = FileHandle::open(path, &config).await?;
        Ok(Self::with_config(handle, config))
    }
}

impl<W: RandomAccessWriter> FileSink<W> {
    pub fn new(handle: W) -> Self {
        Self::with_config(handle, FileSinkConfig::default())
    }

    pub fn with_config(handle: W, config: FileSinkConfig) -> Self {
        FileSink {
            handle: Some(handle),
            position: 0,
            config,
        }
    }

    /// Where the next byte will land
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Whether the handle has been released by close or abort
    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }

    /// Write every byte of `bytes` at the cursor, retrying partial writes
    pub async fn write_chunk(&mut self, bytes: &[u8]) -> StreamResult<()> {
        let handle = self.handle.as_mut().ok_or(StreamError::Closed)?;
        let mut offset = 0;

        while offset < bytes.len() {
            let remaining = bytes.len() - offset;
            let written = handle
                .write(bytes, offset, remaining, self.position)
                .await?;

            if written == 0 {
                log::error!(
                    "Writer stalled at position {} with {} bytes remaining",
                    self.position,
                    remaining
                );
                return Err(StreamError::NoProgress {
                    position: self.position,
                    remaining,
                });
            }
            if written > remaining {
                return Err(StreamError::IO(format!(
                    "writer reported {} bytes written but only {} were requested",
                    written, remaining
                )));
            }
            if written < remaining {
                log::trace!(
                    "Partial write: {} of {} bytes at position {}",
                    written,
                    remaining,
                    self.position
                );
            }

            offset += written;
            self.position += written as u64;
        }
        Ok(())
    }

    /// Truncate to the cursor (if configured) and close the handle.
    ///
    /// The handle is closed even when truncation fails; the first error is
    /// returned. Closing an already released sink is a no-op.
    pub async fn close_handle(&mut self) -> StreamResult<()> {
        let Some(mut handle) = self.handle.take() else {
            return Ok(());
        };

        let truncated = if self.config.truncate_on_close {
            handle.truncate(self.position).await
        } else {
            Ok(())
        };
        let closed = handle.close().await;

        truncated?;
        closed?;
        log::debug!("File sink closed at position {}", self.position);
        Ok(())
    }

    /// Close the handle without truncating or writing anything further
    pub async fn abort_handle(&mut self) -> StreamResult<()> {
        match self.handle.take() {
            Some(mut handle) => {
                log::debug!("File sink aborted at position {}", self.position);
                handle.close().await?;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<W, C> WritableSink<C> for FileSink<W>
where
    W: RandomAccessWriter,
    C: AsRef<[u8]> + Send + Sync + 'static,
{
    async fn write(&mut self, chunk: C) -> StreamResult<()> {
        self.write_chunk(chunk.as_ref()).await
    }

    async fn close(&mut self) -> StreamResult<()> {
        self.close_handle().await
    }

    async fn abort(&mut self, reason: StreamError) -> StreamResult<()> {
        log::debug!("Aborting file sink: {}", reason);
        self.abort_handle().await
    }
}
