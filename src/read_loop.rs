//! Single-reader consumption loop shared by every terminal operator
//!
//! A [`ReadLoop`] owns the exclusive [`Reader`] of a readable for its whole
//! lifetime. Each consuming method takes `self`, so the lock is released
//! when the method returns, whether it finishes, short-circuits or fails.

use crate::error::StreamResult;
use crate::readable::{Readable, Reader};

pub struct ReadLoop<T> {
    reader: Reader<T>,
}

impl<T: Send + 'static> ReadLoop<T> {
    /// Lock `readable` for this loop; fails with `ConcurrentAccess` if it is
    /// already being read
    pub fn acquire(readable: &Readable<T>) -> StreamResult<Self> {
        Ok(ReadLoop {
            reader: readable.get_reader()?,
        })
    }

    /// Read every item in arrival order
    pub async fn consume_all(mut self) -> StreamResult<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.reader.read().await? {
            items.push(item);
        }
        Ok(items)
    }

    /// Read until `predicate` holds and return that item.
    ///
    /// On a match the rest of the stream is cancelled.
    pub async fn consume_until<F>(mut self, mut predicate: F) -> StreamResult<Option<T>>
    where
        F: FnMut(&T) -> bool,
    {
        while let Some(item) = self.reader.read().await? {
            if predicate(&item) {
                self.reader.cancel();
                return Ok(Some(item));
            }
        }
        Ok(None)
    }

    /// Sequential left fold over the remaining items
    pub async fn fold_left<A, F>(mut self, init: A, mut f: F) -> StreamResult<A>
    where
        F: FnMut(A, T) -> A,
    {
        let mut acc = init;
        while let Some(item) = self.reader.read().await? {
            acc = f(acc, item);
        }
        Ok(acc)
    }
}
