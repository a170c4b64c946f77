//! Array-like operators over a pipeline
//!
//! [`EnhancedStream`] layers chainable stage producers (`map`, `filter`,
//! `take`, ...) and terminal consumers (`reduce`, `find`, `to_array`, ...)
//! over a [`Pipeline`]. Every terminal runs on a [`ReadLoop`].
//!
//! # Examples
//! ```
//! use pipestream::enhanced::from_iter;
//!
//! # async fn example() {
//! let result = from_iter(1..=10)
//!     .skip(2)
//!     .filter(|x| x % 2 == 0)
//!     .map(|x| x * 2)
//!     .take(3)
//!     .to_array()
//!     .await;
//! assert_eq!(result, Ok(vec![8, 12, 16]));
//! # }
//! ```

use futures_core::Stream;
use std::fmt::Display;
use std::future::Future;

use crate::collect::{self, CollectPolicy, Collectable, Collected};
use crate::error::StreamResult;
use crate::pipe::Pipe;
use crate::pipeline::Pipeline;
use crate::read_loop::ReadLoop;
use crate::readable::Readable;
use crate::sink::{Writable, WritableSink};
use crate::stage::{self, TransformStage, Transformer};
use crate::stream_configuration::PipelineConfig;

/// Create an enhanced stream from an iterator
pub fn from_iter<I, T>(iter: I) -> EnhancedStream<T>
where
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
    T: Send + 'static,
{
    EnhancedStream::new(Readable::from_iter(iter))
}

/// A pipeline with array-like operators
pub struct EnhancedStream<T> {
    pipeline: Pipeline<T>,
}

impl<T: Send + 'static> From<Pipeline<T>> for EnhancedStream<T> {
    fn from(pipeline: Pipeline<T>) -> Self {
        EnhancedStream { pipeline }
    }
}

impl<T: Send + 'static> EnhancedStream<T> {
    pub fn new(source: Readable<T>) -> Self {
        Pipeline::new(source).into()
    }

    /// Wrap an infallible stream
    pub fn from_stream<S>(source: S) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        Self::new(Readable::from_stream(source))
    }

    /// Wrap an iterator of results; the first `Err` errors the stream
    pub fn from_try_iter<I, E>(iter: I) -> Self
    where
        I: IntoIterator<Item = Result<T, E>>,
        I::IntoIter: Send + 'static,
        E: Display,
    {
        Self::new(Readable::from_try_iter(iter))
    }

    pub fn with_config(self, config: PipelineConfig) -> Self {
        self.pipeline.with_config(config).into()
    }

    pub fn readable(&self) -> &Readable<T> {
        self.pipeline.readable()
    }

    pub fn into_pipeline(self) -> Pipeline<T> {
        self.pipeline
    }

    // ================================
    // Stage producers
    // ================================

    /// Attach an arbitrary stage
    pub fn pipe<O>(self, stage: TransformStage<T, O>) -> EnhancedStream<O>
    where
        O: Send + 'static,
    {
        self.pipeline.pipe(stage).into()
    }

    /// Attach a fresh application of a reusable pipe
    pub fn pipe_with<O>(self, pipe: &Pipe<T, O>) -> EnhancedStream<O>
    where
        O: Send + 'static,
    {
        self.pipeline.pipe_with(pipe).into()
    }

    /// Attach a custom [`Transformer`]
    pub fn transform<O, Tr>(self, transformer: Tr) -> EnhancedStream<O>
    where
        O: Send + 'static,
        Tr: Transformer<T, O> + 'static,
    {
        self.pipe(TransformStage::new(transformer))
    }

    pub fn map<O, F>(self, f: F) -> EnhancedStream<O>
    where
        O: Send + 'static,
        F: FnMut(T) -> O + Send + 'static,
    {
        self.pipe(stage::map(f))
    }

    pub fn try_map<O, E, F>(self, f: F) -> EnhancedStream<O>
    where
        O: Send + 'static,
        E: Display,
        F: FnMut(T) -> Result<O, E> + Send + 'static,
    {
        self.pipe(stage::try_map(f))
    }

    pub fn eval_map<O, F, Fut>(self, f: F) -> EnhancedStream<O>
    where
        O: Send + 'static,
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = StreamResult<O>> + Send + 'static,
    {
        self.pipe(stage::eval_map(f))
    }

    pub fn filter<F>(self, predicate: F) -> EnhancedStream<T>
    where
        F: FnMut(&T) -> bool + Send + 'static,
    {
        self.pipe(stage::filter(predicate))
    }

    pub fn eval_filter<F, Fut>(self, predicate: F) -> EnhancedStream<T>
    where
        F: FnMut(&T) -> Fut + Send + 'static,
        Fut: Future<Output = StreamResult<bool>> + Send + 'static,
    {
        self.pipe(stage::eval_filter(predicate))
    }

    pub fn try_filter<E, F>(self, predicate: F) -> EnhancedStream<T>
    where
        E: Display,
        F: FnMut(&T) -> Result<bool, E> + Send + 'static,
    {
        self.pipe(stage::try_filter(predicate))
    }

    /// Run a side effect on each item before it becomes visible downstream
    pub fn for_each<F>(self, f: F) -> EnhancedStream<T>
    where
        F: FnMut(&T) + Send + 'static,
    {
        self.pipe(stage::for_each(f))
    }

    /// Await an async side effect on each item before it becomes visible
    /// downstream
    pub fn eval_for_each<F, Fut>(self, f: F) -> EnhancedStream<T>
    where
        F: FnMut(&T) -> Fut + Send + 'static,
        Fut: Future<Output = StreamResult<()>> + Send + 'static,
    {
        self.pipe(stage::eval_for_each(f))
    }

    pub fn take(self, n: usize) -> EnhancedStream<T> {
        self.pipe(stage::take(n))
    }

    pub fn skip(self, n: usize) -> EnhancedStream<T> {
        self.pipe(stage::skip(n))
    }

    pub fn scan<A, F>(self, init: A, f: F) -> EnhancedStream<A>
    where
        A: Clone + Send + 'static,
        F: FnMut(A, T) -> A + Send + 'static,
    {
        self.pipe(stage::scan(init, f))
    }

    pub fn eval_scan<A, F, Fut>(self, init: A, f: F) -> EnhancedStream<A>
    where
        A: Clone + Send + 'static,
        F: FnMut(A, T) -> Fut + Send + 'static,
        Fut: Future<Output = StreamResult<A>> + Send + 'static,
    {
        self.pipe(stage::eval_scan(init, f))
    }

    // ================================
    // Terminal operators
    // ================================

    /// Fold every item into `init`; an empty stream returns `init`
    pub async fn reduce<A, F>(self, init: A, f: F) -> StreamResult<A>
    where
        F: FnMut(A, T) -> A,
    {
        ReadLoop::acquire(self.readable())?.fold_left(init, f).await
    }

    /// First item satisfying `predicate`; the rest of the stream is cancelled
    pub async fn find<F>(self, predicate: F) -> StreamResult<Option<T>>
    where
        F: FnMut(&T) -> bool,
    {
        ReadLoop::acquire(self.readable())?
            .consume_until(predicate)
            .await
    }

    /// Whether any item satisfies `predicate`; false for an empty stream
    pub async fn some<F>(self, predicate: F) -> StreamResult<bool>
    where
        F: FnMut(&T) -> bool,
    {
        Ok(self.find(predicate).await?.is_some())
    }

    /// Whether every item satisfies `predicate`; true for an empty stream
    pub async fn every<F>(self, mut predicate: F) -> StreamResult<bool>
    where
        F: FnMut(&T) -> bool,
    {
        Ok(self.find(move |item| !predicate(item)).await?.is_none())
    }

    /// All items in arrival order
    pub async fn to_array(self) -> StreamResult<Vec<T>> {
        ReadLoop::acquire(self.readable())?.consume_all().await
    }

    /// Drain and concatenate using the policy of the first item
    pub async fn collect(self) -> StreamResult<Collected<T>>
    where
        T: Collectable,
    {
        let items = self.to_array().await?;
        let policy = collect::infer_policy(&items);
        collect::collect_items(items, policy)
    }

    /// Drain and concatenate using an explicit policy
    pub async fn collect_with(self, policy: CollectPolicy) -> StreamResult<Collected<T>>
    where
        T: Collectable,
    {
        let items = self.to_array().await?;
        collect::collect_items(items, policy)
    }

    /// Drain into `dest`; resolves after the sink closes
    pub async fn pipe_to(self, dest: &Writable<T>) -> StreamResult<()> {
        self.pipeline.pipe_to(dest).await
    }

    pub async fn pipe_to_sink<S>(self, sink: S) -> StreamResult<()>
    where
        S: WritableSink<T> + 'static,
    {
        self.pipeline.pipe_to_sink(sink).await
    }
}
