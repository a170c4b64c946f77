//! Transform stages
//!
//! A [`TransformStage`] wraps a [`Transformer`] as a one-in, zero-or-more-out
//! stream stage. The stage is pull driven: it asks its upstream for the next
//! item only after everything emitted for the previous item has been taken
//! by the downstream consumer, so transform calls never overlap and a slow
//! consumer holds the whole chain still.

use async_stream::stream;
use async_trait::async_trait;
use futures_util::stream::StreamExt;
use std::fmt::Display;
use std::future::Future;
use std::marker::PhantomData;

use crate::error::{StreamError, StreamResult};
use crate::readable::ItemStream;

/// Output port handed to [`Transformer`] hooks
#[derive(Debug)]
pub struct Emitter<O> {
    pending: Vec<O>,
    error: Option<StreamError>,
    terminated: bool,
}

impl<O> Emitter<O> {
    fn new() -> Self {
        Emitter {
            pending: Vec::new(),
            error: None,
            terminated: false,
        }
    }

    /// Emit a value downstream
    pub fn emit(&mut self, value: O) {
        self.pending.push(value);
    }

    /// Fail the stage. Values emitted in the same call are discarded.
    pub fn error(&mut self, err: StreamError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// End the output after the values emitted so far; upstream is dropped
    pub fn terminate(&mut self) {
        self.terminated = true;
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Resolve one hook call into the values to forward, or the stage error
    fn settle(&mut self, outcome: StreamResult<()>) -> StreamResult<Vec<O>> {
        let failure = outcome.err().or_else(|| self.error.take());
        match failure {
            Some(err) => {
                self.pending.clear();
                Err(err)
            }
            None => Ok(std::mem::take(&mut self.pending)),
        }
    }
}

/// Hooks of a custom stage
#[async_trait]
pub trait Transformer<I, O>: Send
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Runs once before the first upstream pull
    async fn start(&mut self, _emitter: &mut Emitter<O>) -> StreamResult<()> {
        Ok(())
    }

    /// Runs once per upstream item, strictly in arrival order
    async fn transform(&mut self, item: I, emitter: &mut Emitter<O>) -> StreamResult<()>;

    /// Runs once when upstream completes, before the stage completes
    async fn flush(&mut self, _emitter: &mut Emitter<O>) -> StreamResult<()> {
        Ok(())
    }
}

/// A single-use stage owning its transformer and any operator-local state
pub struct TransformStage<I, O> {
    name: String,
    transformer: Box<dyn Transformer<I, O>>,
}

impl<I, O> TransformStage<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    pub fn new<Tr>(transformer: Tr) -> Self
    where
        Tr: Transformer<I, O> + 'static,
    {
        TransformStage {
            name: "transform".to_string(),
            transformer: Box::new(transformer),
        }
    }

    /// Set the name used in pipeline logs
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Connect `input` to this stage and return the stage's output port
    pub fn apply(self, input: ItemStream<I>) -> ItemStream<O> {
        let mut transformer = self.transformer;
        stream! {
            let mut input = input;
            let mut emitter = Emitter::new();

            let outcome = transformer.start(&mut emitter).await;
            match emitter.settle(outcome) {
                Ok(values) => for value in values { yield Ok(value); },
                Err(err) => {
                    yield Err(err);
                    return;
                }
            }
            if emitter.is_terminated() {
                return;
            }

            loop {
                match input.next().await {
                    Some(Ok(item)) => {
                        let outcome = transformer.transform(item, &mut emitter).await;
                        match emitter.settle(outcome) {
                            Ok(values) => for value in values { yield Ok(value); },
                            Err(err) => {
                                yield Err(err);
                                return;
                            }
                        }
                        if emitter.is_terminated() {
                            return;
                        }
                    }
                    Some(Err(err)) => {
                        yield Err(err);
                        return;
                    }
                    None => break,
                }
            }

            let outcome = transformer.flush(&mut emitter).await;
            match emitter.settle(outcome) {
                Ok(values) => for value in values { yield Ok(value); },
                Err(err) => {
                    yield Err(err);
                }
            }
        }
        .boxed()
    }
}

// ================================
// Built-in transformers
// ================================

struct MapTransformer<F> {
    f: F,
}

#[async_trait]
impl<I, O, F> Transformer<I, O> for MapTransformer<F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: FnMut(I) -> StreamResult<O> + Send,
{
    async fn transform(&mut self, item: I, emitter: &mut Emitter<O>) -> StreamResult<()> {
        emitter.emit((self.f)(item)?);
        Ok(())
    }
}

struct EvalMapTransformer<F, Fut> {
    f: F,
    _fut: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<I, O, F, Fut> Transformer<I, O> for EvalMapTransformer<F, Fut>
where
    I: Send + 'static,
    O: Send + 'static,
    F: FnMut(I) -> Fut + Send,
    Fut: Future<Output = StreamResult<O>> + Send + 'static,
{
    async fn transform(&mut self, item: I, emitter: &mut Emitter<O>) -> StreamResult<()> {
        let value = (self.f)(item).await?;
        emitter.emit(value);
        Ok(())
    }
}

struct FilterTransformer<F> {
    predicate: F,
}

#[async_trait]
impl<I, F> Transformer<I, I> for FilterTransformer<F>
where
    I: Send + 'static,
    F: FnMut(&I) -> StreamResult<bool> + Send,
{
    async fn transform(&mut self, item: I, emitter: &mut Emitter<I>) -> StreamResult<()> {
        if (self.predicate)(&item)? {
            emitter.emit(item);
        }
        Ok(())
    }
}

struct EvalFilterTransformer<F, Fut> {
    predicate: F,
    _fut: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<I, F, Fut> Transformer<I, I> for EvalFilterTransformer<F, Fut>
where
    I: Send + 'static,
    F: FnMut(&I) -> Fut + Send,
    Fut: Future<Output = StreamResult<bool>> + Send + 'static,
{
    async fn transform(&mut self, item: I, emitter: &mut Emitter<I>) -> StreamResult<()> {
        if (self.predicate)(&item).await? {
            emitter.emit(item);
        }
        Ok(())
    }
}

struct ForEachTransformer<F> {
    f: F,
}

#[async_trait]
impl<I, F> Transformer<I, I> for ForEachTransformer<F>
where
    I: Send + 'static,
    F: FnMut(&I) + Send,
{
    async fn transform(&mut self, item: I, emitter: &mut Emitter<I>) -> StreamResult<()> {
        (self.f)(&item);
        emitter.emit(item);
        Ok(())
    }
}

struct EvalForEachTransformer<F, Fut> {
    f: F,
    _fut: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<I, F, Fut> Transformer<I, I> for EvalForEachTransformer<F, Fut>
where
    I: Send + 'static,
    F: FnMut(&I) -> Fut + Send,
    Fut: Future<Output = StreamResult<()>> + Send + 'static,
{
    async fn transform(&mut self, item: I, emitter: &mut Emitter<I>) -> StreamResult<()> {
        (self.f)(&item).await?;
        emitter.emit(item);
        Ok(())
    }
}

struct TakeTransformer {
    limit: usize,
    count: usize,
}

#[async_trait]
impl<I> Transformer<I, I> for TakeTransformer
where
    I: Send + 'static,
{
    async fn start(&mut self, emitter: &mut Emitter<I>) -> StreamResult<()> {
        if self.limit == 0 {
            emitter.terminate();
        }
        Ok(())
    }

    async fn transform(&mut self, item: I, emitter: &mut Emitter<I>) -> StreamResult<()> {
        if self.count < self.limit {
            self.count += 1;
            emitter.emit(item);
        }
        if self.count >= self.limit {
            emitter.terminate();
        }
        Ok(())
    }
}

struct SkipTransformer {
    skip: usize,
    count: usize,
}

#[async_trait]
impl<I> Transformer<I, I> for SkipTransformer
where
    I: Send + 'static,
{
    async fn transform(&mut self, item: I, emitter: &mut Emitter<I>) -> StreamResult<()> {
        if self.count < self.skip {
            self.count += 1;
        } else {
            emitter.emit(item);
        }
        Ok(())
    }
}

struct ScanTransformer<A, F> {
    acc: A,
    f: F,
}

#[async_trait]
impl<I, A, F> Transformer<I, A> for ScanTransformer<A, F>
where
    I: Send + 'static,
    A: Clone + Send + 'static,
    F: FnMut(A, I) -> A + Send,
{
    async fn transform(&mut self, item: I, emitter: &mut Emitter<A>) -> StreamResult<()> {
        let next = (self.f)(self.acc.clone(), item);
        emitter.emit(next.clone());
        self.acc = next;
        Ok(())
    }
}

struct EvalScanTransformer<A, F, Fut> {
    acc: A,
    f: F,
    _fut: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<I, A, F, Fut> Transformer<I, A> for EvalScanTransformer<A, F, Fut>
where
    I: Send + 'static,
    A: Clone + Send + 'static,
    F: FnMut(A, I) -> Fut + Send,
    Fut: Future<Output = StreamResult<A>> + Send + 'static,
{
    async fn transform(&mut self, item: I, emitter: &mut Emitter<A>) -> StreamResult<()> {
        let next = (self.f)(self.acc.clone(), item).await?;
        emitter.emit(next.clone());
        self.acc = next;
        Ok(())
    }
}

// ================================
// Stage constructors
// ================================

/// Exactly one output per input
pub fn map<I, O, F>(mut f: F) -> TransformStage<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
    F: FnMut(I) -> O + Send + 'static,
{
    TransformStage::new(MapTransformer {
        f: move |item: I| -> StreamResult<O> { Ok(f(item)) },
    })
    .named("map")
}

/// Like [`map`], but a failing `f` errors the stage
pub fn try_map<I, O, E, F>(mut f: F) -> TransformStage<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
    E: Display,
    F: FnMut(I) -> Result<O, E> + Send + 'static,
{
    TransformStage::new(MapTransformer {
        f: move |item: I| -> StreamResult<O> { f(item).map_err(StreamError::transform) },
    })
    .named("try_map")
}

/// Map with an async function; the next item is not pulled until the
/// returned future resolves and its value is accepted downstream
pub fn eval_map<I, O, F, Fut>(f: F) -> TransformStage<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
    F: FnMut(I) -> Fut + Send + 'static,
    Fut: Future<Output = StreamResult<O>> + Send + 'static,
{
    TransformStage::new(EvalMapTransformer {
        f,
        _fut: PhantomData,
    })
    .named("eval_map")
}

/// Zero or one output per input
pub fn filter<I, F>(mut predicate: F) -> TransformStage<I, I>
where
    I: Send + 'static,
    F: FnMut(&I) -> bool + Send + 'static,
{
    TransformStage::new(FilterTransformer {
        predicate: move |item: &I| -> StreamResult<bool> { Ok(predicate(item)) },
    })
    .named("filter")
}

/// Like [`filter`], but a failing predicate errors the stage
pub fn try_filter<I, E, F>(mut predicate: F) -> TransformStage<I, I>
where
    I: Send + 'static,
    E: Display,
    F: FnMut(&I) -> Result<bool, E> + Send + 'static,
{
    TransformStage::new(FilterTransformer {
        predicate: move |item: &I| -> StreamResult<bool> {
            predicate(item).map_err(StreamError::transform)
        },
    })
    .named("try_filter")
}

/// Filter with an async predicate; predicates never overlap
pub fn eval_filter<I, F, Fut>(predicate: F) -> TransformStage<I, I>
where
    I: Send + 'static,
    F: FnMut(&I) -> Fut + Send + 'static,
    Fut: Future<Output = StreamResult<bool>> + Send + 'static,
{
    TransformStage::new(EvalFilterTransformer {
        predicate,
        _fut: PhantomData,
    })
    .named("eval_filter")
}

/// Run `f` on each item before passing it through unchanged
pub fn for_each<I, F>(f: F) -> TransformStage<I, I>
where
    I: Send + 'static,
    F: FnMut(&I) + Send + 'static,
{
    TransformStage::new(ForEachTransformer { f }).named("for_each")
}

/// Like [`for_each`], but the item is passed on only once the effect
/// returned by `f` has resolved
pub fn eval_for_each<I, F, Fut>(f: F) -> TransformStage<I, I>
where
    I: Send + 'static,
    F: FnMut(&I) -> Fut + Send + 'static,
    Fut: Future<Output = StreamResult<()>> + Send + 'static,
{
    TransformStage::new(EvalForEachTransformer {
        f,
        _fut: PhantomData,
    })
    .named("eval_for_each")
}

/// Pass the first `n` items, then end the output and drop upstream
pub fn take<I>(n: usize) -> TransformStage<I, I>
where
    I: Send + 'static,
{
    TransformStage::new(TakeTransformer { limit: n, count: 0 }).named("take")
}

/// Drop the first `n` items, pass everything after
pub fn skip<I>(n: usize) -> TransformStage<I, I>
where
    I: Send + 'static,
{
    TransformStage::new(SkipTransformer { skip: n, count: 0 }).named("skip")
}

/// Emit every intermediate accumulator of a left fold
pub fn scan<I, A, F>(init: A, f: F) -> TransformStage<I, A>
where
    I: Send + 'static,
    A: Clone + Send + 'static,
    F: FnMut(A, I) -> A + Send + 'static,
{
    TransformStage::new(ScanTransformer { acc: init, f }).named("scan")
}

/// Scan with an async step function
pub fn eval_scan<I, A, F, Fut>(init: A, f: F) -> TransformStage<I, A>
where
    I: Send + 'static,
    A: Clone + Send + 'static,
    F: FnMut(A, I) -> Fut + Send + 'static,
    Fut: Future<Output = StreamResult<A>> + Send + 'static,
{
    TransformStage::new(EvalScanTransformer {
        acc: init,
        f,
        _fut: PhantomData,
    })
    .named("eval_scan")
}
