use crate::readable::ItemStream;
use crate::stage::{self, TransformStage};
use std::sync::Arc;

/// A Pipe represents a reusable stream transformation from one type to another.
/// It's a function from ItemStream[I] to ItemStream[O].
///
/// Unlike a [`TransformStage`], a pipe can be applied any number of times;
/// each application builds fresh stages, so operator-local state such as a
/// scan accumulator is never shared between pipelines.
pub struct Pipe<I, O> {
    f: Arc<dyn Fn(ItemStream<I>) -> ItemStream<O> + Send + Sync + 'static>,
}

impl<I, O> Clone for Pipe<I, O> {
    fn clone(&self) -> Self {
        Pipe {
            f: Arc::clone(&self.f),
        }
    }
}

impl<I, O> Pipe<I, O> {
    /// Create a new pipe from a function
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(ItemStream<I>) -> ItemStream<O> + Send + Sync + 'static,
    {
        Pipe { f: Arc::new(f) }
    }

    /// Apply this pipe to a stream
    pub fn apply(&self, input: ItemStream<I>) -> ItemStream<O> {
        (self.f)(input)
    }
}

impl<I, O> Pipe<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Create a pipe that builds a new stage from `factory` on every application
    pub fn from_stage<F>(factory: F) -> Self
    where
        F: Fn() -> TransformStage<I, O> + Send + Sync + 'static,
    {
        Pipe::new(move |input| factory().apply(input))
    }
}

/// Create a pipe that applies the given function to each element
pub fn map<I, O, F>(f: F) -> Pipe<I, O>
where
    F: Fn(I) -> O + Send + Sync + Clone + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    Pipe::from_stage(move || stage::map(f.clone()))
}

/// Create a pipe that filters elements based on the predicate
pub fn filter<I, F>(predicate: F) -> Pipe<I, I>
where
    F: Fn(&I) -> bool + Send + Sync + Clone + 'static,
    I: Send + 'static,
{
    Pipe::from_stage(move || stage::filter(predicate.clone()))
}

/// Create a pipe emitting running accumulators, starting from `init` on
/// every application
pub fn scan<I, A, F>(init: A, f: F) -> Pipe<I, A>
where
    F: Fn(A, I) -> A + Send + Sync + Clone + 'static,
    I: Send + 'static,
    A: Clone + Send + Sync + 'static,
{
    Pipe::from_stage(move || stage::scan(init.clone(), f.clone()))
}

/// Compose two pipes together
pub fn compose<I, M, O>(p1: Pipe<I, M>, p2: Pipe<M, O>) -> Pipe<I, O>
where
    I: Send + 'static,
    M: Send + 'static,
    O: Send + 'static,
{
    Pipe::new(move |input| p2.apply(p1.apply(input)))
}

/// Identity pipe that doesn't transform the stream
pub fn identity<I>() -> Pipe<I, I>
where
    I: Send + 'static,
{
    Pipe::new(|input| input)
}

/// Extension trait for pipes
pub trait PipeExt<I, O> {
    /// Compose this pipe with another pipe
    fn compose<P>(self, other: Pipe<O, P>) -> Pipe<I, P>
    where
        P: Send + 'static;
}

impl<I, O> PipeExt<I, O> for Pipe<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn compose<P>(self, other: Pipe<O, P>) -> Pipe<I, P>
    where
        P: Send + 'static,
    {
        compose(self, other)
    }
}
