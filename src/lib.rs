//! pipestream - backpressure-preserving async stream pipelines
//!
//! Sources become [`Readable`] endpoints, stages are chained with
//! [`Pipeline::pipe`], and a pipeline ends either in a terminal operator of
//! [`EnhancedStream`] or in a sink via `pipe_to`. Every endpoint admits a
//! single reader (or writer) at a time.

pub mod error;
pub mod stream_configuration;

pub mod readable;
pub mod queue;
pub mod read_loop;

pub mod stage;
pub mod pipe;
pub mod pipeline;

pub mod collect;
pub mod enhanced;
pub mod sink;

pub use collect::{Chunk, CollectPolicy, Collectable, Collected, TypedBuffer};
pub use enhanced::{from_iter, EnhancedStream};
pub use error::{StreamError, StreamResult};
pub use pipeline::{pipe, Pipeline};
pub use queue::{push_channel, PushHandle};
pub use read_loop::ReadLoop;
pub use readable::{ItemStream, Readable, Reader};
pub use sink::{FileHandle, FileSink, FnSink, RandomAccessWriter, Writable, WritableSink, Writer};
pub use stage::{Emitter, TransformStage, Transformer};
pub use stream_configuration::{FileSinkConfig, PipelineConfig, QueueConfig};
