//! Sinks that terminate a pipeline

pub mod file_sink;
pub mod writable;

// Re-export main types
pub use file_sink::{FileHandle, FileSink, RandomAccessWriter};
pub use writable::{FnSink, Writable, WritableSink, Writer};
