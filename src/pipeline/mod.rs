//! Pipeline composition

pub mod builder;

pub use builder::{pipe, Pipeline};
