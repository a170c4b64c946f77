//! Collect policies
//!
//! `collect` concatenates a drained stream according to a [`CollectPolicy`]
//! chosen by the caller, or inferred once from the first item. The result
//! is the tagged [`Collected`] union, so its shape is known statically.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::error::{StreamError, StreamResult};

/// How a drained sequence is combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectPolicy {
    /// Concatenate buffers into one buffer of the first chunk's element type
    Buffer,
    /// Join textual renderings with an empty separator
    Text,
    /// Keep the ordered sequence
    Items,
}

/// Result of a collect
#[derive(Debug, Clone, PartialEq)]
pub enum Collected<T> {
    Buffer(TypedBuffer),
    Text(String),
    Items(Vec<T>),
}

impl<T> Collected<T> {
    pub fn into_buffer(self) -> Option<TypedBuffer> {
        match self {
            Collected::Buffer(buffer) => Some(buffer),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Collected::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_items(self) -> Option<Vec<T>> {
        match self {
            Collected::Items(items) => Some(items),
            _ => None,
        }
    }
}

/// A contiguous buffer of fixed-width elements
#[derive(Debug, Clone, PartialEq)]
pub enum TypedBuffer {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    F64(Vec<f64>),
}

/// Integer sources are converted with `as`, so narrowing wraps. Float
/// sources go through `$float`.
macro_rules! cast_extend {
    ($dst:expr, $src:expr, $ty:ty, |$f:ident| $float:expr) => {
        match $src {
            TypedBuffer::U8(v) => $dst.extend(v.iter().map(|&x| x as $ty)),
            TypedBuffer::U16(v) => $dst.extend(v.iter().map(|&x| x as $ty)),
            TypedBuffer::U32(v) => $dst.extend(v.iter().map(|&x| x as $ty)),
            TypedBuffer::F64(v) => $dst.extend(v.iter().map(|&$f| $float)),
        }
    };
}

impl TypedBuffer {
    /// Number of elements (not bytes)
    pub fn len(&self) -> usize {
        match self {
            TypedBuffer::U8(v) => v.len(),
            TypedBuffer::U16(v) => v.len(),
            TypedBuffer::U32(v) => v.len(),
            TypedBuffer::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of one element in bytes
    pub fn element_width(&self) -> usize {
        match self {
            TypedBuffer::U8(_) => 1,
            TypedBuffer::U16(_) => 2,
            TypedBuffer::U32(_) => 4,
            TypedBuffer::F64(_) => 8,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.len() * self.element_width()
    }

    fn empty_like(&self, capacity: usize) -> TypedBuffer {
        match self {
            TypedBuffer::U8(_) => TypedBuffer::U8(Vec::with_capacity(capacity)),
            TypedBuffer::U16(_) => TypedBuffer::U16(Vec::with_capacity(capacity)),
            TypedBuffer::U32(_) => TypedBuffer::U32(Vec::with_capacity(capacity)),
            TypedBuffer::F64(_) => TypedBuffer::F64(Vec::with_capacity(capacity)),
        }
    }

    /// Append `other`, casting its elements to this buffer's element type.
    ///
    /// Narrowing wraps modulo the target width for every source type: a
    /// float is truncated toward zero to an `i64` first, so `300.0` becomes
    /// `44u8` and `-1.0` becomes `255u8`, exactly like `300u32` and a
    /// wrapped `-1`. Floats outside the `i64` range saturate there and NaN
    /// becomes 0.
    fn extend_from(&mut self, other: &TypedBuffer) {
        match self {
            TypedBuffer::U8(dst) => cast_extend!(dst, other, u8, |x| x as i64 as u8),
            TypedBuffer::U16(dst) => cast_extend!(dst, other, u16, |x| x as i64 as u16),
            TypedBuffer::U32(dst) => cast_extend!(dst, other, u32, |x| x as i64 as u32),
            TypedBuffer::F64(dst) => cast_extend!(dst, other, f64, |x| x),
        }
    }

    /// Concatenate chunks into one buffer shaped like the first chunk.
    ///
    /// Capacity is the total element count. Returns `None` for no chunks.
    pub fn concat<'a, I>(chunks: I) -> Option<TypedBuffer>
    where
        I: IntoIterator<Item = &'a TypedBuffer>,
    {
        let chunks: Vec<&TypedBuffer> = chunks.into_iter().collect();
        let first = chunks.first()?;
        let total: usize = chunks.iter().map(|chunk| chunk.len()).sum();

        let mut out = first.empty_like(total);
        for chunk in &chunks {
            out.extend_from(chunk);
        }
        Some(out)
    }

    /// Comma separated element list
    pub fn render(&self) -> String {
        fn join<V: ToString>(values: &[V]) -> String {
            values
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",")
        }
        match self {
            TypedBuffer::U8(v) => join(v),
            TypedBuffer::U16(v) => join(v),
            TypedBuffer::U32(v) => join(v),
            TypedBuffer::F64(v) => join(v),
        }
    }
}

impl From<Vec<u8>> for TypedBuffer {
    fn from(v: Vec<u8>) -> Self {
        TypedBuffer::U8(v)
    }
}

impl From<Vec<u16>> for TypedBuffer {
    fn from(v: Vec<u16>) -> Self {
        TypedBuffer::U16(v)
    }
}

impl From<Vec<u32>> for TypedBuffer {
    fn from(v: Vec<u32>) -> Self {
        TypedBuffer::U32(v)
    }
}

impl From<Vec<f64>> for TypedBuffer {
    fn from(v: Vec<f64>) -> Self {
        TypedBuffer::F64(v)
    }
}

/// Mixed item type for streams whose chunks differ in shape
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    Buffer(TypedBuffer),
    Text(String),
    Value(serde_json::Value),
}

impl From<TypedBuffer> for Chunk {
    fn from(buffer: TypedBuffer) -> Self {
        Chunk::Buffer(buffer)
    }
}

impl From<String> for Chunk {
    fn from(text: String) -> Self {
        Chunk::Text(text)
    }
}

impl From<&str> for Chunk {
    fn from(text: &str) -> Self {
        Chunk::Text(text.to_string())
    }
}

impl From<serde_json::Value> for Chunk {
    fn from(value: serde_json::Value) -> Self {
        Chunk::Value(value)
    }
}

/// Items that can be concatenated by `collect`
pub trait Collectable {
    /// Policy inferred when this item is the first of the stream
    fn collect_policy(&self) -> CollectPolicy;

    /// Buffer view used by [`CollectPolicy::Buffer`]
    fn buffer_view(&self) -> Option<Cow<'_, TypedBuffer>> {
        None
    }

    /// Borrowed bytes of an 8-bit buffer. When every item has one, a
    /// `Buffer` collect copies each byte once straight into the result.
    fn byte_view(&self) -> Option<&[u8]> {
        None
    }

    /// Rendering used by [`CollectPolicy::Text`]
    fn to_text(&self) -> String;
}

impl Collectable for TypedBuffer {
    fn collect_policy(&self) -> CollectPolicy {
        CollectPolicy::Buffer
    }

    fn buffer_view(&self) -> Option<Cow<'_, TypedBuffer>> {
        Some(Cow::Borrowed(self))
    }

    fn byte_view(&self) -> Option<&[u8]> {
        match self {
            TypedBuffer::U8(bytes) => Some(bytes.as_slice()),
            _ => None,
        }
    }

    fn to_text(&self) -> String {
        self.render()
    }
}

impl Collectable for Vec<u8> {
    fn collect_policy(&self) -> CollectPolicy {
        CollectPolicy::Buffer
    }

    fn buffer_view(&self) -> Option<Cow<'_, TypedBuffer>> {
        Some(Cow::Owned(TypedBuffer::U8(self.clone())))
    }

    fn byte_view(&self) -> Option<&[u8]> {
        Some(self.as_slice())
    }

    fn to_text(&self) -> String {
        String::from_utf8_lossy(self).into_owned()
    }
}

impl Collectable for String {
    fn collect_policy(&self) -> CollectPolicy {
        CollectPolicy::Text
    }

    fn to_text(&self) -> String {
        self.clone()
    }
}

impl Collectable for &'static str {
    fn collect_policy(&self) -> CollectPolicy {
        CollectPolicy::Text
    }

    fn to_text(&self) -> String {
        (*self).to_string()
    }
}

impl Collectable for Chunk {
    fn collect_policy(&self) -> CollectPolicy {
        match self {
            Chunk::Buffer(_) => CollectPolicy::Buffer,
            Chunk::Text(_) => CollectPolicy::Text,
            Chunk::Value(_) => CollectPolicy::Items,
        }
    }

    fn buffer_view(&self) -> Option<Cow<'_, TypedBuffer>> {
        match self {
            Chunk::Buffer(buffer) => Some(Cow::Borrowed(buffer)),
            _ => None,
        }
    }

    fn byte_view(&self) -> Option<&[u8]> {
        match self {
            Chunk::Buffer(buffer) => buffer.byte_view(),
            _ => None,
        }
    }

    fn to_text(&self) -> String {
        match self {
            Chunk::Buffer(buffer) => buffer.render(),
            Chunk::Text(text) => text.clone(),
            Chunk::Value(serde_json::Value::String(text)) => text.clone(),
            Chunk::Value(value) => value.to_string(),
        }
    }
}

/// Policy of the first item, or `Items` for an empty sequence
pub fn infer_policy<T: Collectable>(items: &[T]) -> CollectPolicy {
    items
        .first()
        .map_or(CollectPolicy::Items, Collectable::collect_policy)
}

/// Combine `items` under `policy`. An empty sequence always yields
/// `Collected::Items(vec![])`.
pub fn collect_items<T: Collectable>(
    items: Vec<T>,
    policy: CollectPolicy,
) -> StreamResult<Collected<T>> {
    if items.is_empty() {
        return Ok(Collected::Items(items));
    }

    match policy {
        CollectPolicy::Items => Ok(Collected::Items(items)),
        CollectPolicy::Text => Ok(Collected::Text(
            items.iter().map(Collectable::to_text).collect(),
        )),
        CollectPolicy::Buffer => {
            if let Some(bytes) = concat_bytes(&items) {
                return Ok(Collected::Buffer(TypedBuffer::U8(bytes)));
            }
            let views = items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    item.buffer_view().ok_or_else(|| {
                        StreamError::Collect(format!("item {} is not a buffer", index))
                    })
                })
                .collect::<StreamResult<Vec<_>>>()?;
            let buffer = TypedBuffer::concat(views.iter().map(|view| &**view))
                .ok_or_else(|| StreamError::Collect("no buffers to concatenate".to_string()))?;
            Ok(Collected::Buffer(buffer))
        }
    }
}

/// Single-copy concatenation when every item is an 8-bit buffer
fn concat_bytes<T: Collectable>(items: &[T]) -> Option<Vec<u8>> {
    let slices = items
        .iter()
        .map(Collectable::byte_view)
        .collect::<Option<Vec<&[u8]>>>()?;
    Some(slices.concat())
}
