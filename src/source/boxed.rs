//! Type-erased sources.
//!
//! Useful when sources of different concrete types must live in one
//! collection, e.g. the inputs of [`race`](crate::ops::race) or the nested
//! sources returned by an expansion stage's closure.

use std::pin::Pin;

use super::Source;

/// A boxed, `Send` source.
pub type BoxSource<'a, T> = Pin<Box<dyn Source<Item = T> + Send + 'a>>;

/// A boxed source that stays on its thread.
pub type LocalBoxSource<'a, T> = Pin<Box<dyn Source<Item = T> + 'a>>;
