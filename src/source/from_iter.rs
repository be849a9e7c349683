//! Iterator-backed cold sources.

use std::{
  marker::PhantomData,
  pin::Pin,
  task::{Context, Poll},
};

use super::Source;
use crate::error::{Error, Result};

/// Creates a source that yields every item of `iter`, then ends.
///
/// ```rust
/// use futures::TryStreamExt;
/// use rxflow::prelude::*;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let values: Vec<_> = from_iter(1..4).into_stream().try_collect().await.unwrap();
/// assert_eq!(values, vec![1, 2, 3]);
/// # }
/// ```
pub fn from_iter<I: IntoIterator>(iter: I) -> FromIter<I::IntoIter> {
  FromIter { iter: Some(iter.into_iter()) }
}

/// A source yielding exactly `value`.
pub fn of<T>(value: T) -> FromIter<std::option::IntoIter<T>> { from_iter(Some(value)) }

/// A source that ends immediately.
pub fn empty<T>() -> FromIter<std::iter::Empty<T>> { from_iter(std::iter::empty()) }

/// A source that fails immediately, and on every later pull, with `err`.
pub fn throw_err<T>(err: Error) -> ThrowErr<T> { ThrowErr { err: Some(err), _item: PhantomData } }

#[derive(Clone, Debug)]
pub struct FromIter<I> {
  iter: Option<I>,
}

impl<I: Iterator + Unpin> Source for FromIter<I> {
  type Item = I::Item;

  fn poll_pull(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Result<I::Item>>> {
    let this = self.get_mut();
    let next = this.iter.as_mut().and_then(Iterator::next);
    if next.is_none() {
      this.iter = None;
    }
    Poll::Ready(next.map(Ok))
  }

  fn cancel(self: Pin<&mut Self>) { self.get_mut().iter = None; }

  fn name(&self) -> &'static str { "from_iter" }
}

#[derive(Clone, Debug)]
pub struct ThrowErr<T> {
  err: Option<Error>,
  _item: PhantomData<fn() -> T>,
}

impl<T> Source for ThrowErr<T> {
  type Item = T;

  fn poll_pull(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Result<T>>> {
    Poll::Ready(self.err.clone().map(Err))
  }

  fn cancel(self: Pin<&mut Self>) { self.get_mut().err = None; }

  fn name(&self) -> &'static str { "throw_err" }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::source::SourceExt;

  #[tokio::test]
  async fn end_is_idempotent() {
    let mut source = of("x");
    assert_eq!(source.pull().await.unwrap().unwrap(), "x");
    assert!(source.pull().await.is_none());
    assert!(source.pull().await.is_none());
  }

  #[tokio::test]
  async fn error_repeats() {
    let mut source = throw_err::<i32>(Error::producer("bad"));
    assert!(source.pull().await.unwrap().is_err());
    assert!(source.pull().await.unwrap().is_err());
  }

  #[tokio::test]
  async fn cancel_ends_iteration() {
    let mut source = from_iter(0..);
    assert_eq!(source.pull().await.unwrap().unwrap(), 0);
    source.stop();
    assert!(source.pull().await.is_none());
    assert!(empty::<u8>().pull().await.is_none());
  }
}
