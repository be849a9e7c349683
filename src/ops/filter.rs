use std::{
  pin::Pin,
  task::{ready, Context, Poll},
};

use pin_project_lite::pin_project;

use crate::{error::Result, source::Source, stage::Stage};

/// Forwards only the values for which `predicate` returns `true`.
///
/// Rejected values are pulled past in a loop; terminal signals always pass.
pub fn filter<F>(predicate: F) -> FilterOp<F> { FilterOp { predicate } }

#[derive(Clone, Copy, Debug)]
pub struct FilterOp<F> {
  predicate: F,
}

impl<S, F> Stage<S> for FilterOp<F>
where
  S: Source,
  F: FnMut(&S::Item) -> bool + Clone,
{
  type Output = Filter<S, F>;

  fn name(&self) -> &'static str { "filter" }

  fn apply(&self, source: S) -> Filter<S, F> { Filter { source, predicate: self.predicate.clone() } }
}

pin_project! {
  pub struct Filter<S, F> {
    #[pin]
    source: S,
    predicate: F,
  }
}

impl<S, F> Source for Filter<S, F>
where
  S: Source,
  F: FnMut(&S::Item) -> bool,
{
  type Item = S::Item;

  fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<S::Item>>> {
    let mut this = self.project();
    loop {
      match ready!(this.source.as_mut().poll_pull(cx)) {
        Some(Ok(value)) if !(this.predicate)(&value) => continue,
        signal => return Poll::Ready(signal),
      }
    }
  }

  fn cancel(self: Pin<&mut Self>) { self.project().source.cancel() }

  fn name(&self) -> &'static str { "filter" }
}
