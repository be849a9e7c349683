use std::{
  pin::Pin,
  task::{Context, Poll},
};

use crate::{
  error::{Error, Result},
  source::{replay_terminal, Source, Status},
};

/// Runs every source to completion, then emits one `Vec` holding each
/// source's last value, in source order.
///
/// A source that ends without ever producing a value fails the whole join
/// with [`Error::EmptySource`]. An error from any source ends the join at
/// once. Joining no sources ends immediately without a value.
pub fn fork_join<S: Source>(sources: impl IntoIterator<Item = S>) -> ForkJoin<S> {
  let sources: Vec<_> = sources.into_iter().map(|source| Some(Box::pin(source))).collect();
  let last = sources.iter().map(|_| None).collect();
  ForkJoin { sources, last, status: Status::Live }
}

pub struct ForkJoin<S: Source> {
  /// `None` once that source has ended.
  sources: Vec<Option<Pin<Box<S>>>>,
  last: Vec<Option<S::Item>>,
  status: Status,
}

// Sources are boxed and buffered items are never pinned.
impl<S: Source> Unpin for ForkJoin<S> {}

impl<S: Source> ForkJoin<S> {
  fn cancel_all(&mut self) {
    for mut source in self.sources.iter_mut().filter_map(Option::take) {
      source.as_mut().cancel();
    }
    self.last.clear();
  }
}

impl<S: Source> Source for ForkJoin<S> {
  type Item = Vec<S::Item>;

  fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Vec<S::Item>>>> {
    let this = self.get_mut();
    replay_terminal!(this.status);

    for index in 0..this.sources.len() {
      while let Some(source) = this.sources[index].as_mut() {
        match source.as_mut().poll_pull(cx) {
          Poll::Ready(Some(Ok(value))) => this.last[index] = Some(value),
          Poll::Ready(Some(Err(err))) => {
            this.cancel_all();
            return this.status.fail(err);
          }
          Poll::Ready(None) if this.last[index].is_none() => {
            this.cancel_all();
            return this.status.fail(Error::EmptySource { stage: "fork_join", index });
          }
          Poll::Ready(None) => this.sources[index] = None,
          Poll::Pending => break,
        }
      }
    }

    if this.sources.iter().any(Option::is_some) {
      return Poll::Pending;
    }
    if this.last.is_empty() {
      return this.status.done();
    }
    let joined = this.last.drain(..).flatten().collect();
    Poll::Ready(Some(Ok(joined)))
  }

  fn cancel(self: Pin<&mut Self>) {
    let this = self.get_mut();
    this.cancel_all();
    this.status = Status::Done;
  }

  fn name(&self) -> &'static str { "fork_join" }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use futures::TryStreamExt;

  use super::*;
  use crate::prelude::*;

  fn later(values: Vec<i32>, ms: u64) -> BoxSource<'static, i32> {
    create(move |emitter: Emitter<i32>| async move {
      for v in values {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        emitter.next(v);
      }
    })
    .boxed()
  }

  #[tokio::test(start_paused = true)]
  async fn emits_last_values_once_all_finish() {
    let out: Vec<Vec<i32>> = fork_join(vec![later(vec![1, 2, 3], 10), later(vec![9], 50), of(7).boxed()])
      .into_stream()
      .try_collect()
      .await
      .unwrap();
    assert_eq!(out, vec![vec![3, 9, 7]]);
  }

  #[tokio::test]
  async fn source_without_value_fails() {
    let mut source = fork_join(vec![of(1).boxed(), empty().boxed()]);
    match source.pull().await {
      Some(Err(Error::EmptySource { stage, index })) => {
        assert_eq!((stage, index), ("fork_join", 1));
      }
      other => panic!("unexpected {other:?}"),
    }
    assert!(source.pull().await.unwrap().is_err());
  }

  #[tokio::test]
  async fn nothing_to_join() {
    let mut source = fork_join(Vec::<BoxSource<'static, i32>>::new());
    assert!(source.pull().await.is_none());
  }

  struct Pinned(i32, std::marker::PhantomPinned);

  #[tokio::test]
  async fn items_need_not_be_unpin() {
    let pinned =
      |range: std::ops::Range<i32>| from_iter(range.map(|v| Pinned(v, std::marker::PhantomPinned)));
    let mut source = fork_join(vec![pinned(1..3), pinned(5..6)]);
    let joined: Vec<i32> = source.pull().await.unwrap().unwrap().iter().map(|p| p.0).collect();
    assert_eq!(joined, vec![2, 5]);
    assert!(source.pull().await.is_none());
  }
}
