use std::{
  pin::Pin,
  task::{Context, Poll},
};

use crate::{
  error::Result,
  source::{replay_terminal, Source, Status},
};

/// Pairs up the n-th values of every source into a `Vec`, in source order.
///
/// A source is only pulled while its slot for the current tuple is empty.
/// The output ends as soon as any source ends; an error from any source ends
/// it with that error. Zipping no sources yields an empty sequence.
pub fn zip<S: Source>(sources: impl IntoIterator<Item = S>) -> Zip<S> {
  let sources: Vec<_> = sources.into_iter().map(Box::pin).collect();
  let slots = sources.iter().map(|_| None).collect();
  Zip { sources, slots, status: Status::Live }
}

pub struct Zip<S: Source> {
  sources: Vec<Pin<Box<S>>>,
  slots: Vec<Option<S::Item>>,
  status: Status,
}

// Sources are boxed and buffered items are never pinned.
impl<S: Source> Unpin for Zip<S> {}

impl<S: Source> Zip<S> {
  fn cancel_all(&mut self) {
    for source in self.sources.iter_mut() {
      source.as_mut().cancel();
    }
    self.slots.iter_mut().for_each(|slot| *slot = None);
  }
}

impl<S: Source> Source for Zip<S> {
  type Item = Vec<S::Item>;

  fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Vec<S::Item>>>> {
    let this = self.get_mut();
    replay_terminal!(this.status);
    if this.sources.is_empty() {
      return this.status.done();
    }

    for index in 0..this.sources.len() {
      if this.slots[index].is_some() {
        continue;
      }
      match this.sources[index].as_mut().poll_pull(cx) {
        Poll::Ready(Some(Ok(value))) => this.slots[index] = Some(value),
        Poll::Ready(Some(Err(err))) => {
          this.cancel_all();
          return this.status.fail(err);
        }
        Poll::Ready(None) => {
          this.cancel_all();
          return this.status.done();
        }
        Poll::Pending => {}
      }
    }

    if this.slots.iter().all(Option::is_some) {
      Poll::Ready(Some(Ok(this.slots.iter_mut().filter_map(Option::take).collect())))
    } else {
      Poll::Pending
    }
  }

  fn cancel(self: Pin<&mut Self>) {
    let this = self.get_mut();
    this.cancel_all();
    this.status = Status::Done;
  }

  fn name(&self) -> &'static str { "zip" }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use futures::TryStreamExt;

  use super::*;
  use crate::prelude::*;

  #[tokio::test]
  async fn pairs_by_position_and_stops_at_shortest() {
    let out: Vec<Vec<i32>> = zip(vec![from_iter(vec![1, 2, 3]), from_iter(vec![10, 20])])
      .into_stream()
      .try_collect()
      .await
      .unwrap();
    assert_eq!(out, vec![vec![1, 10], vec![2, 20]]);
  }

  #[tokio::test(start_paused = true)]
  async fn waits_for_the_slow_side() {
    let slow = |v: i32, ms: u64| -> BoxSource<'static, i32> {
      from_future(async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(v)
      })
      .boxed()
    };
    let out: Vec<Vec<i32>> =
      zip(vec![slow(1, 50), of(2).boxed()]).into_stream().try_collect().await.unwrap();
    assert_eq!(out, vec![vec![1, 2]]);
  }

  #[tokio::test]
  async fn nothing_to_zip() {
    let mut source = zip(Vec::<FromIter<std::vec::IntoIter<i32>>>::new());
    assert!(source.pull().await.is_none());
  }

  struct Pinned(i32, std::marker::PhantomPinned);

  #[tokio::test]
  async fn items_need_not_be_unpin() {
    let pinned =
      |range: std::ops::Range<i32>| from_iter(range.map(|v| Pinned(v, std::marker::PhantomPinned)));
    let mut source = zip(vec![pinned(1..3), pinned(3..4)]);
    let first: Vec<i32> = source.pull().await.unwrap().unwrap().iter().map(|p| p.0).collect();
    assert_eq!(first, vec![1, 3]);
    assert!(source.pull().await.is_none());
  }
}
