//! Sources driven by a producer closure.
//!
//! The closure receives an [`Emitter`] and returns a future. That future is
//! polled from inside `poll_pull`, so production only advances while the
//! consumer is pulling and stops as soon as the source is cancelled or
//! dropped.

use std::{
  future::Future,
  pin::Pin,
  task::{Context, Poll},
};

use futures::{channel::mpsc, StreamExt};
use pin_project_lite::pin_project;

use super::{replay_terminal, Source, Status};
use crate::error::{Error, Result};

/// Creates a cold source from a producer.
///
/// ```rust
/// use futures::TryStreamExt;
/// use rxflow::prelude::*;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let source = create(|emitter: Emitter<i32>| async move {
///   emitter.next(1);
///   emitter.next(2);
///   emitter.complete();
/// });
/// let values: Vec<_> = source.into_stream().try_collect().await.unwrap();
/// assert_eq!(values, vec![1, 2]);
/// # }
/// ```
pub fn create<T, F, Fut>(producer: F) -> Create<T, F, Fut>
where
  F: FnOnce(Emitter<T>) -> Fut,
  Fut: Future<Output = ()>,
{
  Create { producer: Some(producer), task: None, rx: None, status: Status::Live }
}

/// Producer-side handle of a [`create`] source.
pub struct Emitter<T> {
  tx: mpsc::UnboundedSender<Result<T>>,
}

impl<T> Clone for Emitter<T> {
  fn clone(&self) -> Self { Emitter { tx: self.tx.clone() } }
}

impl<T> Emitter<T> {
  /// Emits a value. Returns `false` once the consumer is gone.
  pub fn next(&self, value: T) -> bool { self.tx.unbounded_send(Ok(value)).is_ok() }

  /// Terminates the source with `err`, closing every clone of this emitter.
  pub fn error(self, err: Error) {
    let _ = self.tx.unbounded_send(Err(err));
    self.tx.close_channel();
  }

  /// Terminates the source, closing every clone of this emitter.
  pub fn complete(self) { self.tx.close_channel(); }

  pub fn is_closed(&self) -> bool { self.tx.is_closed() }
}

pin_project! {
  pub struct Create<T, F, Fut> {
    producer: Option<F>,
    task: Option<Pin<Box<Fut>>>,
    rx: Option<mpsc::UnboundedReceiver<Result<T>>>,
    status: Status,
  }
}

impl<T, F, Fut> Source for Create<T, F, Fut>
where
  F: FnOnce(Emitter<T>) -> Fut,
  Fut: Future<Output = ()>,
{
  type Item = T;

  fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<T>>> {
    let this = self.project();
    replay_terminal!(this.status);

    if let Some(producer) = this.producer.take() {
      let (tx, rx) = mpsc::unbounded();
      *this.task = Some(Box::pin(producer(Emitter { tx })));
      *this.rx = Some(rx);
    }
    if let Some(task) = this.task.as_mut() {
      if task.as_mut().poll(cx).is_ready() {
        *this.task = None;
      }
    }

    let Some(rx) = this.rx.as_mut() else {
      return this.status.done();
    };
    match rx.poll_next_unpin(cx) {
      Poll::Ready(Some(Ok(value))) => Poll::Ready(Some(Ok(value))),
      Poll::Ready(Some(Err(err))) => {
        *this.task = None;
        *this.rx = None;
        this.status.fail(err)
      }
      Poll::Ready(None) => {
        *this.task = None;
        *this.rx = None;
        this.status.done()
      }
      Poll::Pending => Poll::Pending,
    }
  }

  fn cancel(self: Pin<&mut Self>) {
    let this = self.project();
    *this.producer = None;
    *this.task = None;
    *this.rx = None;
    *this.status = Status::Done;
  }

  fn name(&self) -> &'static str { "create" }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::{Arc, Mutex},
    time::Duration,
  };

  use futures::TryStreamExt;

  use super::*;
  use crate::source::SourceExt;

  #[tokio::test]
  async fn error_after_values() {
    let mut source = create(|emitter: Emitter<i32>| async move {
      emitter.next(1);
      emitter.error(Error::producer("late failure"));
    });
    assert_eq!(source.pull().await.unwrap().unwrap(), 1);
    assert!(source.pull().await.unwrap().is_err());
    assert!(source.pull().await.unwrap().is_err());
  }

  #[tokio::test]
  async fn dropping_emitter_completes() {
    let values: Vec<u8> = create(|emitter: Emitter<u8>| async move {
      emitter.next(9);
    })
    .into_stream()
    .try_collect()
    .await
    .unwrap();
    assert_eq!(values, vec![9]);
  }

  #[tokio::test(start_paused = true)]
  async fn cancel_stops_the_producer() {
    let emitted = Arc::new(Mutex::new(0));
    let c_emitted = emitted.clone();
    let mut source = create(move |emitter: Emitter<u32>| async move {
      for i in 0.. {
        if !emitter.next(i) {
          break;
        }
        *c_emitted.lock().unwrap() += 1;
        tokio::time::sleep(Duration::from_millis(10)).await;
      }
    });

    assert_eq!(source.pull().await.unwrap().unwrap(), 0);
    assert_eq!(source.pull().await.unwrap().unwrap(), 1);
    source.stop();
    let seen = *emitted.lock().unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(*emitted.lock().unwrap(), seen);
    assert!(source.pull().await.is_none());
  }
}
