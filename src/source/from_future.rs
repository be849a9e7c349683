use std::{
  future::Future,
  pin::Pin,
  task::{Context, Poll},
};

use super::{replay_terminal, Source, Status};
use crate::error::Result;

/// A source that yields the single outcome of `future`.
///
/// The future is not polled before the first pull; an `Err` outcome becomes
/// the source's terminal error.
pub fn from_future<F, T>(future: F) -> FromFuture<F>
where
  F: Future<Output = Result<T>>,
{
  FromFuture { future: Some(Box::pin(future)), status: Status::Live }
}

pub struct FromFuture<F> {
  future: Option<Pin<Box<F>>>,
  status: Status,
}

impl<F, T> Source for FromFuture<F>
where
  F: Future<Output = Result<T>>,
{
  type Item = T;

  fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<T>>> {
    let this = self.get_mut();
    replay_terminal!(this.status);
    let Some(future) = this.future.as_mut() else {
      return this.status.done();
    };
    match future.as_mut().poll(cx) {
      Poll::Ready(Ok(value)) => {
        this.future = None;
        Poll::Ready(Some(Ok(value)))
      }
      Poll::Ready(Err(err)) => {
        this.future = None;
        this.status.fail(err)
      }
      Poll::Pending => Poll::Pending,
    }
  }

  fn cancel(self: Pin<&mut Self>) {
    let this = self.get_mut();
    this.future = None;
    this.status = Status::Done;
  }

  fn name(&self) -> &'static str { "from_future" }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::{
      atomic::{AtomicBool, Ordering},
      Arc,
    },
    time::Duration,
  };

  use super::*;
  use crate::{error::Error, source::SourceExt};

  #[tokio::test(start_paused = true)]
  async fn yields_once_then_ends() {
    let mut source = from_future(async {
      tokio::time::sleep(Duration::from_millis(5)).await;
      Ok(42)
    });
    assert_eq!(source.pull().await.unwrap().unwrap(), 42);
    assert!(source.pull().await.is_none());
  }

  #[tokio::test]
  async fn lazy_until_first_pull() {
    let started = Arc::new(AtomicBool::new(false));
    let c_started = started.clone();
    let mut source = from_future(async move {
      c_started.store(true, Ordering::SeqCst);
      Ok(())
    });
    assert!(!started.load(Ordering::SeqCst));
    source.pull().await.unwrap().unwrap();
    assert!(started.load(Ordering::SeqCst));
  }

  #[tokio::test]
  async fn error_outcome_is_terminal() {
    let mut source = from_future(async { Err::<u8, _>(Error::producer("down")) });
    assert!(source.pull().await.unwrap().is_err());
    assert!(source.pull().await.unwrap().is_err());
  }
}
