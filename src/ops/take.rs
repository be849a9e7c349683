use std::{
  pin::Pin,
  task::{ready, Context, Poll},
};

use pin_project_lite::pin_project;

use crate::{
  error::Result,
  source::{replay_terminal, Source, Status},
  stage::Stage,
};

/// Forwards the first `count` values, then cancels upstream and ends.
pub fn take(count: usize) -> TakeOp { TakeOp { count } }

#[derive(Clone, Copy, Debug)]
pub struct TakeOp {
  count: usize,
}

impl<S: Source> Stage<S> for TakeOp {
  type Output = Take<S>;

  fn name(&self) -> &'static str { "take" }

  fn apply(&self, source: S) -> Take<S> { Take { source, remaining: self.count, status: Status::Live } }
}

pin_project! {
  pub struct Take<S> {
    #[pin]
    source: S,
    remaining: usize,
    status: Status,
  }
}

impl<S: Source> Source for Take<S> {
  type Item = S::Item;

  fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<S::Item>>> {
    let mut this = self.project();
    replay_terminal!(this.status);
    if *this.remaining == 0 {
      this.source.cancel();
      return this.status.done();
    }
    match ready!(this.source.as_mut().poll_pull(cx)) {
      Some(Ok(value)) => {
        *this.remaining -= 1;
        if *this.remaining == 0 {
          this.source.cancel();
          *this.status = Status::Done;
        }
        Poll::Ready(Some(Ok(value)))
      }
      Some(Err(err)) => this.status.fail(err),
      None => this.status.done(),
    }
  }

  fn cancel(self: Pin<&mut Self>) {
    let this = self.project();
    *this.status = Status::Done;
    this.source.cancel()
  }

  fn name(&self) -> &'static str { "take" }
}
