use std::{
  pin::Pin,
  task::{ready, Context, Poll},
};

use tracing::trace;

use crate::{
  error::Result,
  source::{replay_terminal, Source, Status},
};

/// Mirrors whichever source produces a value first and cancels the others.
///
/// An error raised before any source produced a value ends the race with
/// that error. Sources that end without a value drop out; if all of them do,
/// the output ends empty.
pub fn race<S: Source>(sources: impl IntoIterator<Item = S>) -> Race<S> {
  Race { contenders: sources.into_iter().map(Box::pin).collect(), winner: None, status: Status::Live }
}

pub struct Race<S> {
  contenders: Vec<Pin<Box<S>>>,
  winner: Option<Pin<Box<S>>>,
  status: Status,
}

impl<S> Race<S> {
  /// `true` once some source produced the first value.
  pub fn is_decided(&self) -> bool { self.winner.is_some() }
}

impl<S: Source> Race<S> {
  fn cancel_contenders(&mut self) {
    for mut source in self.contenders.drain(..) {
      source.as_mut().cancel();
    }
  }
}

impl<S: Source> Source for Race<S> {
  type Item = S::Item;

  fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<S::Item>>> {
    let this = self.get_mut();
    replay_terminal!(this.status);

    if let Some(winner) = this.winner.as_mut() {
      return match ready!(winner.as_mut().poll_pull(cx)) {
        Some(Ok(value)) => Poll::Ready(Some(Ok(value))),
        Some(Err(err)) => this.status.fail(err),
        None => this.status.done(),
      };
    }

    let mut idx = 0;
    while idx < this.contenders.len() {
      match this.contenders[idx].as_mut().poll_pull(cx) {
        Poll::Ready(Some(Ok(value))) => {
          trace!(winner = idx, "race decided");
          this.winner = Some(this.contenders.swap_remove(idx));
          this.cancel_contenders();
          return Poll::Ready(Some(Ok(value)));
        }
        Poll::Ready(Some(Err(err))) => {
          this.cancel_contenders();
          return this.status.fail(err);
        }
        Poll::Ready(None) => {
          this.contenders.remove(idx);
        }
        Poll::Pending => idx += 1,
      }
    }

    if this.contenders.is_empty() {
      this.status.done()
    } else {
      Poll::Pending
    }
  }

  fn cancel(self: Pin<&mut Self>) {
    let this = self.get_mut();
    this.cancel_contenders();
    if let Some(mut winner) = this.winner.take() {
      winner.as_mut().cancel();
    }
    this.status = Status::Done;
  }

  fn name(&self) -> &'static str { "race" }
}
