use std::{
  pin::Pin,
  task::{Context, Poll},
};

use futures::{Stream, StreamExt};

use super::{replay_terminal, Source, Status};
use crate::error::Result;

/// Adapts a `futures::Stream` of `Result`s. The first `Err` item terminates
/// the source.
pub fn from_stream<St, T>(stream: St) -> FromStream<St>
where
  St: Stream<Item = Result<T>>,
{
  FromStream { stream: Some(Box::pin(stream)), status: Status::Live }
}

pub struct FromStream<St> {
  stream: Option<Pin<Box<St>>>,
  status: Status,
}

impl<St, T> Source for FromStream<St>
where
  St: Stream<Item = Result<T>>,
{
  type Item = T;

  fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<T>>> {
    let this = self.get_mut();
    replay_terminal!(this.status);
    let Some(stream) = this.stream.as_mut() else {
      return this.status.done();
    };
    match stream.poll_next_unpin(cx) {
      Poll::Ready(Some(Ok(value))) => Poll::Ready(Some(Ok(value))),
      Poll::Ready(Some(Err(err))) => {
        this.stream = None;
        this.status.fail(err)
      }
      Poll::Ready(None) => {
        this.stream = None;
        this.status.done()
      }
      Poll::Pending => Poll::Pending,
    }
  }

  fn cancel(self: Pin<&mut Self>) {
    let this = self.get_mut();
    this.stream = None;
    this.status = Status::Done;
  }

  fn name(&self) -> &'static str { "from_stream" }
}
