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

/// Collects values into `Vec`s of `count` items.
///
/// A partial buffer is emitted once when upstream completes. On upstream
/// error the partial buffer is discarded and the error is forwarded at once.
///
/// # Panics
///
/// Panics if `count` is zero.
pub fn buffer_count(count: usize) -> BufferCountOp {
  assert!(count > 0, "buffer_count needs a positive count");
  BufferCountOp { count }
}

#[derive(Clone, Copy, Debug)]
pub struct BufferCountOp {
  count: usize,
}

impl<S: Source> Stage<S> for BufferCountOp {
  type Output = BufferCount<S>;

  fn name(&self) -> &'static str { "buffer_count" }

  fn apply(&self, source: S) -> BufferCount<S> {
    BufferCount { source, count: self.count, buffer: Vec::with_capacity(self.count), status: Status::Live }
  }
}

pin_project! {
  pub struct BufferCount<S: Source> {
    #[pin]
    source: S,
    count: usize,
    buffer: Vec<S::Item>,
    status: Status,
  }
}

impl<S: Source> Source for BufferCount<S> {
  type Item = Vec<S::Item>;

  fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Vec<S::Item>>>> {
    let mut this = self.project();
    replay_terminal!(this.status);
    loop {
      match ready!(this.source.as_mut().poll_pull(cx)) {
        Some(Ok(value)) => {
          this.buffer.push(value);
          if this.buffer.len() == *this.count {
            let full = std::mem::replace(this.buffer, Vec::with_capacity(*this.count));
            return Poll::Ready(Some(Ok(full)));
          }
        }
        Some(Err(err)) => {
          this.buffer.clear();
          return this.status.fail(err);
        }
        None if this.buffer.is_empty() => return this.status.done(),
        None => {
          // Upstream replays its end, so the next pull lands in the arm above.
          return Poll::Ready(Some(Ok(std::mem::take(this.buffer))));
        }
      }
    }
  }

  fn cancel(self: Pin<&mut Self>) {
    let this = self.project();
    this.buffer.clear();
    *this.status = Status::Done;
    this.source.cancel()
  }

  fn name(&self) -> &'static str { "buffer_count" }
}
