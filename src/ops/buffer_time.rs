use std::{
  future::Future,
  pin::Pin,
  task::{Context, Poll},
  time::Duration,
};

use pin_project_lite::pin_project;
use tokio::time::Sleep;

use crate::{
  error::Result,
  scheduler::Scheduler,
  source::{replay_terminal, Source, Status},
  stage::Stage,
};

/// Collects values into time windows of `window`.
///
/// A window opens with its first value and closes when the timer fires, or
/// earlier once it holds `max_size` values. Only non-empty windows are
/// emitted. A pending window is flushed once when upstream completes; on
/// upstream error it is discarded and the error is forwarded at once.
pub fn buffer_time(window: Duration, scheduler: &Scheduler) -> BufferTimeOp {
  BufferTimeOp { window, max_size: None, scheduler: scheduler.clone() }
}

#[derive(Clone, Debug)]
pub struct BufferTimeOp {
  window: Duration,
  max_size: Option<usize>,
  scheduler: Scheduler,
}

impl BufferTimeOp {
  /// Closes a window early once it holds `max_size` values.
  pub fn max_size(mut self, max_size: usize) -> Self {
    self.max_size = Some(max_size.max(1));
    self
  }
}

impl<S: Source> Stage<S> for BufferTimeOp {
  type Output = BufferTime<S>;

  fn name(&self) -> &'static str { "buffer_time" }

  fn apply(&self, source: S) -> BufferTime<S> {
    BufferTime {
      source,
      window: self.window,
      max_size: self.max_size,
      scheduler: self.scheduler.clone(),
      buffer: Vec::new(),
      timer: None,
      upstream_done: false,
      status: Status::Live,
    }
  }
}

pin_project! {
  pub struct BufferTime<S: Source> {
    #[pin]
    source: S,
    window: Duration,
    max_size: Option<usize>,
    scheduler: Scheduler,
    buffer: Vec<S::Item>,
    timer: Option<Pin<Box<Sleep>>>,
    upstream_done: bool,
    status: Status,
  }
}

impl<S: Source> BufferTime<S> {
  /// `true` while a window timer is pending.
  pub fn is_timer_armed(&self) -> bool { self.timer.is_some() }
}

impl<S: Source> Source for BufferTime<S> {
  type Item = Vec<S::Item>;

  fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Vec<S::Item>>>> {
    let mut this = self.project();
    replay_terminal!(this.status);

    while !*this.upstream_done {
      match this.source.as_mut().poll_pull(cx) {
        Poll::Ready(Some(Ok(value))) => {
          if this.timer.is_none() {
            *this.timer = Some(Box::pin(this.scheduler.sleep(*this.window)));
          }
          this.buffer.push(value);
          if this.max_size.map_or(false, |max| this.buffer.len() >= max) {
            *this.timer = None;
            return Poll::Ready(Some(Ok(std::mem::take(this.buffer))));
          }
        }
        Poll::Ready(Some(Err(err))) => {
          *this.timer = None;
          this.buffer.clear();
          return this.status.fail(err);
        }
        Poll::Ready(None) => {
          *this.timer = None;
          *this.upstream_done = true;
        }
        Poll::Pending => break,
      }
    }

    if *this.upstream_done {
      return if this.buffer.is_empty() {
        this.status.done()
      } else {
        Poll::Ready(Some(Ok(std::mem::take(this.buffer))))
      };
    }

    if let Some(timer) = this.timer.as_mut() {
      if timer.as_mut().poll(cx).is_ready() {
        *this.timer = None;
        return Poll::Ready(Some(Ok(std::mem::take(this.buffer))));
      }
    }
    Poll::Pending
  }

  fn cancel(self: Pin<&mut Self>) {
    let this = self.project();
    *this.timer = None;
    this.buffer.clear();
    *this.status = Status::Done;
    this.source.cancel()
  }

  fn name(&self) -> &'static str { "buffer_time" }
}
