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

/// Emits a value only after `quiet` has passed without a newer one.
///
/// A pending value is emitted once when upstream completes. On upstream error
/// it is dropped and the error is forwarded at once.
pub fn debounce(quiet: Duration, scheduler: &Scheduler) -> DebounceOp {
  DebounceOp { quiet, scheduler: scheduler.clone() }
}

#[derive(Clone, Debug)]
pub struct DebounceOp {
  quiet: Duration,
  scheduler: Scheduler,
}

impl<S: Source> Stage<S> for DebounceOp {
  type Output = Debounce<S>;

  fn name(&self) -> &'static str { "debounce" }

  fn apply(&self, source: S) -> Debounce<S> {
    Debounce {
      source,
      quiet: self.quiet,
      scheduler: self.scheduler.clone(),
      pending: None,
      timer: None,
      upstream_done: false,
      status: Status::Live,
    }
  }
}

pin_project! {
  pub struct Debounce<S: Source> {
    #[pin]
    source: S,
    quiet: Duration,
    scheduler: Scheduler,
    pending: Option<S::Item>,
    timer: Option<Pin<Box<Sleep>>>,
    upstream_done: bool,
    status: Status,
  }
}

impl<S: Source> Debounce<S> {
  pub fn is_timer_armed(&self) -> bool { self.timer.is_some() }
}

impl<S: Source> Source for Debounce<S> {
  type Item = S::Item;

  fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<S::Item>>> {
    let mut this = self.project();
    replay_terminal!(this.status);

    while !*this.upstream_done {
      match this.source.as_mut().poll_pull(cx) {
        Poll::Ready(Some(Ok(value))) => {
          *this.pending = Some(value);
          match this.timer.as_mut() {
            Some(timer) => timer.as_mut().reset(tokio::time::Instant::now() + *this.quiet),
            None => *this.timer = Some(Box::pin(this.scheduler.sleep(*this.quiet))),
          }
        }
        Poll::Ready(Some(Err(err))) => {
          *this.timer = None;
          *this.pending = None;
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
      return match this.pending.take() {
        Some(value) => Poll::Ready(Some(Ok(value))),
        None => this.status.done(),
      };
    }

    if let Some(timer) = this.timer.as_mut() {
      if timer.as_mut().poll(cx).is_ready() {
        *this.timer = None;
        if let Some(value) = this.pending.take() {
          return Poll::Ready(Some(Ok(value)));
        }
      }
    }
    Poll::Pending
  }

  fn cancel(self: Pin<&mut Self>) {
    let this = self.project();
    *this.timer = None;
    *this.pending = None;
    *this.status = Status::Done;
    this.source.cancel()
  }

  fn name(&self) -> &'static str { "debounce" }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use super::*;
  use crate::{error::Error, prelude::*};

  #[tokio::test(start_paused = true)]
  async fn emits_after_quiet_period() {
    let scheduler = Scheduler::new();
    let broadcaster = Broadcaster::new(&scheduler);
    let seen = Arc::new(Mutex::new(vec![]));
    let c_seen = seen.clone();
    let sub = broadcaster
      .reader()
      .pipe(debounce(Duration::from_millis(50), &scheduler))
      .subscribe(move |v: &'static str| c_seen.lock().unwrap().push(v));

    broadcaster.push("a");
    tokio::time::sleep(Duration::from_millis(20)).await;
    broadcaster.push("b");
    tokio::time::sleep(Duration::from_millis(80)).await;
    broadcaster.push("c");
    broadcaster.complete();
    sub.finished().await;

    assert_eq!(*seen.lock().unwrap(), vec!["b", "c"]);
  }

  #[tokio::test(start_paused = true)]
  async fn error_drops_pending_value() {
    let scheduler = Scheduler::new();
    let broadcaster = Broadcaster::new(&scheduler);
    let mut source = broadcaster.reader().pipe(debounce(Duration::from_millis(50), &scheduler));
    broadcaster.push(1);
    broadcaster.error(Error::producer("down"));
    assert!(source.pull().await.unwrap().is_err());
    assert!(!source.is_timer_armed());
  }
}
