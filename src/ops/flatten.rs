//! Expansion stages: every origin value becomes a nested source.
//!
//! All four policies share one live type, [`FlatMap`]. They differ only in
//! what happens to a nested source when it is admitted:
//!
//! | Stage          | Admission                                                  |
//! |----------------|------------------------------------------------------------|
//! | `merge_map`    | runs at once (or waits behind `limit` running ones)        |
//! | `concat_map`   | waits until the running one finishes                       |
//! | `switch_map`   | cancels the running one and takes its place                |
//! | `exhaust_map`  | dropped unstarted while another one is running             |
//!
//! Waiting is backpressure: while `merge_map_with_limit` or `concat_map` is
//! at its limit the origin is not pulled at all, so a fast or infinite
//! origin never builds up nested sources.
//!
//! Output values are interleaved by arrival. The output ends once the origin
//! and every admitted nested source have ended. An error from the origin or
//! from any nested source ends the output at once, and everything still
//! running is cancelled.

use std::{
  pin::Pin,
  task::{Context, Poll},
};

use pin_project_lite::pin_project;
use tracing::trace;

use crate::{
  error::Result,
  source::{replay_terminal, Source, Status},
  stage::Stage,
};

/// Runs every nested source concurrently.
pub fn merge_map<F>(f: F) -> FlatMapOp<F> { FlatMapOp { f, policy: Policy::Merge { limit: None } } }

/// Runs at most `limit` nested sources at once. The origin is not pulled
/// while all of them are busy.
///
/// # Panics
///
/// Panics if `limit` is zero.
pub fn merge_map_with_limit<F>(f: F, limit: usize) -> FlatMapOp<F> {
  assert!(limit > 0, "merge_map_with_limit needs a positive limit");
  FlatMapOp { f, policy: Policy::Merge { limit: Some(limit) } }
}

/// Runs nested sources one at a time, in origin order.
pub fn concat_map<F>(f: F) -> FlatMapOp<F> { FlatMapOp { f, policy: Policy::Concat } }

/// Forwards only the most recently started nested source.
pub fn switch_map<F>(f: F) -> FlatMapOp<F> { FlatMapOp { f, policy: Policy::Switch } }

/// Ignores origin values while a nested source is running.
pub fn exhaust_map<F>(f: F) -> FlatMapOp<F> { FlatMapOp { f, policy: Policy::Exhaust } }

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Policy {
  Merge { limit: Option<usize> },
  Concat,
  Switch,
  Exhaust,
}

impl Policy {
  fn name(&self) -> &'static str {
    match self {
      Policy::Merge { .. } => "merge_map",
      Policy::Concat => "concat_map",
      Policy::Switch => "switch_map",
      Policy::Exhaust => "exhaust_map",
    }
  }

  /// `true` when the origin must not be pulled with `running` nested
  /// sources active.
  fn is_saturated(&self, running: usize) -> bool {
    match self {
      Policy::Merge { limit } => limit.map_or(false, |limit| running >= limit),
      Policy::Concat => running >= 1,
      Policy::Switch | Policy::Exhaust => false,
    }
  }
}

#[derive(Clone, Copy, Debug)]
pub struct FlatMapOp<F> {
  f: F,
  policy: Policy,
}

impl<S, F, N> Stage<S> for FlatMapOp<F>
where
  S: Source,
  F: FnMut(S::Item) -> N + Clone,
  N: Source,
{
  type Output = FlatMap<S, F, N>;

  fn name(&self) -> &'static str { self.policy.name() }

  fn apply(&self, origin: S) -> FlatMap<S, F, N> {
    FlatMap {
      origin,
      f: self.f.clone(),
      policy: self.policy,
      origin_done: false,
      running: Vec::new(),
      status: Status::Live,
    }
  }
}

pin_project! {
  pub struct FlatMap<S, F, N> {
    #[pin]
    origin: S,
    f: F,
    policy: Policy,
    origin_done: bool,
    running: Vec<Pin<Box<N>>>,
    status: Status,
  }
}

impl<S, F, N> FlatMap<S, F, N> {
  /// Nested sources currently running.
  pub fn running(&self) -> usize { self.running.len() }
}

impl<S, F, N> Source for FlatMap<S, F, N>
where
  S: Source,
  F: FnMut(S::Item) -> N,
  N: Source,
{
  type Item = N::Item;

  fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<N::Item>>> {
    let mut this = self.project();
    replay_terminal!(this.status);

    loop {
      match poll_running(this.running, cx) {
        Some(Ok(value)) => return Poll::Ready(Some(Ok(value))),
        Some(Err(err)) => {
          cancel_nested(this.running);
          this.origin.cancel();
          return this.status.fail(err);
        }
        None => {}
      }
      if *this.origin_done || this.policy.is_saturated(this.running.len()) {
        break;
      }
      match this.origin.as_mut().poll_pull(cx) {
        Poll::Ready(Some(Ok(item))) => {
          let nested = Box::pin((this.f)(item));
          admit(nested, *this.policy, this.running);
        }
        Poll::Ready(Some(Err(err))) => {
          cancel_nested(this.running);
          return this.status.fail(err);
        }
        Poll::Ready(None) => *this.origin_done = true,
        Poll::Pending => break,
      }
    }

    if *this.origin_done && this.running.is_empty() {
      return this.status.done();
    }
    Poll::Pending
  }

  fn cancel(self: Pin<&mut Self>) {
    let this = self.project();
    cancel_nested(this.running);
    *this.status = Status::Done;
    this.origin.cancel()
  }

  fn name(&self) -> &'static str { self.policy.name() }
}

fn admit<N: Source>(mut nested: Pin<Box<N>>, policy: Policy, running: &mut Vec<Pin<Box<N>>>) {
  match policy {
    Policy::Switch => {
      cancel_nested(running);
      running.push(nested);
    }
    Policy::Exhaust if !running.is_empty() => {
      trace!("exhaust_map discarded an origin value");
      nested.as_mut().cancel();
    }
    Policy::Merge { .. } | Policy::Concat | Policy::Exhaust => running.push(nested),
  }
}

/// Polls every running nested source once, dropping the ones that ended.
/// Returns the first value or error found.
fn poll_running<N: Source>(
  running: &mut Vec<Pin<Box<N>>>,
  cx: &mut Context<'_>,
) -> Option<Result<N::Item>> {
  let mut idx = 0;
  while idx < running.len() {
    match running[idx].as_mut().poll_pull(cx) {
      Poll::Ready(Some(Ok(value))) => {
        // Rotate so siblings get polled first next time.
        let emitted = running.remove(idx);
        running.push(emitted);
        return Some(Ok(value));
      }
      Poll::Ready(Some(Err(err))) => return Some(Err(err)),
      Poll::Ready(None) => {
        running.remove(idx);
      }
      Poll::Pending => idx += 1,
    }
  }
  None
}

fn cancel_nested<N: Source>(running: &mut Vec<Pin<Box<N>>>) {
  for mut nested in running.drain(..) {
    nested.as_mut().cancel();
  }
}
