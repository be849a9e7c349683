use std::{
  pin::Pin,
  task::{ready, Context, Poll},
};

use pin_project_lite::pin_project;

use crate::{
  error::{BoxError, Error, Result},
  source::{replay_terminal, Source, Status},
  stage::Stage,
};

/// Transforms every value with `f`. One upstream pull per downstream pull.
pub fn map<F>(f: F) -> MapOp<F> { MapOp { f } }

/// Transforms every value with a fallible `f`.
///
/// The first `Err` becomes the terminal error [`Error::Stage`] named
/// `"try_map"`, and upstream is cancelled.
pub fn try_map<F>(f: F) -> TryMapOp<F> { TryMapOp { f } }

#[derive(Clone, Copy, Debug)]
pub struct MapOp<F> {
  f: F,
}

impl<S, F, B> Stage<S> for MapOp<F>
where
  S: Source,
  F: FnMut(S::Item) -> B + Clone,
{
  type Output = Map<S, F>;

  fn name(&self) -> &'static str { "map" }

  fn apply(&self, source: S) -> Map<S, F> { Map { source, f: self.f.clone() } }
}

pin_project! {
  pub struct Map<S, F> {
    #[pin]
    source: S,
    f: F,
  }
}

impl<S, F, B> Source for Map<S, F>
where
  S: Source,
  F: FnMut(S::Item) -> B,
{
  type Item = B;

  fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<B>>> {
    let this = self.project();
    let f = this.f;
    this.source.poll_pull(cx).map(|signal| signal.map(|item| item.map(f)))
  }

  fn cancel(self: Pin<&mut Self>) { self.project().source.cancel() }

  fn name(&self) -> &'static str { "map" }
}

#[derive(Clone, Copy, Debug)]
pub struct TryMapOp<F> {
  f: F,
}

impl<S, F, B, E> Stage<S> for TryMapOp<F>
where
  S: Source,
  F: FnMut(S::Item) -> std::result::Result<B, E> + Clone,
  E: Into<BoxError>,
{
  type Output = TryMap<S, F>;

  fn name(&self) -> &'static str { "try_map" }

  fn apply(&self, source: S) -> TryMap<S, F> {
    TryMap { source, f: self.f.clone(), status: Status::Live }
  }
}

pin_project! {
  pub struct TryMap<S, F> {
    #[pin]
    source: S,
    f: F,
    status: Status,
  }
}

impl<S, F, B, E> Source for TryMap<S, F>
where
  S: Source,
  F: FnMut(S::Item) -> std::result::Result<B, E>,
  E: Into<BoxError>,
{
  type Item = B;

  fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<B>>> {
    let mut this = self.project();
    replay_terminal!(this.status);
    match ready!(this.source.as_mut().poll_pull(cx)) {
      Some(Ok(item)) => match (this.f)(item) {
        Ok(value) => Poll::Ready(Some(Ok(value))),
        Err(err) => {
          this.source.cancel();
          this.status.fail(Error::stage("try_map", err))
        }
      },
      Some(Err(err)) => this.status.fail(err),
      None => this.status.done(),
    }
  }

  fn cancel(self: Pin<&mut Self>) {
    let this = self.project();
    *this.status = Status::Done;
    this.source.cancel()
  }

  fn name(&self) -> &'static str { "try_map" }
}
