use std::{
  pin::Pin,
  task::{Context, Poll},
};

use pin_project_lite::pin_project;

use super::Source;
use crate::error::Result;

/// Builds the real source with `factory` on the first pull.
///
/// Every `Defer` runs its factory at most once, so building one `Defer` per
/// consumer gives each consumer an isolated production.
pub fn defer<F, S>(factory: F) -> Defer<F, S>
where
  F: FnOnce() -> S,
  S: Source,
{
  Defer { factory: Some(factory), source: None }
}

pin_project! {
  pub struct Defer<F, S> {
    factory: Option<F>,
    source: Option<Pin<Box<S>>>,
  }
}

impl<F, S> Source for Defer<F, S>
where
  F: FnOnce() -> S,
  S: Source,
{
  type Item = S::Item;

  fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<S::Item>>> {
    let this = self.project();
    if let Some(factory) = this.factory.take() {
      *this.source = Some(Box::pin(factory()));
    }
    match this.source.as_mut() {
      Some(source) => source.as_mut().poll_pull(cx),
      None => Poll::Ready(None),
    }
  }

  fn cancel(self: Pin<&mut Self>) {
    let this = self.project();
    *this.factory = None;
    if let Some(mut source) = this.source.take() {
      source.as_mut().cancel();
    }
  }

  fn name(&self) -> &'static str { "defer" }
}
