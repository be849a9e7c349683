//! Push-side consumer of a subscription.
//!
//! A [`Receiver`] holds three independently optional callbacks. A missing
//! callback is a no-op, never an error. Any `FnMut(T)` closure converts into a
//! receiver that only handles values.

use std::fmt::{Debug, Formatter};

use crate::error::Error;

type NextFn<T> = Box<dyn FnMut(T) + Send>;
type ErrorFn = Box<dyn FnOnce(Error) + Send>;
type CompleteFn = Box<dyn FnOnce() + Send>;

pub struct Receiver<T> {
  on_next: Option<NextFn<T>>,
  on_error: Option<ErrorFn>,
  on_complete: Option<CompleteFn>,
}

impl<T> Receiver<T> {
  /// A receiver with no callbacks.
  pub fn new() -> Self { Receiver { on_next: None, on_error: None, on_complete: None } }

  pub fn on_next(mut self, f: impl FnMut(T) + Send + 'static) -> Self {
    self.on_next = Some(Box::new(f));
    self
  }

  pub fn on_error(mut self, f: impl FnOnce(Error) + Send + 'static) -> Self {
    self.on_error = Some(Box::new(f));
    self
  }

  pub fn on_complete(mut self, f: impl FnOnce() + Send + 'static) -> Self {
    self.on_complete = Some(Box::new(f));
    self
  }

  pub(crate) fn next(&mut self, value: T) {
    if let Some(on_next) = self.on_next.as_mut() {
      on_next(value);
    }
  }

  /// Fires the error callback at most once and drops the others.
  pub(crate) fn error(&mut self, err: Error) {
    self.on_next = None;
    self.on_complete = None;
    if let Some(on_error) = self.on_error.take() {
      on_error(err);
    }
  }

  /// Fires the completion callback at most once and drops the others.
  pub(crate) fn complete(&mut self) {
    self.on_next = None;
    self.on_error = None;
    if let Some(on_complete) = self.on_complete.take() {
      on_complete();
    }
  }
}

impl<T> Default for Receiver<T> {
  fn default() -> Self { Self::new() }
}

impl<T, F> From<F> for Receiver<T>
where
  F: FnMut(T) + Send + 'static,
{
  fn from(f: F) -> Self { Receiver::new().on_next(f) }
}

impl<T> Debug for Receiver<T> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Receiver")
      .field("on_next", &self.on_next.is_some())
      .field("on_error", &self.on_error.is_some())
      .field("on_complete", &self.on_complete.is_some())
      .finish()
  }
}
