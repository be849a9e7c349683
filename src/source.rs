//! The pull contract every producer, stage and broadcaster reader implements.
//!
//! A [`Source`] is polled for its next signal:
//!
//! | `poll_pull` result        | Meaning                  |
//! |---------------------------|--------------------------|
//! | `Ready(Some(Ok(value)))`  | next value               |
//! | `Ready(Some(Err(error)))` | terminal error           |
//! | `Ready(None)`             | end of sequence          |
//! | `Pending`                 | suspended, waker stored  |
//!
//! Terminal signals are idempotent: once a source reported an error or the
//! end of sequence, every later pull reports the same thing again. After
//! [`Source::cancel`] a source releases whatever it holds (timers, nested
//! sources, broadcaster registrations), forwards the cancellation upstream
//! and from then on reports the end of sequence. Dropping a source releases
//! the same resources.
//!
//! Cold sources do nothing until the first pull; each consumer builds its own
//! instance and so gets its own production.

use std::{
  future::Future,
  ops::DerefMut,
  pin::Pin,
  task::{Context, Poll},
};

use crate::{
  error::{Error, Result},
  receiver::Receiver,
  stage::Stage,
  subscription::Subscription,
};

mod boxed;
mod create;
mod defer;
mod from_future;
mod from_iter;
mod from_stream;
mod into_stream;

pub use boxed::{BoxSource, LocalBoxSource};
pub use create::{create, Create, Emitter};
pub use defer::{defer, Defer};
pub use from_future::{from_future, FromFuture};
pub use from_iter::{empty, from_iter, of, throw_err, FromIter, ThrowErr};
pub use from_stream::{from_stream, FromStream};
pub use into_stream::IntoStream;

/// A pull-based producer of a terminated value sequence.
#[must_use = "sources do nothing unless pulled"]
pub trait Source {
  type Item;

  /// Attempts to pull the next signal, registering the waker when suspended.
  fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Self::Item>>>;

  /// Stops the source: releases its resources and cancels everything it pulls
  /// from. Safe to call any number of times.
  fn cancel(self: Pin<&mut Self>);

  /// Diagnostic name. Never affects behavior.
  fn name(&self) -> &'static str { "source" }
}

impl<P> Source for Pin<P>
where
  P: DerefMut + Unpin,
  P::Target: Source,
{
  type Item = <P::Target as Source>::Item;

  fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Self::Item>>> {
    self.get_mut().as_mut().poll_pull(cx)
  }

  fn cancel(self: Pin<&mut Self>) { self.get_mut().as_mut().cancel() }

  fn name(&self) -> &'static str { (**self).name() }
}

impl<S: Source + Unpin + ?Sized> Source for Box<S> {
  type Item = S::Item;

  fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Self::Item>>> {
    Pin::new(&mut **self.get_mut()).poll_pull(cx)
  }

  fn cancel(self: Pin<&mut Self>) { Pin::new(&mut **self.get_mut()).cancel() }

  fn name(&self) -> &'static str { (**self).name() }
}

impl<S: Source + Unpin + ?Sized> Source for &mut S {
  type Item = S::Item;

  fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Self::Item>>> {
    Pin::new(&mut **self.get_mut()).poll_pull(cx)
  }

  fn cancel(self: Pin<&mut Self>) { Pin::new(&mut **self.get_mut()).cancel() }

  fn name(&self) -> &'static str { (**self).name() }
}

/// Combinators available on every [`Source`].
pub trait SourceExt: Source {
  /// Pulls the next signal.
  fn pull(&mut self) -> Pull<'_, Self>
  where
    Self: Unpin,
  {
    Pull { source: self }
  }

  /// Cancels an `Unpin` source in place.
  fn stop(&mut self)
  where
    Self: Unpin,
  {
    Pin::new(self).cancel()
  }

  /// Attaches `stage` to this source and returns its output.
  fn pipe<St>(self, stage: St) -> St::Output
  where
    Self: Sized,
    St: Stage<Self>,
  {
    stage.apply(self)
  }

  /// Runs a pull loop on the ambient tokio runtime, routing every signal to
  /// `receiver`.
  ///
  /// # Panics
  ///
  /// Panics when called outside a tokio runtime.
  fn subscribe(self, receiver: impl Into<Receiver<Self::Item>>) -> Subscription
  where
    Self: Sized + Send + 'static,
    Self::Item: Send + 'static,
  {
    Subscription::spawn(self, receiver.into())
  }

  /// Views the source as a `futures::Stream` of `Result` items.
  fn into_stream(self) -> IntoStream<Self>
  where
    Self: Sized,
  {
    IntoStream::new(self)
  }

  fn boxed<'a>(self) -> BoxSource<'a, Self::Item>
  where
    Self: Sized + Send + 'a,
  {
    Box::pin(self)
  }

  fn boxed_local<'a>(self) -> LocalBoxSource<'a, Self::Item>
  where
    Self: Sized + 'a,
  {
    Box::pin(self)
  }
}

impl<S: Source + ?Sized> SourceExt for S {}

/// Future returned by [`SourceExt::pull`].
#[must_use = "futures do nothing unless polled"]
#[derive(Debug)]
pub struct Pull<'a, S: ?Sized> {
  source: &'a mut S,
}

impl<S: Source + Unpin + ?Sized> Future for Pull<'_, S> {
  type Output = Option<Result<S::Item>>;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    Pin::new(&mut *self.source).poll_pull(cx)
  }
}

/// Terminal bookkeeping shared by sources that terminate on their own.
#[derive(Debug, Clone, Default)]
pub(crate) enum Status {
  #[default]
  Live,
  Done,
  Failed(Error),
}

impl Status {
  /// The signal to replay when already terminal.
  pub(crate) fn replay<T>(&self) -> Option<Poll<Option<Result<T>>>> {
    match self {
      Status::Live => None,
      Status::Done => Some(Poll::Ready(None)),
      Status::Failed(err) => Some(Poll::Ready(Some(Err(err.clone())))),
    }
  }

  pub(crate) fn done<T>(&mut self) -> Poll<Option<Result<T>>> {
    *self = Status::Done;
    Poll::Ready(None)
  }

  pub(crate) fn fail<T>(&mut self, err: Error) -> Poll<Option<Result<T>>> {
    *self = Status::Failed(err.clone());
    Poll::Ready(Some(Err(err)))
  }

  pub(crate) fn is_live(&self) -> bool { matches!(self, Status::Live) }
}

/// Returns early with the replayed terminal signal, if any.
macro_rules! replay_terminal {
  ($status:expr) => {
    if let Some(signal) = $status.replay() {
      return signal;
    }
  };
}
pub(crate) use replay_terminal;
