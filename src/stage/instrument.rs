//! Observation hooks for pipelines.
//!
//! A [`Pipeline`](super::Pipeline) wraps its origin, every stage output and
//! its final output in a [`Tapped`] source. Without an [`Instrument`] the
//! wrapper forwards signals untouched; with one, it also reports each signal
//! together with the [`TapPoint`] it passed. Reporting never alters values,
//! their order or termination.

use std::{
  fmt::{Display, Formatter},
  pin::Pin,
  sync::Arc,
  task::{ready, Context, Poll},
};

use pin_project_lite::pin_project;
use tracing::trace;

use crate::{
  error::{Error, Result},
  source::Source,
};

/// Where in a pipeline a signal was observed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TapPoint {
  Origin,
  Stage { index: usize, name: &'static str },
  Output,
}

impl Display for TapPoint {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      TapPoint::Origin => f.write_str("origin"),
      TapPoint::Stage { index, name } => write!(f, "stage#{index}({name})"),
      TapPoint::Output => f.write_str("output"),
    }
  }
}

/// A signal passing a tap point.
#[derive(Clone, Copy, Debug)]
pub enum TapEvent<'a> {
  Value,
  Error(&'a Error),
  Done,
  Cancel,
}

/// Receives every signal passing an instrumented pipeline.
pub trait Instrument: Send + Sync {
  fn observe(&self, point: &TapPoint, event: TapEvent<'_>);
}

/// Reports every signal through `tracing::trace!`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingInstrument;

impl Instrument for TracingInstrument {
  fn observe(&self, point: &TapPoint, event: TapEvent<'_>) {
    match event {
      TapEvent::Error(err) => trace!(%point, error = %err, "pipeline error"),
      event => trace!(%point, ?event, "pipeline signal"),
    }
  }
}

pin_project! {
  /// Transparent wrapper reporting the signals of `source`.
  pub struct Tapped<S> {
    #[pin]
    source: S,
    point: TapPoint,
    instrument: Option<Arc<dyn Instrument>>,
    terminal_seen: bool,
  }
}

impl<S> Tapped<S> {
  pub(crate) fn new(source: S, point: TapPoint, instrument: Option<Arc<dyn Instrument>>) -> Self {
    Tapped { source, point, instrument, terminal_seen: false }
  }

  pub fn point(&self) -> &TapPoint { &self.point }
}

impl<S: Source> Source for Tapped<S> {
  type Item = S::Item;

  fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<S::Item>>> {
    let this = self.project();
    let signal = ready!(this.source.poll_pull(cx));
    if let Some(instrument) = this.instrument.as_deref() {
      match &signal {
        Some(Ok(_)) => instrument.observe(this.point, TapEvent::Value),
        // Terminal signals repeat on later pulls; report the first one only.
        _ if *this.terminal_seen => {}
        Some(Err(err)) => instrument.observe(this.point, TapEvent::Error(err)),
        None => instrument.observe(this.point, TapEvent::Done),
      }
    }
    if !matches!(signal, Some(Ok(_))) {
      *this.terminal_seen = true;
    }
    Poll::Ready(signal)
  }

  fn cancel(self: Pin<&mut Self>) {
    let this = self.project();
    if let Some(instrument) = this.instrument.as_deref() {
      if !*this.terminal_seen {
        instrument.observe(this.point, TapEvent::Cancel);
      }
    }
    *this.terminal_seen = true;
    this.source.cancel()
  }

  fn name(&self) -> &'static str { self.source.name() }
}

impl<S> std::fmt::Debug for Tapped<S> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Tapped")
      .field("point", &self.point)
      .field("instrumented", &self.instrument.is_some())
      .finish()
  }
}
