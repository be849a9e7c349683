//! Stage composition protocol.
//!
//! A [`Stage`] is an immutable descriptor. [`Stage::apply`] instantiates it
//! over an input source and returns the live output source, which exclusively
//! owns that input. Because `apply` only borrows the descriptor, one
//! descriptor can be attached to any number of pipelines.
//!
//! Every live stage output honors the same contract:
//! - termination and errors it cannot resolve locally are forwarded unchanged,
//!   and no value is produced after upstream terminated;
//! - `cancel` releases the stage's own timers and nested sources, then
//!   forwards the cancellation upstream.
//!
//! Stages compose left to right with [`SourceExt::pipe`], with
//! [`Chain`] or with the [`pipe!`](crate::pipe) macro:
//!
//! ```rust
//! use futures::TryStreamExt;
//! use rxflow::{ops::{filter, map}, pipe, prelude::*};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let doubled_odds = pipe!(from_iter(1..=5), filter(|v: &i32| v % 2 == 1), map(|v: i32| v * 2));
//! let out: Vec<i32> = doubled_odds.into_stream().try_collect().await.unwrap();
//! assert_eq!(out, vec![2, 6, 10]);
//! # }
//! ```
//!
//! [`SourceExt::pipe`]: crate::source::SourceExt::pipe

use crate::source::Source;

mod instrument;
mod pipeline;

pub use instrument::{Instrument, TapEvent, TapPoint, Tapped, TracingInstrument};
pub use pipeline::Pipeline;

/// A named transform from one source to another.
pub trait Stage<S: Source> {
  type Output: Source;

  /// Diagnostic name. Never affects behavior.
  fn name(&self) -> &'static str;

  /// Builds a live instance of this stage that owns `source`.
  fn apply(&self, source: S) -> Self::Output;
}

impl<S: Source, St: Stage<S> + ?Sized> Stage<S> for &St {
  type Output = St::Output;

  fn name(&self) -> &'static str { (**self).name() }

  fn apply(&self, source: S) -> Self::Output { (**self).apply(source) }
}

/// Two stages applied one after the other.
#[derive(Clone, Copy, Debug)]
pub struct Chain<A, B> {
  first: A,
  second: B,
}

impl<A, B> Chain<A, B> {
  pub fn new(first: A, second: B) -> Self { Chain { first, second } }
}

impl<S, A, B> Stage<S> for Chain<A, B>
where
  S: Source,
  A: Stage<S>,
  B: Stage<A::Output>,
{
  type Output = B::Output;

  fn name(&self) -> &'static str { "chain" }

  fn apply(&self, source: S) -> Self::Output { self.second.apply(self.first.apply(source)) }
}

/// Applies stages to a source from left to right.
///
/// `pipe!(source, a, b)` is `b.apply(a.apply(source))`.
#[macro_export]
macro_rules! pipe {
  ($source:expr $(, $stage:expr)* $(,)?) => {{
    let source = $source;
    $(let source = $crate::source::SourceExt::pipe(source, $stage);)*
    source
  }};
}
