//! Error types shared by every source, stage and scheduler operation.
//!
//! A single [`Error`] travels through a pipeline. It is cheap to clone because
//! terminal signals are idempotent: a source that failed keeps returning the
//! same error to every later pull, and a broadcaster hands one error to every
//! attached reader.

use std::sync::Arc;

use thiserror::Error;

/// Boxed error accepted from user code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared form of a user error, stored inside [`Error`].
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors observed at a pull boundary or at a scheduler deferred result.
///
/// Misuse such as completing a broadcaster twice is not an error: those calls
/// are ignored and logged at debug level.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum Error {
  /// Raised by an origin source.
  #[error("producer failed: {0}")]
  Producer(#[source] SharedError),

  /// Raised inside a stage's transform logic.
  #[error("stage `{stage}` failed: {source}")]
  Stage {
    /// Diagnostic name of the failing stage.
    stage: &'static str,
    /// The transform's own error.
    #[source]
    source: SharedError,
  },

  /// A scheduled operation returned an error.
  #[error("scheduled operation failed: {0}")]
  Operation(#[source] SharedError),

  /// A scheduled operation panicked; the queue kept draining.
  #[error("scheduled operation panicked: {message}")]
  Panicked {
    /// Panic payload rendered as text.
    message: String,
  },

  /// A source terminated without ever producing the value a combinator needed.
  #[error("source #{index} of `{stage}` completed without producing a value")]
  EmptySource {
    /// Diagnostic name of the combinator.
    stage: &'static str,
    /// Position of the offending source.
    index: usize,
  },

  /// The operation behind a deferred result was dropped before it ran.
  #[error("operation dropped before completion")]
  Cancelled,

  /// No tokio runtime was reachable from the calling thread.
  #[error("no tokio runtime available: {0}")]
  NoRuntime(String),
}

impl Error {
  /// Wraps an origin failure.
  pub fn producer(err: impl Into<BoxError>) -> Self { Error::Producer(Arc::from(err.into())) }

  /// Wraps a failure raised inside the stage named `stage`.
  pub fn stage(stage: &'static str, err: impl Into<BoxError>) -> Self {
    Error::Stage { stage, source: Arc::from(err.into()) }
  }

  /// Wraps a failure returned by a scheduled operation.
  pub fn operation(err: impl Into<BoxError>) -> Self { Error::Operation(Arc::from(err.into())) }

  /// Returns a short stable label (snake_case) for logs.
  ///
  /// ```
  /// use rxflow::Error;
  ///
  /// assert_eq!(Error::producer("boom").as_label(), "producer");
  /// assert_eq!(Error::Cancelled.as_label(), "cancelled");
  /// ```
  pub fn as_label(&self) -> &'static str {
    match self {
      Error::Producer(_) => "producer",
      Error::Stage { .. } => "stage",
      Error::Operation(_) => "operation",
      Error::Panicked { .. } => "panicked",
      Error::EmptySource { .. } => "empty_source",
      Error::Cancelled => "cancelled",
      Error::NoRuntime(_) => "no_runtime",
    }
  }
}
