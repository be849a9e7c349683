//! Construction-time settings for schedulers and broadcasters.
//!
//! Both structs are plain values with a `Default` and chainable setters; the
//! library reads no environment or files.

use std::borrow::Cow;

/// How much history a [`Broadcaster`](crate::broadcaster::Broadcaster) keeps
/// for readers that attach later.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Retention {
  /// Plain broadcaster: late readers see only later pushes.
  #[default]
  None,
  /// Behavior broadcaster: late readers first receive the most recent value.
  Latest,
  /// Replay broadcaster: late readers first drain the last `capacity` values
  /// (`None` keeps everything).
  Replay {
    /// Maximum backlog length, unbounded when `None`.
    capacity: Option<usize>,
  },
}

impl Retention {
  /// Backlog bound implied by the policy. `Some(0)` retains nothing.
  pub fn capacity(&self) -> Option<usize> {
    match self {
      Retention::None => Some(0),
      Retention::Latest => Some(1),
      Retention::Replay { capacity } => *capacity,
    }
  }
}

/// Settings for a [`Scheduler`](crate::scheduler::Scheduler).
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
  /// Diagnostic name reported in logs.
  pub name: Cow<'static, str>,
  /// Convert panics inside operations into `Error::Panicked` instead of
  /// tearing down the drain loop.
  pub catch_panics: bool,
}

impl SchedulerConfig {
  pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
    self.name = name.into();
    self
  }

  pub fn catch_panics(mut self, catch: bool) -> Self {
    self.catch_panics = catch;
    self
  }
}

impl Default for SchedulerConfig {
  fn default() -> Self { Self { name: Cow::Borrowed("scheduler"), catch_panics: true } }
}

/// Settings for a [`Broadcaster`](crate::broadcaster::Broadcaster).
#[derive(Clone, Debug)]
pub struct BroadcasterConfig {
  /// Diagnostic name reported in logs.
  pub name: Cow<'static, str>,
  /// History kept for late readers.
  pub retention: Retention,
}

impl BroadcasterConfig {
  pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
    self.name = name.into();
    self
  }

  pub fn retention(mut self, retention: Retention) -> Self {
    self.retention = retention;
    self
  }
}

impl Default for BroadcasterConfig {
  fn default() -> Self { Self { name: Cow::Borrowed("broadcaster"), retention: Retention::None } }
}
