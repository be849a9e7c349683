//! Commonly used types, traits and source factories.
//!
//! Stages are not re-exported here; import them from [`crate::ops`].

pub use crate::{
  broadcaster::{Broadcaster, Reader},
  config::{BroadcasterConfig, Retention, SchedulerConfig},
  error::{BoxError, Error, Result},
  receiver::Receiver,
  ref_count::RefCount,
  scheduler::{Deferred, Scheduler},
  source::{
    create, defer, empty, from_future, from_iter, from_stream, of, throw_err, BoxSource, Create,
    Defer, Emitter, FromFuture, FromIter, FromStream, IntoStream, LocalBoxSource, Pull, Source,
    SourceExt, ThrowErr,
  },
  stage::{Chain, Instrument, Pipeline, Stage, TapEvent, TapPoint, Tapped, TracingInstrument},
  subscription::{Subscription, SubscriptionGuard},
};
