//! Ref-counted sharing of one producer.
//!
//! [`RefCount`] counts its subscribers. The 0 → 1 transition builds a fresh
//! [`Broadcaster`] and starts the producer from the factory; the 1 → 0
//! transition cancels the producer and drops the broadcaster. However many
//! subscribers attach, at most one producer runs at a time, and a subscriber
//! arriving after everyone left starts a new one.

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::{
  broadcaster::Broadcaster,
  receiver::Receiver,
  scheduler::Scheduler,
  source::{BoxSource, Source, SourceExt},
  subscription::Subscription,
  util::lock,
};

type Factory<T> = Box<dyn Fn() -> BoxSource<'static, T> + Send + Sync>;

/// Shares the source built by a factory between all current subscribers.
pub struct RefCount<T> {
  inner: Arc<Inner<T>>,
}

struct Inner<T> {
  name: &'static str,
  scheduler: Scheduler,
  factory: Factory<T>,
  state: Mutex<Production<T>>,
}

struct Production<T> {
  subscribers: usize,
  broadcaster: Option<Broadcaster<T>>,
  pump: Option<Subscription>,
}

impl<T: Clone + Send + 'static> RefCount<T> {
  pub fn new<F, S>(scheduler: &Scheduler, factory: F) -> Self
  where
    F: Fn() -> S + Send + Sync + 'static,
    S: Source<Item = T> + Send + 'static,
  {
    RefCount {
      inner: Arc::new(Inner {
        name: "ref_count",
        scheduler: scheduler.clone(),
        factory: Box::new(move || factory().boxed()),
        state: Mutex::new(Production { subscribers: 0, broadcaster: None, pump: None }),
      }),
    }
  }

  /// Diagnostic name used in logs.
  pub fn named(mut self, name: &'static str) -> Self {
    if let Some(inner) = Arc::get_mut(&mut self.inner) {
      inner.name = name;
    }
    self
  }

  pub fn subscribe(&self, receiver: impl Into<Receiver<T>>) -> Subscription {
    let subscription = {
      let mut state = lock(&self.inner.state);
      state.subscribers += 1;
      match state.broadcaster.clone() {
        Some(broadcaster) => broadcaster.subscribe(receiver),
        None => {
          let broadcaster = Broadcaster::new(&self.inner.scheduler);
          // Attached before the producer can push anything.
          let subscription = broadcaster.subscribe(receiver);
          debug!(source = self.inner.name, "starting shared producer");
          let pump = (self.inner.factory)().subscribe(broadcaster.clone().into_receiver());
          state.broadcaster = Some(broadcaster);
          state.pump = Some(pump);
          subscription
        }
      }
    };

    let inner = self.inner.clone();
    subscription.on_cancel(move || inner.release());
    subscription
  }

  pub fn subscriber_count(&self) -> usize { lock(&self.inner.state).subscribers }

  /// `true` while a producer started by this adapter is running.
  pub fn is_producing(&self) -> bool {
    lock(&self.inner.state).pump.as_ref().map_or(false, |pump| !pump.is_closed())
  }
}

impl<T> Inner<T> {
  fn release(&self) {
    let pump = {
      let mut state = lock(&self.state);
      state.subscribers = state.subscribers.saturating_sub(1);
      if state.subscribers > 0 {
        return;
      }
      state.broadcaster = None;
      state.pump.take()
    };
    if let Some(pump) = pump {
      debug!(source = self.name, "last subscriber left, stopping shared producer");
      pump.cancel();
    }
  }
}

impl<T> Clone for RefCount<T> {
  fn clone(&self) -> Self { RefCount { inner: self.inner.clone() } }
}

impl<T> std::fmt::Debug for RefCount<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RefCount")
      .field("name", &self.inner.name)
      .field("subscribers", &lock(&self.inner.state).subscribers)
      .finish()
  }
}
