//! Hot multicast source.
//!
//! A [`Broadcaster`] shares one producing execution across any number of
//! [`Reader`]s. Producer calls (`push`, `complete`, `error`) only decide at
//! call time whether they are accepted; the state change itself is applied by
//! an operation queued on the broadcaster's [`Scheduler`]. Reader attach and
//! detach go through the same queue, so every reader observes pushes in one
//! total order equal to call order, and a reader sees exactly the pushes made
//! after its `reader()` call.
//!
//! | Retention                 | A reader attaching while active first gets |
//! |---------------------------|--------------------------------------------|
//! | `Retention::None`         | nothing                                    |
//! | `Retention::Latest`       | the most recent value                      |
//! | `Retention::Replay{..}`   | the retained backlog, oldest first         |
//!
//! A reader attaching after termination gets only the terminal signal.
//!
//! ```rust
//! use futures::TryStreamExt;
//! use rxflow::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let scheduler = Scheduler::new();
//! let ticks = Broadcaster::replay(&scheduler, 2);
//! ticks.push(1);
//! ticks.push(2);
//! ticks.push(3);
//! let late = ticks.reader();
//! ticks.complete();
//! let seen: Vec<i32> = late.into_stream().try_collect().await.unwrap();
//! assert_eq!(seen, vec![2, 3]);
//! # }
//! ```

use std::{
  collections::VecDeque,
  fmt::{Debug, Formatter},
  sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex, Weak,
  },
};

use futures::channel::mpsc::{self, UnboundedSender};
use tracing::debug;

use crate::{
  config::{BroadcasterConfig, Retention},
  error::{Error, Result},
  receiver::Receiver,
  scheduler::{Deferred, Scheduler},
  source::SourceExt,
  subscription::Subscription,
  util::lock,
};

mod reader;

pub use reader::Reader;

/// Shared handle to a hot source. Clones publish into the same broadcaster.
pub struct Broadcaster<T> {
  shared: Arc<Shared<T>>,
}

struct Shared<T> {
  config: BroadcasterConfig,
  scheduler: Scheduler,
  /// Flipped once by the first `complete`/`error` call.
  accepting: AtomicBool,
  next_reader: AtomicU64,
  /// Latest accepted push, recorded at call time when values are retained.
  latest: Mutex<Option<T>>,
  state: Mutex<State<T>>,
}

struct State<T> {
  phase: Phase,
  readers: Vec<(u64, UnboundedSender<Result<T>>)>,
  retained: VecDeque<T>,
}

enum Phase {
  Active,
  Completed,
  Errored(Error),
}

impl<T: Clone + Send + 'static> Broadcaster<T> {
  /// Plain broadcaster: readers only see pushes made after they attach.
  pub fn new(scheduler: &Scheduler) -> Self { Self::with_config(scheduler, BroadcasterConfig::default()) }

  /// Behavior broadcaster seeded with `initial`.
  pub fn behavior(scheduler: &Scheduler, initial: T) -> Self {
    let broadcaster =
      Self::with_config(scheduler, BroadcasterConfig::default().retention(Retention::Latest));
    *lock(&broadcaster.shared.latest) = Some(initial.clone());
    lock(&broadcaster.shared.state).retained.push_back(initial);
    broadcaster
  }

  /// Replay broadcaster keeping the last `capacity` values.
  pub fn replay(scheduler: &Scheduler, capacity: usize) -> Self {
    let retention = Retention::Replay { capacity: Some(capacity) };
    Self::with_config(scheduler, BroadcasterConfig::default().retention(retention))
  }

  /// Replay broadcaster keeping every value.
  pub fn replay_unbounded(scheduler: &Scheduler) -> Self {
    let retention = Retention::Replay { capacity: None };
    Self::with_config(scheduler, BroadcasterConfig::default().retention(retention))
  }

  pub fn with_config(scheduler: &Scheduler, config: BroadcasterConfig) -> Self {
    Broadcaster {
      shared: Arc::new(Shared {
        config,
        scheduler: scheduler.clone(),
        accepting: AtomicBool::new(true),
        next_reader: AtomicU64::new(0),
        latest: Mutex::new(None),
        state: Mutex::new(State {
          phase: Phase::Active,
          readers: Vec::new(),
          retained: VecDeque::new(),
        }),
      }),
    }
  }

  /// Queues delivery of `value` to every attached reader.
  ///
  /// Ignored once `complete` or `error` has been called.
  pub fn push(&self, value: T) -> Deferred<()> {
    // Held across enqueue so `latest` follows the scheduled push order.
    let mut latest = lock(&self.shared.latest);
    if !self.shared.accepting.load(Ordering::Acquire) {
      debug!(broadcaster = %self.shared.config.name, "push after termination ignored");
      return Deferred::ready(Ok(()));
    }
    if self.shared.config.retention.capacity() != Some(0) {
      *latest = Some(value.clone());
    }
    let shared = self.shared.clone();
    self.shared.scheduler.enqueue_fn(move || {
      shared.fan_out(value);
      Ok(())
    })
  }

  /// Queues normal termination. Only the first terminal call counts.
  pub fn complete(&self) -> Deferred<()> { self.terminate(None) }

  /// Queues termination with `err`. Only the first terminal call counts.
  pub fn error(&self, err: Error) -> Deferred<()> { self.terminate(Some(err)) }

  fn terminate(&self, err: Option<Error>) -> Deferred<()> {
    // Orders termination against concurrent pushes.
    let _latest = lock(&self.shared.latest);
    if !self.shared.accepting.swap(false, Ordering::AcqRel) {
      debug!(broadcaster = %self.shared.config.name, "repeated termination ignored");
      return Deferred::ready(Ok(()));
    }
    let shared = self.shared.clone();
    self.shared.scheduler.enqueue_fn(move || {
      shared.finish(err);
      Ok(())
    })
  }

  /// Attaches a new reader.
  ///
  /// The reader's position in the push order is fixed by this call; the
  /// registration is applied by the scheduler after every operation queued
  /// before it.
  pub fn reader(&self) -> Reader<T> {
    let (tx, rx) = mpsc::unbounded();
    let id = self.shared.next_reader.fetch_add(1, Ordering::Relaxed);
    let shared = self.shared.clone();
    self.shared.scheduler.enqueue_fn(move || {
      shared.attach(id, tx);
      Ok(())
    });
    Reader::new(rx, Self::detacher(Arc::downgrade(&self.shared), id))
  }

  fn detacher(shared: Weak<Shared<T>>, id: u64) -> reader::Detach {
    Box::new(move || {
      if let Some(shared) = shared.upgrade() {
        let scheduler = shared.scheduler.clone();
        scheduler.enqueue_fn(move || {
          shared.detach(id);
          Ok(())
        });
      }
    })
  }

  /// Attaches a reader and subscribes `receiver` to it.
  pub fn subscribe(&self, receiver: impl Into<Receiver<T>>) -> Subscription {
    self.reader().subscribe(receiver)
  }

  /// A receiver that forwards every signal it gets into this broadcaster.
  pub fn into_receiver(self) -> Receiver<T> {
    let on_error = self.clone();
    let on_complete = self.clone();
    Receiver::new()
      .on_next(move |value| {
        self.push(value);
      })
      .on_error(move |err| {
        on_error.error(err);
      })
      .on_complete(move || {
        on_complete.complete();
      })
  }

  /// The most recent accepted push, or the initial value of a behavior
  /// broadcaster. Updated when `push` is called, ahead of reader delivery.
  /// Always `None` with `Retention::None`.
  pub fn value(&self) -> Option<T> { lock(&self.shared.latest).clone() }

  /// Readers currently attached, as of the operations applied so far.
  pub fn reader_count(&self) -> usize { lock(&self.shared.state).readers.len() }

  /// `true` once `complete` or `error` has been called.
  pub fn is_terminated(&self) -> bool { !self.shared.accepting.load(Ordering::Acquire) }

  pub fn name(&self) -> &str { &self.shared.config.name }

  pub fn retention(&self) -> Retention { self.shared.config.retention }
}

impl<T> Clone for Broadcaster<T> {
  fn clone(&self) -> Self { Broadcaster { shared: self.shared.clone() } }
}

impl<T> Debug for Broadcaster<T> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Broadcaster")
      .field("name", &self.shared.config.name)
      .field("retention", &self.shared.config.retention)
      .field("terminated", &!self.shared.accepting.load(Ordering::Acquire))
      .finish()
  }
}

// ==================== Scheduled state changes ====================

impl<T: Clone> Shared<T> {
  fn attach(&self, id: u64, tx: UnboundedSender<Result<T>>) {
    let mut state = lock(&self.state);
    match &state.phase {
      Phase::Active => {
        for value in state.retained.iter() {
          let _ = tx.unbounded_send(Ok(value.clone()));
        }
        state.readers.push((id, tx));
      }
      // Dropping the sender ends the reader.
      Phase::Completed => {}
      Phase::Errored(err) => {
        let _ = tx.unbounded_send(Err(err.clone()));
      }
    }
  }

  fn detach(&self, id: u64) { lock(&self.state).readers.retain(|(reader, _)| *reader != id); }

  fn fan_out(&self, value: T) {
    let mut state = lock(&self.state);
    if !matches!(state.phase, Phase::Active) {
      return;
    }
    state.readers.retain(|(_, tx)| tx.unbounded_send(Ok(value.clone())).is_ok());
    match self.config.retention.capacity() {
      Some(0) => {}
      Some(capacity) => {
        state.retained.push_back(value);
        while state.retained.len() > capacity {
          state.retained.pop_front();
        }
      }
      None => state.retained.push_back(value),
    }
  }

  fn finish(&self, err: Option<Error>) {
    let mut state = lock(&self.state);
    if !matches!(state.phase, Phase::Active) {
      return;
    }
    let readers = std::mem::take(&mut state.readers);
    // Late readers only get the terminal signal.
    state.retained = VecDeque::new();
    state.phase = match &err {
      Some(err) => Phase::Errored(err.clone()),
      None => Phase::Completed,
    };
    drop(state);

    debug!(
      broadcaster = %self.config.name,
      readers = readers.len(),
      failed = err.is_some(),
      "broadcaster terminated"
    );
    if let Some(err) = err {
      for (_, tx) in readers.iter() {
        let _ = tx.unbounded_send(Err(err.clone()));
      }
    }
  }
}
