//! Serializing scheduler.
//!
//! A [`Scheduler`] is a FIFO queue of deferred operations drained by a single
//! tokio task. Operations run one at a time, strictly in enqueue order, and an
//! asynchronous operation finishes completely before the next one starts.
//! Every [`Broadcaster`](crate::broadcaster::Broadcaster) applies its state
//! changes through a scheduler, which is where the cross-reader ordering
//! guarantee comes from.
//!
//! Failures stay with the operation that raised them: the error (or caught
//! panic) resolves that operation's [`Deferred`], is logged with
//! `tracing::warn!`, and the queue keeps draining.
//!
//! ```rust
//! use rxflow::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let scheduler = Scheduler::new();
//! let first = scheduler.enqueue_fn(|| Ok(1));
//! let second = scheduler.enqueue(|| async { Ok(2) });
//! assert_eq!(first.await.unwrap() + second.await.unwrap(), 3);
//! scheduler.flush().await;
//! # }
//! ```

use std::{
  collections::VecDeque,
  future::Future,
  panic::AssertUnwindSafe,
  pin::Pin,
  sync::{Arc, Mutex},
  task::{Context, Poll},
};

use futures::{future::BoxFuture, FutureExt};
use tokio::{
  runtime::Handle,
  sync::{oneshot, Notify},
};
use tracing::{trace, warn};

use crate::{
  config::SchedulerConfig,
  error::{Error, Result},
  util::{lock, panic_message, wait_until},
};

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Cloneable handle to a serializing operation queue.
///
/// Clones share one queue. Pass the handle to every broadcaster and
/// time-based stage that must share an ordering domain; independent
/// pipelines can use independent schedulers.
#[derive(Clone)]
pub struct Scheduler {
  inner: Arc<Inner>,
}

struct Inner {
  config: SchedulerConfig,
  handle: Handle,
  queue: Mutex<Queue>,
  idle: Notify,
}

#[derive(Default)]
struct Queue {
  jobs: VecDeque<Job>,
  draining: bool,
  next_seq: u64,
}

impl Scheduler {
  /// Creates a scheduler on the current tokio runtime.
  ///
  /// # Panics
  ///
  /// Panics when called outside a tokio runtime; use
  /// [`Scheduler::try_current`] or [`Scheduler::with_handle`] instead.
  pub fn new() -> Self { Self::with_config(SchedulerConfig::default()) }

  /// Creates a configured scheduler on the current tokio runtime.
  ///
  /// # Panics
  ///
  /// Panics when called outside a tokio runtime.
  pub fn with_config(config: SchedulerConfig) -> Self { Self::with_handle(Handle::current(), config) }

  /// Creates a scheduler on the current runtime, or reports that none exists.
  pub fn try_current() -> Result<Self> {
    Handle::try_current()
      .map(|handle| Self::with_handle(handle, SchedulerConfig::default()))
      .map_err(|err| Error::NoRuntime(err.to_string()))
  }

  /// Creates a scheduler whose drain loop runs on `handle`.
  pub fn with_handle(handle: Handle, config: SchedulerConfig) -> Self {
    Scheduler {
      inner: Arc::new(Inner {
        config,
        handle,
        queue: Mutex::new(Queue::default()),
        idle: Notify::new(),
      }),
    }
  }

  pub fn name(&self) -> &str { &self.inner.config.name }

  /// Queues an asynchronous operation.
  ///
  /// `op` is not called until every operation queued before it has finished.
  /// The returned [`Deferred`] resolves with the operation's outcome;
  /// dropping it does not cancel the operation.
  pub fn enqueue<F, Fut, T>(&self, op: F) -> Deferred<T>
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
  {
    let (tx, rx) = oneshot::channel();
    let catch_panics = self.inner.config.catch_panics;
    let name = self.inner.config.name.clone();

    let mut queue = lock(&self.inner.queue);
    let seq = queue.next_seq;
    queue.next_seq += 1;
    let job: Job = Box::new(move || {
      async move {
        let outcome = if catch_panics {
          AssertUnwindSafe(async move { op().await })
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(Error::Panicked { message: panic_message(&*payload) }))
        } else {
          op().await
        };
        if let Err(err) = &outcome {
          warn!(scheduler = %name, seq, error = %err, "scheduled operation failed");
        }
        // The caller may have dropped its deferred result.
        let _ = tx.send(outcome);
      }
      .boxed()
    });
    queue.jobs.push_back(job);
    trace!(scheduler = %self.inner.config.name, seq, "operation queued");
    let start_drain = !std::mem::replace(&mut queue.draining, true);
    drop(queue);

    if start_drain {
      self.inner.spawn_drain();
    }
    Deferred { rx }
  }

  /// Queues a synchronous operation. Same ordering and isolation rules as
  /// [`Scheduler::enqueue`].
  pub fn enqueue_fn<F, T>(&self, op: F) -> Deferred<T>
  where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.enqueue(move || futures::future::ready(op()))
  }

  /// Resolves once the queue is empty and no operation is running.
  pub async fn flush(&self) { wait_until(&self.inner.idle, || self.is_idle()).await }

  /// Number of operations waiting behind the running one.
  pub fn pending(&self) -> usize { lock(&self.inner.queue).jobs.len() }

  pub fn is_idle(&self) -> bool {
    let queue = lock(&self.inner.queue);
    queue.jobs.is_empty() && !queue.draining
  }

  /// Timer primitive for time-based stages, bound to this scheduler's runtime.
  #[cfg(feature = "timer")]
  pub fn sleep(&self, duration: std::time::Duration) -> tokio::time::Sleep {
    let _runtime = self.inner.handle.enter();
    tokio::time::sleep(duration)
  }
}

impl Default for Scheduler {
  fn default() -> Self { Self::new() }
}

impl std::fmt::Debug for Scheduler {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Scheduler")
      .field("name", &self.inner.config.name)
      .field("pending", &self.pending())
      .finish()
  }
}

impl Inner {
  fn spawn_drain(self: &Arc<Self>) {
    let inner = self.clone();
    self.handle.spawn(drain(inner));
  }
}

/// The single drain loop. Only started when `draining` flips to true.
async fn drain(inner: Arc<Inner>) {
  let mut guard = DrainGuard { inner: inner.clone(), finished: false };
  loop {
    let job = {
      let mut queue = lock(&inner.queue);
      match queue.jobs.pop_front() {
        Some(job) => job,
        None => {
          queue.draining = false;
          break;
        }
      }
    };
    job().await;
  }
  guard.finished = true;
  inner.idle.notify_waiters();
}

/// Hands the queue to a fresh drain loop when the current one unwinds.
struct DrainGuard {
  inner: Arc<Inner>,
  finished: bool,
}

impl Drop for DrainGuard {
  fn drop(&mut self) {
    if self.finished {
      return;
    }
    let mut queue = lock(&self.inner.queue);
    if queue.jobs.is_empty() {
      queue.draining = false;
      drop(queue);
      self.inner.idle.notify_waiters();
    } else {
      drop(queue);
      self.inner.spawn_drain();
    }
  }
}

/// Deferred outcome of a scheduled operation.
///
/// Resolves to [`Error::Cancelled`] if the operation was dropped without
/// running, e.g. because its runtime shut down.
#[derive(Debug)]
pub struct Deferred<T> {
  rx: oneshot::Receiver<Result<T>>,
}

impl<T> Deferred<T> {
  /// A deferred result that is already resolved.
  pub fn ready(outcome: Result<T>) -> Self {
    let (tx, rx) = oneshot::channel();
    let _ = tx.send(outcome);
    Deferred { rx }
  }
}

impl<T> Future for Deferred<T> {
  type Output = Result<T>;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    Pin::new(&mut self.rx).poll(cx).map(|received| match received {
      Ok(outcome) => outcome,
      Err(_) => Err(Error::Cancelled),
    })
  }
}
