//! The push/pull bridge.
//!
//! [`SourceExt::subscribe`](crate::source::SourceExt::subscribe) spawns one
//! pull loop per subscription. The loop pulls, suspends until the source
//! produces, and routes each signal to a [`Receiver`]. A [`Subscription`] is
//! the handle to that loop.
//!
//! Guarantees:
//! - `cancel()` is idempotent; once it returns, no receiver callback starts.
//!   A callback already running on another thread finishes first.
//! - On error or completion the loop cancels the source and runs every
//!   registered cleanup before the terminal callback fires.
//! - The error callback fires at most once and nothing fires after it.

use std::{
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
  },
  thread::{self, ThreadId},
};

use smallvec::SmallVec;
use tokio::sync::Notify;
use tracing::trace;

use crate::{
  error::Error,
  receiver::Receiver,
  source::{Source, SourceExt},
  util::{lock, wait_until},
};

type Cleanup = Box<dyn FnOnce() + Send>;

/// Handle to a running pull loop. Clones refer to the same loop.
///
/// Dropping the handle does not cancel the loop; see
/// [`Subscription::cancel_when_dropped`].
#[derive(Clone)]
pub struct Subscription {
  inner: Arc<Inner>,
}

struct Inner {
  closed: AtomicBool,
  cancel: Notify,
  /// Held while a receiver callback runs; `cancel` waits on it.
  gate: Mutex<()>,
  /// Thread running a callback under `gate`, so a cancel from inside the
  /// callback does not wait on itself.
  delivering: Mutex<Option<ThreadId>>,
  cleanup: Mutex<CleanupList>,
  exited: AtomicBool,
  exit: Notify,
}

#[derive(Default)]
struct CleanupList {
  ran: bool,
  callbacks: SmallVec<[Cleanup; 1]>,
}

enum Exit {
  Cancelled,
  Completed,
  Failed(Error),
}

impl Subscription {
  pub(crate) fn spawn<S>(source: S, receiver: Receiver<S::Item>) -> Self
  where
    S: Source + Send + 'static,
    S::Item: Send + 'static,
  {
    let subscription = Subscription {
      inner: Arc::new(Inner {
        closed: AtomicBool::new(false),
        cancel: Notify::new(),
        gate: Mutex::new(()),
        delivering: Mutex::new(None),
        cleanup: Mutex::new(CleanupList::default()),
        exited: AtomicBool::new(false),
        exit: Notify::new(),
      }),
    };
    trace!(source = source.name(), "subscription started");
    tokio::spawn(pull_loop(source, receiver, subscription.inner.clone()));
    subscription
  }

  /// Stops the pull loop. Later calls do nothing.
  pub fn cancel(&self) {
    if self.inner.closed.swap(true, Ordering::AcqRel) {
      return;
    }
    trace!("subscription cancelled");
    self.inner.cancel.notify_one();
    if *lock(&self.inner.delivering) != Some(thread::current().id()) {
      // Wait out a callback already running on another thread.
      drop(lock(&self.inner.gate));
    }
    self.inner.run_cleanup();
  }

  /// `true` once cancelled or terminated.
  pub fn is_closed(&self) -> bool { self.inner.closed.load(Ordering::Acquire) }

  /// Registers cleanup that runs exactly once when the subscription closes,
  /// whether by `cancel()` or by the source terminating. Runs immediately if
  /// the subscription is already closed. Earlier registrations are kept.
  pub fn on_cancel(&self, f: impl FnOnce() + Send + 'static) -> &Self {
    let mut cleanup = lock(&self.inner.cleanup);
    if cleanup.ran {
      drop(cleanup);
      f();
    } else {
      cleanup.callbacks.push(Box::new(f));
    }
    self
  }

  /// Resolves once the pull loop has exited and its terminal callback, if
  /// any, has returned.
  pub async fn finished(&self) {
    wait_until(&self.inner.exit, || self.inner.exited.load(Ordering::Acquire)).await
  }

  /// Cancels the subscription when the returned guard is dropped.
  pub fn cancel_when_dropped(self) -> SubscriptionGuard { SubscriptionGuard(self) }
}

impl std::fmt::Debug for Subscription {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription").field("closed", &self.is_closed()).finish()
  }
}

impl Inner {
  /// Runs `callback` unless the subscription is closed. `close` also marks
  /// it closed, atomically with the check.
  fn deliver(&self, close: bool, callback: impl FnOnce()) -> bool {
    let _gate = lock(&self.gate);
    let was_closed =
      if close { self.closed.swap(true, Ordering::AcqRel) } else { self.closed.load(Ordering::Acquire) };
    if was_closed {
      return false;
    }
    *lock(&self.delivering) = Some(thread::current().id());
    callback();
    *lock(&self.delivering) = None;
    true
  }

  fn run_cleanup(&self) {
    let callbacks = {
      let mut cleanup = lock(&self.cleanup);
      if cleanup.ran {
        return;
      }
      cleanup.ran = true;
      std::mem::take(&mut cleanup.callbacks)
    };
    for callback in callbacks {
      callback();
    }
  }
}

async fn pull_loop<S: Source>(source: S, mut receiver: Receiver<S::Item>, inner: Arc<Inner>) {
  let mut source = Box::pin(source);
  let exit = loop {
    if inner.closed.load(Ordering::Acquire) {
      break Exit::Cancelled;
    }
    let signal = tokio::select! {
      biased;
      _ = inner.cancel.notified() => break Exit::Cancelled,
      signal = source.pull() => signal,
    };
    match signal {
      Some(Ok(value)) => {
        if !inner.deliver(false, || receiver.next(value)) {
          break Exit::Cancelled;
        }
      }
      Some(Err(err)) => break Exit::Failed(err),
      None => break Exit::Completed,
    }
  };

  source.as_mut().cancel();
  drop(source);

  let delivered = match exit {
    Exit::Cancelled => false,
    Exit::Completed => inner.deliver(true, || {
      inner.run_cleanup();
      receiver.complete()
    }),
    Exit::Failed(err) => inner.deliver(true, || {
      trace!(error = %err, "pull loop stopped by error");
      inner.run_cleanup();
      receiver.error(err)
    }),
  };
  if !delivered {
    trace!("pull loop stopped by cancel");
    // Whichever of this and `cancel` gets here first runs cleanup.
    inner.run_cleanup();
  }
  drop(receiver);

  inner.exited.store(true, Ordering::Release);
  inner.exit.notify_waiters();
}

/// Cancels its subscription when dropped.
#[must_use = "dropping the guard cancels the subscription immediately"]
#[derive(Debug)]
pub struct SubscriptionGuard(Subscription);

impl SubscriptionGuard {
  pub fn subscription(&self) -> &Subscription { &self.0 }
}

impl Drop for SubscriptionGuard {
  fn drop(&mut self) { self.0.cancel() }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
  };

  use super::*;
  use crate::prelude::*;

  fn ticker() -> impl Source<Item = u32> + Send + 'static {
    create(|emitter: Emitter<u32>| async move {
      for i in 0.. {
        if !emitter.next(i) {
          break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
      }
    })
  }

  #[tokio::test]
  async fn values_then_complete() {
    let log = Arc::new(Mutex::new(vec![]));
    let (l1, l2) = (log.clone(), log.clone());
    let sub = from_iter(1..=3).subscribe(
      Receiver::new()
        .on_next(move |v: i32| l1.lock().unwrap().push(v.to_string()))
        .on_complete(move || l2.lock().unwrap().push("done".into())),
    );
    sub.finished().await;
    assert!(sub.is_closed());
    assert_eq!(*log.lock().unwrap(), vec!["1", "2", "3", "done"]);
  }

  #[tokio::test]
  async fn cleanup_runs_before_error_callback() {
    let cleaned = Arc::new(AtomicBool::new(false));
    let seen_clean = Arc::new(AtomicBool::new(false));
    let errors = Arc::new(AtomicUsize::new(0));

    let c_cleaned = cleaned.clone();
    let c_seen = seen_clean.clone();
    let c_errors = errors.clone();
    let source = from_iter(vec![Ok(1), Err(Error::producer("boom"))])
      .pipe(crate::ops::try_map(|v: Result<i32>| v));
    let sub = source.subscribe(Receiver::new().on_error(move |_| {
      c_seen.store(c_cleaned.load(Ordering::SeqCst), Ordering::SeqCst);
      c_errors.fetch_add(1, Ordering::SeqCst);
    }));
    let c_cleaned = cleaned.clone();
    sub.on_cancel(move || c_cleaned.store(true, Ordering::SeqCst));

    sub.finished().await;
    assert!(seen_clean.load(Ordering::SeqCst));
    assert_eq!(errors.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn no_callbacks_after_cancel() {
    let values = Arc::new(Mutex::new(vec![]));
    let completed = Arc::new(AtomicBool::new(false));
    let (c_values, c_completed) = (values.clone(), completed.clone());
    let sub = ticker().subscribe(
      Receiver::new()
        .on_next(move |v| c_values.lock().unwrap().push(v))
        .on_complete(move || c_completed.store(true, Ordering::SeqCst)),
    );

    tokio::time::sleep(Duration::from_millis(35)).await;
    sub.cancel();
    sub.cancel();
    let seen = values.lock().unwrap().len();
    assert!(seen > 0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    sub.finished().await;
    assert_eq!(values.lock().unwrap().len(), seen);
    assert!(!completed.load(Ordering::SeqCst));
  }

  #[tokio::test]
  async fn cleanups_chain_and_run_once() {
    let runs = Arc::new(AtomicUsize::new(0));
    let sub = never_ending().subscribe(|_: u8| {});
    let (r1, r2) = (runs.clone(), runs.clone());
    sub.on_cancel(move || {
      r1.fetch_add(1, Ordering::SeqCst);
    })
    .on_cancel(move || {
      r2.fetch_add(10, Ordering::SeqCst);
    });

    sub.cancel();
    sub.cancel();
    sub.finished().await;
    assert_eq!(runs.load(Ordering::SeqCst), 11);

    let r3 = runs.clone();
    sub.on_cancel(move || {
      r3.fetch_add(100, Ordering::SeqCst);
    });
    assert_eq!(runs.load(Ordering::SeqCst), 111);
  }

  #[tokio::test(start_paused = true)]
  async fn cancel_from_inside_on_next() {
    let values = Arc::new(Mutex::new(vec![]));
    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let (c_values, c_slot) = (values.clone(), slot.clone());
    let sub = ticker().subscribe(move |v: u32| {
      c_values.lock().unwrap().push(v);
      if v == 2 {
        if let Some(sub) = c_slot.lock().unwrap().as_ref() {
          sub.cancel();
        }
      }
    });
    *slot.lock().unwrap() = Some(sub.clone());

    sub.finished().await;
    assert_eq!(*values.lock().unwrap(), vec![0, 1, 2]);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn cancel_waits_for_a_running_callback() {
    let in_callback = Arc::new(AtomicBool::new(false));
    let calls = Arc::new(AtomicUsize::new(0));
    let entered = Arc::new(Notify::new());

    let (c_in, c_calls, c_entered) = (in_callback.clone(), calls.clone(), entered.clone());
    let sub = from_iter(0..).subscribe(move |_: u64| {
      c_in.store(true, Ordering::SeqCst);
      if c_calls.fetch_add(1, Ordering::SeqCst) == 0 {
        c_entered.notify_one();
      }
      std::thread::sleep(Duration::from_millis(5));
      c_in.store(false, Ordering::SeqCst);
    });

    entered.notified().await;
    sub.cancel();
    assert!(!in_callback.load(Ordering::SeqCst));
    let after_cancel = calls.load(Ordering::SeqCst);

    sub.finished().await;
    assert_eq!(calls.load(Ordering::SeqCst), after_cancel);
  }

  #[tokio::test]
  async fn guard_cancels_on_drop() {
    let sub = never_ending().subscribe(Receiver::<u8>::default());
    let handle = sub.clone();
    {
      let _guard = sub.cancel_when_dropped();
      assert!(!handle.is_closed());
    }
    assert!(handle.is_closed());
    handle.finished().await;
  }

  fn never_ending() -> impl Source<Item = u8> + Send + 'static {
    from_future(futures::future::pending::<Result<u8>>())
  }
}
