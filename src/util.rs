use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

/// Locks `mutex`, recovering the guard if a panicking holder poisoned it.
///
/// Every critical section in the crate leaves its state consistent before
/// running user code, so a poisoned lock still guards valid data.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Waits until `ready` holds, re-checking whenever `notify` wakes waiters.
///
/// The waiter is registered before the condition is checked so a
/// `notify_waiters` racing with the check is never lost.
pub(crate) async fn wait_until(notify: &Notify, ready: impl Fn() -> bool) {
  loop {
    let notified = notify.notified();
    tokio::pin!(notified);
    notified.as_mut().enable();
    if ready() {
      return;
    }
    notified.await;
  }
}

/// Renders a panic payload caught by `catch_unwind`.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
  if let Some(msg) = payload.downcast_ref::<&'static str>() {
    msg.to_string()
  } else if let Some(msg) = payload.downcast_ref::<String>() {
    msg.clone()
  } else {
    "non-string panic payload".to_string()
  }
}
