use std::{
  pin::Pin,
  task::{ready, Context, Poll},
};

use futures::{channel::mpsc::UnboundedReceiver, StreamExt};

use crate::{
  error::Result,
  source::{replay_terminal, Source, Status},
};

pub(crate) type Detach = Box<dyn FnOnce() + Send>;

/// One consumer's cursor into a [`Broadcaster`](super::Broadcaster).
///
/// Values arrive through a dedicated single-producer queue filled by the
/// broadcaster's scheduled operations. Cancelling or dropping the reader
/// queues its detach; siblings are unaffected.
pub struct Reader<T> {
  rx: UnboundedReceiver<Result<T>>,
  status: Status,
  detach: Option<Detach>,
}

impl<T> Reader<T> {
  pub(crate) fn new(rx: UnboundedReceiver<Result<T>>, detach: Detach) -> Self {
    Reader { rx, status: Status::Live, detach: Some(detach) }
  }

  fn detach(&mut self) {
    if let Some(detach) = self.detach.take() {
      detach();
    }
  }
}

impl<T> Source for Reader<T> {
  type Item = T;

  fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<T>>> {
    let this = self.get_mut();
    replay_terminal!(this.status);
    match ready!(this.rx.poll_next_unpin(cx)) {
      Some(Ok(value)) => Poll::Ready(Some(Ok(value))),
      // The broadcaster already dropped this reader's sender.
      Some(Err(err)) => {
        this.detach = None;
        this.status.fail(err)
      }
      None => {
        this.detach = None;
        this.status.done()
      }
    }
  }

  fn cancel(self: Pin<&mut Self>) {
    let this = self.get_mut();
    this.status = Status::Done;
    this.rx.close();
    this.detach();
  }

  fn name(&self) -> &'static str { "broadcaster_reader" }
}

impl<T> Drop for Reader<T> {
  fn drop(&mut self) { self.detach() }
}

impl<T> std::fmt::Debug for Reader<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Reader").field("status", &self.status).finish()
  }
}

#[cfg(test)]
mod tests {
  use crate::prelude::*;

  #[tokio::test]
  async fn cancelled_reader_ends_and_detaches() {
    let scheduler = Scheduler::new();
    let broadcaster = Broadcaster::new(&scheduler);
    let mut reader = broadcaster.reader();
    broadcaster.push(1);
    assert_eq!(reader.pull().await.unwrap().unwrap(), 1);

    reader.stop();
    broadcaster.push(2);
    assert!(reader.pull().await.is_none());
    scheduler.flush().await;
    assert_eq!(broadcaster.reader_count(), 0);
  }

  #[tokio::test]
  async fn reader_waits_for_pushes() {
    let scheduler = Scheduler::new();
    let broadcaster = Broadcaster::new(&scheduler);
    let mut reader = broadcaster.reader();
    let producer = broadcaster.clone();
    tokio::spawn(async move {
      tokio::task::yield_now().await;
      producer.push("late");
    });
    assert_eq!(reader.pull().await.unwrap().unwrap(), "late");
  }
}
