//! Consumer-side bridge from a [`Source`] into a `futures::Stream`.
//!
//! Values arrive as `Ok(value)`. A terminal error arrives once as
//! `Err(error)`, after which the stream ends; completion ends the stream.

use std::{
  pin::Pin,
  task::{ready, Context, Poll},
};

use futures::{stream::FusedStream, Stream};
use pin_project_lite::pin_project;

use super::Source;
use crate::error::Result;

pin_project! {
  /// Stream returned by [`SourceExt::into_stream`](super::SourceExt::into_stream).
  pub struct IntoStream<S> {
    #[pin]
    source: S,
    finished: bool,
  }
}

impl<S> IntoStream<S> {
  pub(crate) fn new(source: S) -> Self { IntoStream { source, finished: false } }
}

impl<S: Source> Stream for IntoStream<S> {
  type Item = Result<S::Item>;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    let this = self.project();
    if *this.finished {
      return Poll::Ready(None);
    }
    let signal = ready!(this.source.poll_pull(cx));
    if !matches!(signal, Some(Ok(_))) {
      *this.finished = true;
    }
    Poll::Ready(signal)
  }
}

impl<S: Source> FusedStream for IntoStream<S> {
  fn is_terminated(&self) -> bool { self.finished }
}

#[cfg(test)]
mod tests {
  use futures::StreamExt;

  use crate::{error::Error, prelude::*};

  #[tokio::test]
  async fn error_is_delivered_once() {
    let mut stream = throw_err::<i32>(Error::producer("x")).into_stream();
    assert!(matches!(stream.next().await, Some(Err(_))));
    assert!(stream.next().await.is_none());
    assert!(stream.next().await.is_none());
  }

  #[tokio::test]
  async fn values_then_end() {
    let stream = from_iter(vec!['a', 'b']).into_stream();
    let items: Vec<_> = stream.map(|item| item.unwrap()).collect().await;
    assert_eq!(items, vec!['a', 'b']);
  }
}
