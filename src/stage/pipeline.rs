use std::sync::Arc;

use super::{Instrument, Stage, TapPoint, Tapped};
use crate::{
  receiver::Receiver,
  source::{Source, SourceExt},
  subscription::Subscription,
};

/// An origin source with stages attached in order.
///
/// The origin, each stage output and the final output pass through a
/// [`Tapped`] wrapper so an optional [`Instrument`] can observe them.
pub struct Pipeline<S> {
  source: S,
  instrument: Option<Arc<dyn Instrument>>,
  stages: usize,
}

impl<O: Source> Pipeline<Tapped<O>> {
  pub fn new(origin: O) -> Self { Self::with_instrument(origin, None) }

  /// A pipeline that reports every signal to `instrument`.
  pub fn instrumented(origin: O, instrument: Arc<dyn Instrument>) -> Self {
    Self::with_instrument(origin, Some(instrument))
  }

  fn with_instrument(origin: O, instrument: Option<Arc<dyn Instrument>>) -> Self {
    Pipeline { source: Tapped::new(origin, TapPoint::Origin, instrument.clone()), instrument, stages: 0 }
  }
}

impl<S: Source> Pipeline<S> {
  /// Attaches `stage` to the current output.
  pub fn pipe<St: Stage<S>>(self, stage: St) -> Pipeline<Tapped<St::Output>> {
    let point = TapPoint::Stage { index: self.stages, name: stage.name() };
    let output = stage.apply(self.source);
    Pipeline {
      source: Tapped::new(output, point, self.instrument.clone()),
      instrument: self.instrument,
      stages: self.stages + 1,
    }
  }

  /// Number of stages attached so far.
  pub fn len(&self) -> usize { self.stages }

  pub fn is_empty(&self) -> bool { self.stages == 0 }

  /// The consumer-facing source.
  pub fn build(self) -> Tapped<S> { Tapped::new(self.source, TapPoint::Output, self.instrument) }

  pub fn subscribe(self, receiver: impl Into<Receiver<S::Item>>) -> Subscription
  where
    S: Send + 'static,
    S::Item: Send + 'static,
  {
    self.build().subscribe(receiver)
  }
}

impl<S> std::fmt::Debug for Pipeline<S> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Pipeline")
      .field("stages", &self.stages)
      .field("instrumented", &self.instrument.is_some())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use futures::TryStreamExt;

  use super::*;
  use crate::{
    ops::{map, take, try_map},
    prelude::*,
    stage::TapEvent,
  };

  #[derive(Default)]
  struct Recorder(Mutex<Vec<String>>);

  impl Instrument for Recorder {
    fn observe(&self, point: &TapPoint, event: TapEvent<'_>) {
      let event = match event {
        TapEvent::Value => "value".to_string(),
        TapEvent::Error(err) => format!("error:{}", err.as_label()),
        TapEvent::Done => "done".to_string(),
        TapEvent::Cancel => "cancel".to_string(),
      };
      self.0.lock().unwrap().push(format!("{point} {event}"));
    }
  }

  #[tokio::test]
  async fn instrumentation_is_transparent() {
    let plain: Vec<i32> = Pipeline::new(from_iter(1..=3))
      .pipe(map(|v: i32| v * 2))
      .build()
      .into_stream()
      .try_collect()
      .await
      .unwrap();

    let recorder = Arc::new(Recorder::default());
    let tapped: Vec<i32> = Pipeline::instrumented(from_iter(1..=3), recorder.clone())
      .pipe(map(|v: i32| v * 2))
      .build()
      .into_stream()
      .try_collect()
      .await
      .unwrap();

    assert_eq!(plain, tapped);
    let log = recorder.0.lock().unwrap();
    assert_eq!(log.iter().filter(|l| l.as_str() == "origin value").count(), 3);
    assert_eq!(log.iter().filter(|l| l.as_str() == "stage#0(map) value").count(), 3);
    assert_eq!(log.last().map(String::as_str), Some("output done"));
  }

  #[tokio::test]
  async fn errors_and_cancellation_are_reported() {
    let recorder = Arc::new(Recorder::default());
    let mut failing = Pipeline::instrumented(of(0), recorder.clone())
      .pipe(try_map(|_: i32| -> std::result::Result<i32, &'static str> { Err("no") }))
      .build();
    assert!(failing.pull().await.unwrap().is_err());
    assert!(failing.pull().await.unwrap().is_err());
    assert_eq!(
      recorder.0.lock().unwrap().iter().filter(|l| l.ends_with("error:stage")).count(),
      2,
      "one report per tap point after try_map"
    );

    let recorder = Arc::new(Recorder::default());
    let pipeline = Pipeline::instrumented(from_iter(0..), recorder.clone()).pipe(take(10));
    assert_eq!(pipeline.len(), 1);
    let mut source = pipeline.build();
    assert_eq!(source.pull().await.unwrap().unwrap(), 0);
    source.stop();
    assert_eq!(recorder.0.lock().unwrap().last().map(String::as_str), Some("origin cancel"));
  }

  #[tokio::test]
  async fn subscribe_runs_the_pipeline() {
    let seen = Arc::new(Mutex::new(vec![]));
    let c_seen = seen.clone();
    let sub = Pipeline::new(from_iter(vec!["a", "b"]))
      .pipe(map(str::to_uppercase))
      .subscribe(move |v: String| c_seen.lock().unwrap().push(v));
    sub.finished().await;
    assert_eq!(*seen.lock().unwrap(), vec!["A", "B"]);
  }
}
