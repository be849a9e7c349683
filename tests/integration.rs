//! End-to-end behavior through the public API only.

use std::{
  sync::{Arc, Mutex},
  time::Duration,
};

use futures::TryStreamExt;
use rxflow::{
  ops::{buffer_time, debounce, map, merge_map, take},
  pipe,
  prelude::*,
};

fn recorder<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, Receiver<T>) {
  let seen = Arc::new(Mutex::new(vec![]));
  let c_seen = seen.clone();
  (seen, Receiver::new().on_next(move |v| c_seen.lock().unwrap().push(v)))
}

mod broadcaster {
  use super::*;

  #[tokio::test]
  async fn early_reader_receives_all_pushes_then_completes() {
    let scheduler = Scheduler::new();
    let broadcaster = Broadcaster::new(&scheduler);
    let reader = broadcaster.reader();
    broadcaster.push(1);
    broadcaster.push(2);
    broadcaster.push(3);
    broadcaster.complete();

    let values: Vec<i32> = reader.into_stream().try_collect().await.unwrap();
    assert_eq!(values, vec![1, 2, 3]);
  }

  #[tokio::test]
  async fn late_reader_on_plain_broadcaster_misses_history() {
    let scheduler = Scheduler::new();
    let broadcaster = Broadcaster::new(&scheduler);
    broadcaster.push(1);
    broadcaster.push(2);
    let (seen, receiver) = recorder();
    let sub = broadcaster.subscribe(receiver);
    broadcaster.push(3);
    broadcaster.complete();
    sub.finished().await;
    assert_eq!(*seen.lock().unwrap(), vec![3]);
  }

  #[tokio::test]
  async fn late_reader_on_behavior_starts_with_latest() {
    let scheduler = Scheduler::new();
    let broadcaster = Broadcaster::behavior(&scheduler, 0);
    broadcaster.push(1);
    broadcaster.push(2);
    let mut reader = broadcaster.reader();
    assert_eq!(reader.pull().await.unwrap().unwrap(), 2);
  }

  #[tokio::test]
  async fn late_reader_on_replay_drains_backlog_before_live_values() {
    let scheduler = Scheduler::new();
    let broadcaster = Broadcaster::replay(&scheduler, 2);
    for v in [1, 2, 3] {
      broadcaster.push(v);
    }
    let reader = broadcaster.reader();
    broadcaster.push(4);
    broadcaster.complete();
    let values: Vec<i32> = reader.into_stream().try_collect().await.unwrap();
    assert_eq!(values, vec![2, 3, 4]);
  }

  #[tokio::test]
  async fn reader_after_termination_gets_only_the_terminal_signal() {
    let scheduler = Scheduler::new();
    let broadcaster = Broadcaster::replay_unbounded(&scheduler);
    broadcaster.push(1);
    broadcaster.error(Error::producer("sensor lost"));
    broadcaster.push(2);

    let outcome: Result<Vec<i32>> = broadcaster.reader().into_stream().try_collect().await;
    assert_eq!(outcome.unwrap_err().as_label(), "producer");
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn concurrent_producers_yield_one_order_for_all_readers() {
    let scheduler = Scheduler::with_config(SchedulerConfig::default().name("ordering"));
    let broadcaster = Broadcaster::new(&scheduler);
    let mut seen = vec![];
    let mut subs = vec![];
    for (values, receiver) in (0..4).map(|_| recorder::<u32>()) {
      seen.push(values);
      subs.push(broadcaster.subscribe(receiver));
    }

    let producers: Vec<_> = (0..4u32)
      .map(|p| {
        let broadcaster = broadcaster.clone();
        tokio::spawn(async move {
          for i in 0..50 {
            broadcaster.push(p * 1000 + i);
            tokio::task::yield_now().await;
          }
        })
      })
      .collect();
    for producer in producers {
      producer.await.unwrap();
    }
    broadcaster.complete();
    for sub in subs {
      sub.finished().await;
    }

    let first = seen[0].lock().unwrap().clone();
    assert_eq!(first.len(), 200);
    for other in &seen[1..] {
      assert_eq!(*other.lock().unwrap(), first);
    }
  }
}

mod stages {
  use super::*;

  #[tokio::test(start_paused = true)]
  async fn merge_map_delivers_by_arrival_not_origin_order() {
    let slow_for_one = |v: i32| {
      from_future(async move {
        let delay = if v == 1 { 80 } else { 20 };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(v * 100)
      })
    };
    let values: Vec<i32> =
      pipe!(from_iter([1, 2]), merge_map(slow_for_one)).into_stream().try_collect().await.unwrap();
    assert_eq!(values, vec![200, 100]);
  }

  #[tokio::test(start_paused = true)]
  async fn cancelled_windowing_stage_never_fires_its_timer() {
    let scheduler = Scheduler::new();
    let broadcaster = Broadcaster::new(&scheduler);
    let (seen, receiver) = recorder::<Vec<i32>>();
    let sub = Pipeline::new(broadcaster.reader())
      .pipe(buffer_time(Duration::from_millis(100), &scheduler))
      .subscribe(receiver);

    broadcaster.push(1);
    broadcaster.push(2);
    tokio::time::sleep(Duration::from_millis(40)).await;
    sub.cancel();
    sub.finished().await;

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(seen.lock().unwrap().is_empty());
    scheduler.flush().await;
    assert_eq!(broadcaster.reader_count(), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn cancelled_debounce_drops_its_pending_value() {
    let scheduler = Scheduler::new();
    let broadcaster = Broadcaster::new(&scheduler);
    let (seen, receiver) = recorder::<i32>();
    let sub = broadcaster.reader().pipe(debounce(Duration::from_millis(50), &scheduler)).subscribe(receiver);

    broadcaster.push(1);
    tokio::time::sleep(Duration::from_millis(10)).await;
    sub.cancel();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(seen.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn cancellation_reaches_the_origin() {
    let scheduler = Scheduler::new();
    let broadcaster = Broadcaster::new(&scheduler);
    let (seen, receiver) = recorder::<String>();
    let sub = pipe!(broadcaster.reader(), map(|v: i32| v.to_string()), take(2)).subscribe(receiver);

    for v in 0..5 {
      broadcaster.push(v);
    }
    sub.finished().await;
    scheduler.flush().await;

    assert_eq!(*seen.lock().unwrap(), vec!["0", "1"]);
    assert_eq!(broadcaster.reader_count(), 0);
  }
}

mod scheduler {
  use super::*;

  #[tokio::test]
  async fn failures_stay_with_their_operation() {
    let scheduler = Scheduler::new();
    let log = Arc::new(Mutex::new(vec![]));

    let c_log = log.clone();
    let first = scheduler.enqueue(move || async move {
      c_log.lock().unwrap().push("first");
      Err::<(), _>(Error::operation("disk full"))
    });
    let c_log = log.clone();
    let second = scheduler.enqueue_fn(move || {
      c_log.lock().unwrap().push("second");
      Ok(())
    });

    assert!(first.await.is_err());
    assert!(second.await.is_ok());
    scheduler.flush().await;
    assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
  }
}

mod ref_count {
  use super::*;

  #[tokio::test(start_paused = true)]
  async fn one_producer_regardless_of_subscriber_count() {
    let starts = Arc::new(Mutex::new(0));
    let c_starts = starts.clone();
    let scheduler = Scheduler::new();
    let shared = RefCount::new(&scheduler, move || {
      let starts = c_starts.clone();
      create(move |emitter: Emitter<u64>| async move {
        *starts.lock().unwrap() += 1;
        let mut tick = 0;
        while emitter.next(tick) {
          tick += 1;
          tokio::time::sleep(Duration::from_millis(10)).await;
        }
      })
    });

    let subs: Vec<_> = (0..3).map(|_| shared.subscribe(|_: u64| {})).collect();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*starts.lock().unwrap(), 1);
    assert_eq!(shared.subscriber_count(), 3);

    for sub in &subs {
      sub.cancel();
    }
    assert!(!shared.is_producing());
  }
}
