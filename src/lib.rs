//! # rxflow: a pull-based reactive stream engine
//!
//! Sequences of values over time, composed through stages, shared through
//! broadcasters and consumed through subscriptions, on top of tokio.
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use rxflow::{ops::{filter, map}, prelude::*};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let scheduler = Scheduler::new();
//! let temperatures = Broadcaster::new(&scheduler);
//!
//! let alerts = Arc::new(Mutex::new(vec![]));
//! let c_alerts = alerts.clone();
//! let sub = Pipeline::new(temperatures.reader())
//!   .pipe(filter(|t: &i32| *t > 30))
//!   .pipe(map(|t: i32| format!("{t}°C")))
//!   .subscribe(move |alert: String| c_alerts.lock().unwrap().push(alert));
//!
//! for t in [21, 35, 28, 31] {
//!   temperatures.push(t);
//! }
//! temperatures.complete();
//! sub.finished().await;
//! assert_eq!(*alerts.lock().unwrap(), vec!["35°C", "31°C"]);
//! # }
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Source`] | Pull contract: next value, end of sequence or error |
//! | [`Broadcaster`] | Hot source shared by many readers, in one total order |
//! | [`Stage`] / [`Pipeline`] | Named transforms composed left to right |
//! | [`Scheduler`] | FIFO queue running one operation at a time |
//! | [`Subscription`] | Handle to a running pull loop, with idempotent cancel |
//!
//! ## Feature Flags
//!
//! - **`timer`** (default): time-based stages (`buffer_time`, `debounce`)
//!   and [`Scheduler::sleep`].
//!
//! [`Source`]: source::Source
//! [`Broadcaster`]: broadcaster::Broadcaster
//! [`Stage`]: stage::Stage
//! [`Pipeline`]: stage::Pipeline
//! [`Scheduler`]: scheduler::Scheduler
//! [`Scheduler::sleep`]: scheduler::Scheduler::sleep
//! [`Subscription`]: subscription::Subscription

pub mod broadcaster;
pub mod config;
pub mod error;
pub mod ops;
pub mod prelude;
pub mod receiver;
pub mod ref_count;
pub mod scheduler;
pub mod source;
pub mod stage;
pub mod subscription;

mod util;

pub use prelude::*;
