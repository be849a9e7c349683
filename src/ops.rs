//! Stage catalog and multi-source combinators.
//!
//! | Category              | Stages                                              |
//! |-----------------------|-----------------------------------------------------|
//! | 1:1 transform         | [`map`], [`try_map`]                                |
//! | Filtering             | [`filter`], [`take`]                                |
//! | Windowing/collapsing  | [`buffer_count`], `buffer_time`, `debounce`         |
//! | Expansion             | [`merge_map`], [`concat_map`], [`switch_map`], [`exhaust_map`] |
//! | Multi-source          | [`race`], [`zip`], [`fork_join`]                    |
//!
//! Windowing stages flush pending state once when upstream completes and
//! drop it when upstream fails, forwarding the error immediately.

pub mod buffer_count;
#[cfg(feature = "timer")]
pub mod buffer_time;
#[cfg(feature = "timer")]
pub mod debounce;
pub mod filter;
pub mod flatten;
pub mod fork_join;
pub mod map;
pub mod race;
pub mod take;
pub mod zip;

pub use buffer_count::{buffer_count, BufferCount, BufferCountOp};
#[cfg(feature = "timer")]
pub use buffer_time::{buffer_time, BufferTime, BufferTimeOp};
#[cfg(feature = "timer")]
pub use debounce::{debounce, Debounce, DebounceOp};
pub use filter::{filter, Filter, FilterOp};
pub use flatten::{
  concat_map, exhaust_map, merge_map, merge_map_with_limit, switch_map, FlatMap, FlatMapOp, Policy,
};
pub use fork_join::{fork_join, ForkJoin};
pub use map::{map, try_map, Map, MapOp, TryMap, TryMapOp};
pub use race::{race, Race};
pub use take::{take, Take, TakeOp};
pub use zip::{zip, Zip};
