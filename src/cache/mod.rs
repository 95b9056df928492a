//! Client-side cache for remote resources.
//!
//! This module provides a resource-agnostic store that:
//! - Keeps one timestamped entry per string key (last write wins)
//! - Serves entries until their TTL, flagging them stale past a shorter threshold
//! - Publishes invalidated keys to subscribers synchronously
//! - Guards against out-of-order fetch results with per-key generations
//! - Optionally persists entries to SQLite so they survive restarts

mod clock;
mod storage;
mod store;
mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use storage::{CacheStorage, NoopStorage, SqliteStorage};
pub use store::{CacheStore, Subscription};
pub use traits::{CacheEntry, CacheSettings, CacheStats, EntryInfo, FetchTicket, Freshness};
