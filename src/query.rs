//! Cache-aware query binding for views.
//!
//! Inspired by TanStack Query, a `Query<T>` ties one fetch function and one
//! cache key to the lifetime of the view that owns it. It serves cached data
//! immediately, revalidates stale data in the background, refetches when the
//! key is invalidated, and optionally polls.
//!
//! # Example
//!
//! ```ignore
//! let api = api.clone();
//! let mut query = Query::mount(
//!     store.clone(),
//!     "jobs_list_1_all",
//!     move || {
//!         let api = api.clone();
//!         async move { api.get_jobs(1, &JobFilters::default()).await }
//!     },
//!     QueryOptions::default().refetch_interval(Duration::minutes(10)),
//! );
//!
//! // In the view's tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//!
//! // In render
//! match query.status() {
//!     QueryStatus::Loading => render_spinner(),
//!     QueryStatus::Error => render_error(query.error()),
//!     _ => render_data(query.data()),
//! }
//! ```
//!
//! All timers are deadlines on the store's clock and fire from `poll()`, so
//! the owning view must call it on every tick.

use chrono::{DateTime, Duration, Utc};
use color_eyre::Result;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::cache::{CacheStore, Freshness, Subscription};

/// Default period, in seconds, for recomputing the stale flag.
pub const DEFAULT_STALE_CHECK_SECS: i64 = 30;

/// A factory function that creates futures for fetching data
type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;

type SuccessFn<T> = Arc<dyn Fn(&T) + Send + Sync>;
type ErrorFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Configuration for a [`Query`].
pub struct QueryOptions<T> {
  /// Gate for all activity: no fetch, timer or subscription while false
  pub enabled: bool,
  /// Period of the cache-first polling fetch
  pub refetch_interval: Option<Duration>,
  /// Skip the cache on the first activation
  pub force_refresh_on_mount: bool,
  /// TTL override for values this query writes
  pub ttl: Option<Duration>,
  /// Period of the display-only stale check
  pub stale_check_interval: Duration,
  on_success: Option<SuccessFn<T>>,
  on_error: Option<ErrorFn>,
}

impl<T> Default for QueryOptions<T> {
  fn default() -> Self {
    Self {
      enabled: true,
      refetch_interval: None,
      force_refresh_on_mount: false,
      ttl: None,
      stale_check_interval: Duration::seconds(DEFAULT_STALE_CHECK_SECS),
      on_success: None,
      on_error: None,
    }
  }
}

impl<T> QueryOptions<T> {
  #[allow(dead_code)]
  pub fn enabled(mut self, enabled: bool) -> Self {
    self.enabled = enabled;
    self
  }

  pub fn refetch_interval(mut self, interval: Duration) -> Self {
    self.refetch_interval = Some(interval);
    self
  }

  pub fn force_refresh_on_mount(mut self) -> Self {
    self.force_refresh_on_mount = true;
    self
  }

  #[allow(dead_code)]
  pub fn ttl(mut self, ttl: Duration) -> Self {
    self.ttl = Some(ttl);
    self
  }

  pub fn stale_check_interval(mut self, interval: Duration) -> Self {
    self.stale_check_interval = interval;
    self
  }

  #[allow(dead_code)]
  pub fn on_success<F>(mut self, f: F) -> Self
  where
    F: Fn(&T) + Send + Sync + 'static,
  {
    self.on_success = Some(Arc::new(f));
    self
  }

  #[allow(dead_code)]
  pub fn on_error<F>(mut self, f: F) -> Self
  where
    F: Fn(&str) + Send + Sync + 'static,
  {
    self.on_error = Some(Arc::new(f));
    self
  }
}

/// Summary of a query for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
  /// Disabled, or nothing requested yet
  Idle,
  /// No data yet, fetch in flight
  Loading,
  /// No data, last fetch failed
  Error,
  /// Data shown, forced refresh in flight
  Refreshing,
  /// Data shown, past the staleness threshold
  Stale,
  /// Data shown
  Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchMode {
  /// Nothing to show yet
  Blocking,
  /// Bypasses the cache (refresh, invalidation, forced mount)
  Forced,
  /// Revalidates data that is already shown
  Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
  Disabled,
  Active,
  Unmounted,
}

/// A fetch that finished, tagged with the generation it started at.
struct Settled<T> {
  generation: u64,
  mode: FetchMode,
  result: std::result::Result<T, String>,
}

/// Cache-aware async query with per-view lifecycle.
///
/// Query<T> encapsulates:
/// - The fetching logic (via a closure) and the cache key it fills
/// - data / loading / error / last_updated / stale state for one view
/// - The invalidation subscription and polling deadlines of that view
/// - A generation counter so only the latest started fetch updates state
pub struct Query<T> {
  store: CacheStore,
  key: String,
  fetcher: FetcherFn<T>,
  options: QueryOptions<T>,
  phase: Phase,

  data: Option<T>,
  loading: bool,
  error: Option<String>,
  last_updated: Option<DateTime<Utc>>,
  stale: bool,

  generation: u64,
  pending: Option<u64>,
  results_tx: mpsc::UnboundedSender<Settled<T>>,
  results: mpsc::UnboundedReceiver<Settled<T>>,

  invalidations: Option<mpsc::UnboundedReceiver<()>>,
  subscription: Option<Subscription>,
  next_poll_at: Option<DateTime<Utc>>,
  next_stale_check_at: Option<DateTime<Utc>>,
}

impl<T> Query<T>
where
  T: Clone + Serialize + DeserializeOwned + Send + 'static,
{
  /// Create the query and, if enabled, activate it.
  ///
  /// The fetcher is called each time a fetch is needed; it must capture
  /// every parameter that shapes the result, and `key` must identify
  /// exactly that result.
  pub fn mount<F, Fut>(
    store: CacheStore,
    key: impl Into<String>,
    fetcher: F,
    options: QueryOptions<T>,
  ) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let (results_tx, results) = mpsc::unbounded_channel();
    let enabled = options.enabled;

    let mut query = Self {
      store,
      key: key.into(),
      fetcher: Box::new(move || fetcher().boxed()),
      options,
      phase: Phase::Disabled,
      data: None,
      loading: false,
      error: None,
      last_updated: None,
      stale: false,
      generation: 0,
      pending: None,
      results_tx,
      results,
      invalidations: None,
      subscription: None,
      next_poll_at: None,
      next_stale_check_at: None,
    };

    if enabled {
      query.activate(query.options.force_refresh_on_mount);
    }
    query
  }

  #[allow(dead_code)]
  pub fn key(&self) -> &str {
    &self.key
  }

  pub fn data(&self) -> Option<&T> {
    self.data.as_ref()
  }

  pub fn is_loading(&self) -> bool {
    self.loading
  }

  /// Message of the last failed foreground fetch, cleared on success.
  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  pub fn last_updated(&self) -> Option<DateTime<Utc>> {
    self.last_updated
  }

  #[allow(dead_code)]
  pub fn is_stale(&self) -> bool {
    self.stale
  }

  #[allow(dead_code)]
  pub fn refetch_interval(&self) -> Option<Duration> {
    self.options.refetch_interval
  }

  #[allow(dead_code)]
  pub fn is_enabled(&self) -> bool {
    self.phase == Phase::Active
  }

  #[allow(dead_code)]
  pub fn is_mounted(&self) -> bool {
    self.phase != Phase::Unmounted
  }

  #[allow(dead_code)]
  pub fn is_fetching(&self) -> bool {
    self.pending.is_some()
  }

  #[allow(dead_code)]
  pub fn is_subscribed(&self) -> bool {
    self.subscription.is_some()
  }

  /// Number of scheduled timers (polling and stale check).
  #[allow(dead_code)]
  pub fn active_timers(&self) -> usize {
    usize::from(self.next_poll_at.is_some()) + usize::from(self.next_stale_check_at.is_some())
  }

  pub fn status(&self) -> QueryStatus {
    match (&self.data, self.loading) {
      (None, true) => QueryStatus::Loading,
      (None, false) if self.error.is_some() => QueryStatus::Error,
      (None, false) => QueryStatus::Idle,
      (Some(_), true) => QueryStatus::Refreshing,
      (Some(_), false) if self.stale => QueryStatus::Stale,
      (Some(_), false) => QueryStatus::Ready,
    }
  }

  /// Turn all activity on or off.
  ///
  /// Enabling runs the mount-time cache check again; disabling cancels
  /// timers and the subscription and ignores fetches still in flight.
  #[allow(dead_code)]
  pub fn set_enabled(&mut self, enabled: bool) {
    match (self.phase, enabled) {
      (Phase::Disabled, true) => self.activate(self.options.force_refresh_on_mount),
      (Phase::Active, false) => {
        debug!(key = %self.key, "Query disabled");
        self.release();
        self.phase = Phase::Disabled;
        // Results of fetches started before now are ignored
        self.generation += 1;
        self.pending = None;
        self.loading = false;
      }
      _ => {}
    }
  }

  /// Force a refetch without waiting for it.
  pub fn refetch(&mut self) {
    if self.phase == Phase::Active {
      self.start_fetch(FetchMode::Forced);
    }
  }

  /// Force a refetch and wait until it settles.
  ///
  /// State is up to date when this returns; check [`error`](Self::error)
  /// to see whether it failed. No-op unless the query is active.
  #[allow(dead_code)]
  pub async fn refresh(&mut self) {
    if self.phase != Phase::Active {
      return;
    }

    let generation = self.start_fetch(FetchMode::Forced);
    while let Some(settled) = self.results.recv().await {
      let done = settled.generation == generation;
      self.apply(settled);
      if done {
        break;
      }
    }
  }

  /// Process invalidations, settled fetches and due timers.
  ///
  /// Returns `true` if the state changed.
  /// Call this in your event loop tick handler.
  pub fn poll(&mut self) -> bool {
    if self.phase != Phase::Active {
      return false;
    }
    let mut changed = false;

    let mut invalidated = false;
    if let Some(rx) = &mut self.invalidations {
      while rx.try_recv().is_ok() {
        invalidated = true;
      }
    }
    if invalidated {
      debug!(key = %self.key, "Key invalidated, refetching");
      self.start_fetch(FetchMode::Forced);
      changed = true;
    }

    while let Ok(settled) = self.results.try_recv() {
      changed |= self.apply(settled);
    }

    let now = self.store.now();

    if let (Some(due), Some(interval)) = (self.next_poll_at, self.options.refetch_interval) {
      if due <= now {
        self.next_poll_at = Some(now + interval);
        changed |= self.load_cache_first();
      }
    }

    if let Some(due) = self.next_stale_check_at {
      if due <= now {
        self.next_stale_check_at = Some(now + self.options.stale_check_interval);
        // An entry that expired under shown data still reads as stale
        let stale = self.data.is_some()
          && self
            .store
            .entry_info(&self.key)
            .map_or(true, |info| info.freshness != Freshness::Fresh);
        if stale != self.stale {
          self.stale = stale;
          changed = true;
        }
      }
    }

    changed
  }

  /// Tear down for good: timers cleared, subscription dropped, nothing
  /// delivered afterwards. Fetches in flight may still fill the cache.
  pub fn unmount(&mut self) {
    if self.phase == Phase::Unmounted {
      return;
    }
    debug!(key = %self.key, "Query unmounted");
    self.release();
    self.phase = Phase::Unmounted;
    self.pending = None;
    self.results.close();
  }

  fn activate(&mut self, force: bool) {
    debug!(key = %self.key, force, "Query mounted");
    self.phase = Phase::Active;
    self.subscribe();

    let now = self.store.now();
    self.next_stale_check_at = Some(now + self.options.stale_check_interval);
    self.next_poll_at = self
      .options
      .refetch_interval
      .filter(|interval| *interval > Duration::zero())
      .map(|interval| now + interval);

    if force {
      self.start_fetch(FetchMode::Forced);
    } else {
      self.load_cache_first();
    }
  }

  fn subscribe(&mut self) {
    let (tx, rx) = mpsc::unbounded_channel();
    let key = self.key.clone();
    self.subscription = Some(self.store.on_invalidate(move |invalidated| {
      if invalidated == key {
        let _ = tx.send(());
      }
    }));
    self.invalidations = Some(rx);
  }

  fn release(&mut self) {
    self.subscription = None;
    self.invalidations = None;
    self.next_poll_at = None;
    self.next_stale_check_at = None;
  }

  /// Serve from cache when possible, revalidating stale data; fetch when
  /// nothing usable is cached. Returns `true` if the state changed.
  fn load_cache_first(&mut self) -> bool {
    match self.store.get::<T>(&self.key) {
      Some(value) => {
        let stale = self.store.is_stale(&self.key);
        debug!(key = %self.key, stale, "Serving cached value");
        self.data = Some(value);
        // Age of the cached copy, not the time it was read
        self.last_updated = self
          .store
          .entry_info(&self.key)
          .map(|info| info.stored_at)
          .or_else(|| Some(self.store.now()));
        self.stale = stale;
        if self.pending.is_none() {
          self.loading = false;
          if stale {
            self.start_fetch(FetchMode::Background);
          }
        }
        true
      }
      None if self.pending.is_none() => {
        self.start_fetch(FetchMode::Blocking);
        true
      }
      None => false,
    }
  }

  /// Spawn the fetcher. Returns the generation of the new fetch.
  fn start_fetch(&mut self, mode: FetchMode) -> u64 {
    self.generation += 1;
    let generation = self.generation;
    self.pending = Some(generation);
    if mode != FetchMode::Background {
      self.loading = true;
    }
    debug!(key = %self.key, generation, ?mode, "Starting fetch");

    let store = self.store.clone();
    let ticket = store.begin_fetch(&self.key);
    let ttl = self.options.ttl;
    let tx = self.results_tx.clone();
    let future = (self.fetcher)();

    tokio::spawn(async move {
      let result = match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(value)) => {
          store.complete_fetch(&ticket, &value, ttl);
          Ok(value)
        }
        Ok(Err(e)) => Err(format!("{:#}", e)),
        Err(_) => Err("Fetch panicked".to_string()),
      };
      // Ignore send errors - the query may have been unmounted
      let _ = tx.send(Settled {
        generation,
        mode,
        result,
      });
    });

    generation
  }

  /// Apply a settled fetch if it is still the latest one.
  fn apply(&mut self, settled: Settled<T>) -> bool {
    if settled.generation != self.generation {
      debug!(
        key = %self.key,
        generation = settled.generation,
        latest = self.generation,
        "Ignoring superseded fetch result"
      );
      return false;
    }
    self.pending = None;
    self.loading = false;

    match settled.result {
      Ok(value) => {
        if let Some(on_success) = &self.options.on_success {
          on_success(&value);
        }
        self.data = Some(value);
        self.error = None;
        self.last_updated = Some(self.store.now());
        self.stale = false;
      }
      Err(e) if settled.mode == FetchMode::Background => {
        warn!(key = %self.key, error = %e, "Background refresh failed, keeping cached data");
      }
      Err(e) => {
        warn!(key = %self.key, error = %e, "Fetch failed");
        if let Some(on_error) = &self.options.on_error {
          on_error(&e);
        }
        self.error = Some(e);
      }
    }
    true
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("key", &self.key)
      .field("phase", &self.phase)
      .field("data", &self.data)
      .field("loading", &self.loading)
      .field("error", &self.error)
      .field("stale", &self.stale)
      .field("generation", &self.generation)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheSettings, ManualClock, NoopStorage};
  use color_eyre::eyre::eyre;
  use std::collections::VecDeque;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Mutex;
  use std::time::Duration as StdDuration;
  use tokio::sync::oneshot;

  const KEY: &str = "jobs_list_1_all";

  fn store() -> (CacheStore, ManualClock) {
    let clock = ManualClock::default();
    let store = CacheStore::with_parts(
      CacheSettings::default(),
      Arc::new(clock.clone()),
      Arc::new(NoopStorage),
    );
    (store, clock)
  }

  /// Fetcher returning `value` and counting calls.
  fn counting(
    value: &str,
  ) -> (
    Arc<AtomicU32>,
    impl Fn() -> BoxFuture<'static, Result<String>> + Send + Sync + 'static,
  ) {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let value = value.to_string();
    let fetcher = move || {
      let counter = Arc::clone(&counter);
      let value = value.clone();
      async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(value)
      }
      .boxed()
    };
    (calls, fetcher)
  }

  fn failing() -> impl Fn() -> BoxFuture<'static, Result<String>> + Send + Sync + 'static {
    || async { Err(eyre!("service unavailable")) }.boxed()
  }

  async fn settle(query: &mut Query<String>) -> bool {
    tokio::time::sleep(StdDuration::from_millis(10)).await;
    query.poll()
  }

  #[tokio::test]
  async fn test_disabled_query_does_nothing() {
    let (store, clock) = store();
    let (calls, fetcher) = counting("jobs");

    let mut query = Query::mount(
      store.clone(),
      KEY,
      fetcher,
      QueryOptions::default()
        .enabled(false)
        .refetch_interval(Duration::minutes(1)),
    );

    clock.advance(Duration::minutes(5));
    assert!(!settle(&mut query).await);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(query.active_timers(), 0);
    assert!(!query.is_subscribed());
    assert_eq!(store.stats().listeners, 0);
    assert_eq!(query.status(), QueryStatus::Idle);
  }

  #[tokio::test]
  async fn test_cold_start_blocks_then_fills_cache() {
    let (store, _) = store();
    let (calls, fetcher) = counting("jobs");

    let mut query = Query::mount(store.clone(), KEY, fetcher, QueryOptions::default());
    assert!(query.is_loading());
    assert_eq!(query.status(), QueryStatus::Loading);

    assert!(settle(&mut query).await);
    assert!(!query.is_loading());
    assert_eq!(query.data().map(String::as_str), Some("jobs"));
    assert!(query.last_updated().is_some());
    assert_eq!(store.get::<String>(KEY).as_deref(), Some("jobs"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_fresh_cache_is_served_without_fetch() {
    let (store, _) = store();
    store.set(KEY, &"cached".to_string(), None);
    let (calls, fetcher) = counting("network");

    let mut query = Query::mount(store, KEY, fetcher, QueryOptions::default());

    assert_eq!(query.data().map(String::as_str), Some("cached"));
    assert!(!query.is_loading());
    settle(&mut query).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(query.status(), QueryStatus::Ready);
  }

  #[tokio::test]
  async fn test_stale_cache_is_served_and_revalidated_once() {
    let (store, clock) = store();
    store.set(KEY, &"cached".to_string(), None);
    clock.advance(Duration::minutes(7));
    let (calls, fetcher) = counting("network");

    let mut query = Query::mount(store.clone(), KEY, fetcher, QueryOptions::default());

    assert_eq!(query.data().map(String::as_str), Some("cached"));
    assert!(!query.is_loading());
    assert!(query.is_stale());
    assert_eq!(query.status(), QueryStatus::Stale);

    assert!(settle(&mut query).await);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(query.data().map(String::as_str), Some("network"));
    assert!(!query.is_stale());
    assert!(!store.is_stale(KEY));
  }

  #[tokio::test]
  async fn test_force_refresh_on_mount_skips_cache() {
    let (store, _) = store();
    store.set(KEY, &"cached".to_string(), None);
    let (calls, fetcher) = counting("network");

    let mut query = Query::mount(
      store,
      KEY,
      fetcher,
      QueryOptions::default().force_refresh_on_mount(),
    );
    assert!(query.is_loading());

    settle(&mut query).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(query.data().map(String::as_str), Some("network"));
  }

  #[tokio::test]
  async fn test_refresh_always_fetches_and_waits() {
    let (store, _) = store();
    store.set(KEY, &"cached".to_string(), None);
    let (calls, fetcher) = counting("network");
    let mut query = Query::mount(store, KEY, fetcher, QueryOptions::default());

    query.refresh().await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(query.data().map(String::as_str), Some("network"));
    assert!(!query.is_loading());
  }

  #[tokio::test]
  async fn test_failed_refresh_keeps_data_and_reports_error() {
    let (store, _) = store();
    store.set(KEY, &"cached".to_string(), None);
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);

    let mut query = Query::mount(
      store,
      KEY,
      failing(),
      QueryOptions::default().on_error(move |e| sink.lock().unwrap().push(e.to_string())),
    );
    query.refresh().await;

    assert_eq!(query.data().map(String::as_str), Some("cached"));
    assert_eq!(query.error(), Some("service unavailable"));
    assert_eq!(*errors.lock().unwrap(), vec!["service unavailable".to_string()]);
  }

  #[tokio::test]
  async fn test_cold_start_failure_shows_error() {
    let (store, _) = store();
    let mut query = Query::mount(store, KEY, failing(), QueryOptions::default());

    settle(&mut query).await;
    assert_eq!(query.status(), QueryStatus::Error);
    assert!(query.data().is_none());
  }

  #[tokio::test]
  async fn test_background_failure_is_not_surfaced() {
    let (store, clock) = store();
    store.set(KEY, &"cached".to_string(), None);
    clock.advance(Duration::minutes(7));
    let errors = Arc::new(AtomicU32::new(0));
    let count = Arc::clone(&errors);

    let mut query = Query::mount(
      store,
      KEY,
      failing(),
      QueryOptions::default().on_error(move |_| {
        count.fetch_add(1, Ordering::SeqCst);
      }),
    );
    settle(&mut query).await;

    assert_eq!(query.data().map(String::as_str), Some("cached"));
    assert_eq!(query.error(), None);
    assert_eq!(errors.load(Ordering::SeqCst), 0);
    assert!(!query.is_fetching());
  }

  #[tokio::test]
  async fn test_success_clears_error_and_calls_back() {
    let (store, _) = store();
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);
    let successes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&successes);

    let mut query = Query::mount(
      store,
      KEY,
      move || {
        let attempt = counter.fetch_add(1, Ordering::SeqCst);
        async move {
          if attempt == 0 {
            Err(eyre!("timeout"))
          } else {
            Ok("jobs".to_string())
          }
        }
      },
      QueryOptions::default().on_success(move |v: &String| sink.lock().unwrap().push(v.clone())),
    );
    settle(&mut query).await;
    assert_eq!(query.error(), Some("timeout"));

    query.refresh().await;
    assert_eq!(query.error(), None);
    assert_eq!(*successes.lock().unwrap(), vec!["jobs".to_string()]);
  }

  #[tokio::test]
  async fn test_invalidation_forces_refetch() {
    let (store, _) = store();
    store.set(KEY, &"cached".to_string(), None);
    let (calls, fetcher) = counting("network");
    let mut query = Query::mount(store.clone(), KEY, fetcher, QueryOptions::default());

    store.invalidate(KEY);
    assert!(query.poll());
    assert!(query.is_loading());
    assert_eq!(query.status(), QueryStatus::Refreshing);

    settle(&mut query).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(query.data().map(String::as_str), Some("network"));
    assert_eq!(store.get::<String>(KEY).as_deref(), Some("network"));
  }

  #[tokio::test]
  async fn test_other_keys_are_ignored() {
    let (store, _) = store();
    store.set(KEY, &"cached".to_string(), None);
    let (calls, fetcher) = counting("network");
    let mut query = Query::mount(store.clone(), KEY, fetcher, QueryOptions::default());

    store.invalidate("user_profile_1");
    assert!(!settle(&mut query).await);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_polling_revalidates_on_interval() {
    let clock = ManualClock::default();
    let settings = CacheSettings::new(Duration::minutes(2), Duration::seconds(30)).unwrap();
    let store = CacheStore::with_parts(settings, Arc::new(clock.clone()), Arc::new(NoopStorage));
    store.set(KEY, &"cached".to_string(), None);
    let (calls, fetcher) = counting("network");

    let mut query = Query::mount(
      store,
      KEY,
      fetcher,
      QueryOptions::default().refetch_interval(Duration::minutes(1)),
    );
    assert_eq!(query.active_timers(), 2);

    clock.advance(Duration::seconds(59));
    settle(&mut query).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    clock.advance(Duration::seconds(2));
    query.poll();
    settle(&mut query).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(query.data().map(String::as_str), Some("network"));
  }

  #[tokio::test]
  async fn test_unmount_stops_polling_and_unsubscribes() {
    let (store, clock) = store();
    let (calls, fetcher) = counting("network");
    let mut query = Query::mount(
      store.clone(),
      KEY,
      fetcher,
      QueryOptions::default().refetch_interval(Duration::minutes(1)),
    );
    settle(&mut query).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    query.unmount();
    store.invalidate(KEY);
    clock.advance(Duration::minutes(30));
    assert!(!settle(&mut query).await);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(query.active_timers(), 0);
    assert_eq!(store.stats().listeners, 0);
    assert!(!query.is_mounted());
  }

  #[tokio::test]
  async fn test_unmount_mid_fetch_still_fills_cache() {
    let (store, _) = store();
    let (mut gates, fetcher) = gated();
    let mut query = Query::mount(store.clone(), KEY, fetcher, QueryOptions::default());
    assert!(query.is_fetching());
    let loading = query.is_loading();

    query.unmount();
    gates.remove(0).send("network".to_string()).unwrap();
    assert!(!settle(&mut query).await);

    assert!(query.data().is_none());
    assert_eq!(query.is_loading(), loading);
    assert_eq!(store.get::<String>(KEY).as_deref(), Some("network"));
  }

  #[tokio::test]
  async fn test_disable_mid_fetch_ignores_late_result() {
    let (store, _) = store();
    let (mut gates, fetcher) = gated();
    let mut query = Query::mount(store.clone(), KEY, fetcher, QueryOptions::default());
    assert!(query.is_loading());

    query.set_enabled(false);
    assert!(!query.is_loading());
    assert!(!query.is_fetching());

    gates.remove(0).send("late".to_string()).unwrap();
    assert!(!settle(&mut query).await);
    assert!(query.data().is_none());
    assert_eq!(query.status(), QueryStatus::Idle);

    // Re-enabling reads the cache the late fetch filled
    query.set_enabled(true);
    settle(&mut query).await;
    assert_eq!(query.data().map(String::as_str), Some("late"));
    assert!(!query.is_loading());
  }

  #[tokio::test]
  async fn test_poll_while_fetch_pending_starts_no_second_fetch() {
    let (store, clock) = store();
    let (mut gates, gated_fetcher) = gated();
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let fetcher = move || {
      counter.fetch_add(1, Ordering::SeqCst);
      gated_fetcher()
    };

    let mut query = Query::mount(
      store,
      KEY,
      fetcher,
      QueryOptions::default().refetch_interval(Duration::minutes(1)),
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    clock.advance(Duration::minutes(2));
    query.poll();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(query.status(), QueryStatus::Loading);

    gates.remove(0).send("jobs".to_string()).unwrap();
    settle(&mut query).await;
    assert_eq!(query.data().map(String::as_str), Some("jobs"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_dropping_query_unsubscribes() {
    let (store, _) = store();
    let (_, fetcher) = counting("network");
    let query = Query::mount(store.clone(), KEY, fetcher, QueryOptions::default());
    assert_eq!(store.stats().listeners, 1);

    drop(query);
    assert_eq!(store.stats().listeners, 0);
  }

  #[tokio::test]
  async fn test_enabling_later_starts_fetch() {
    let (store, _) = store();
    let (calls, fetcher) = counting("network");
    let mut query = Query::mount(store, KEY, fetcher, QueryOptions::default().enabled(false));

    query.set_enabled(true);
    assert!(query.is_subscribed());
    settle(&mut query).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    query.set_enabled(false);
    assert_eq!(query.active_timers(), 0);
    assert!(!query.is_subscribed());
  }

  #[tokio::test]
  async fn test_stale_flag_follows_clock() {
    let (store, clock) = store();
    store.set(KEY, &"cached".to_string(), None);
    let (calls, fetcher) = counting("network");
    let mut query = Query::mount(store, KEY, fetcher, QueryOptions::default());
    assert!(!query.is_stale());

    clock.advance(Duration::minutes(6));
    assert!(query.poll());
    assert!(query.is_stale());
    assert_eq!(calls.load(Ordering::SeqCst), 0, "stale check never fetches");
  }

  #[tokio::test]
  async fn test_expired_entry_under_shown_data_reads_stale() {
    let (store, clock) = store();
    store.set(KEY, &"cached".to_string(), None);
    let (calls, fetcher) = counting("network");
    let mut query = Query::mount(store.clone(), KEY, fetcher, QueryOptions::default());
    assert_eq!(query.status(), QueryStatus::Ready);

    clock.advance(Duration::minutes(11));
    assert!(query.poll());

    assert!(query.is_stale());
    assert_eq!(query.status(), QueryStatus::Stale);
    assert_eq!(query.data().map(String::as_str), Some("cached"));
    assert_eq!(store.get::<String>(KEY), None);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  /// Fetcher whose n-th call resolves when the n-th sender fires.
  fn gated() -> (
    Vec<oneshot::Sender<String>>,
    impl Fn() -> BoxFuture<'static, Result<String>> + Send + Sync + 'static,
  ) {
    let (senders, receivers): (Vec<_>, VecDeque<_>) = (0..2).map(|_| oneshot::channel()).unzip();
    let receivers = Arc::new(Mutex::new(receivers));
    let fetcher = move || {
      let gate = receivers.lock().unwrap().pop_front();
      async move {
        match gate {
          Some(rx) => rx.await.map_err(|_| eyre!("gate dropped")),
          None => Err(eyre!("no more gates")),
        }
      }
      .boxed()
    };
    (senders, fetcher)
  }

  #[tokio::test]
  async fn test_late_background_result_does_not_overwrite_forced() {
    let (store, clock) = store();
    store.set(KEY, &"cached".to_string(), None);
    clock.advance(Duration::minutes(7));
    let (mut gates, fetcher) = gated();

    let mut query = Query::mount(store.clone(), KEY, fetcher, QueryOptions::default());
    assert!(query.is_fetching(), "background refresh started");
    query.refetch();

    let background = gates.remove(0);
    let forced = gates.remove(0);
    forced.send("forced".to_string()).unwrap();
    settle(&mut query).await;
    background.send("background".to_string()).unwrap();
    settle(&mut query).await;

    assert_eq!(query.data().map(String::as_str), Some("forced"));
    assert_eq!(store.get::<String>(KEY).as_deref(), Some("forced"));
  }

  #[tokio::test]
  async fn test_early_background_result_is_ignored_while_forced_pending() {
    let (store, clock) = store();
    store.set(KEY, &"cached".to_string(), None);
    clock.advance(Duration::minutes(7));
    let (mut gates, fetcher) = gated();

    let mut query = Query::mount(store.clone(), KEY, fetcher, QueryOptions::default());
    query.refetch();

    let background = gates.remove(0);
    let forced = gates.remove(0);
    background.send("background".to_string()).unwrap();
    settle(&mut query).await;

    assert_eq!(query.data().map(String::as_str), Some("cached"));
    assert!(query.is_loading(), "forced refresh still owns loading");

    forced.send("forced".to_string()).unwrap();
    settle(&mut query).await;
    assert_eq!(query.data().map(String::as_str), Some("forced"));
    assert!(!query.is_loading());
  }
}
