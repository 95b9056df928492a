//! Shared keyed store with TTL expiry, staleness and invalidation events.

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::storage::{CacheStorage, NoopStorage};
use super::traits::{CacheEntry, CacheSettings, CacheStats, EntryInfo, FetchTicket, Freshness};

type Listener = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct Inner {
  entries: HashMap<String, CacheEntry>,
  /// Bumped by every fetch start and every invalidation of a key
  generations: HashMap<String, u64>,
  listeners: Vec<(u64, Listener)>,
  next_listener_id: u64,
}

impl Inner {
  fn bump_generation(&mut self, key: &str) -> u64 {
    let generation = self.generations.entry(key.to_string()).or_insert(0);
    *generation += 1;
    *generation
  }
}

/// Process-wide cache of remote resources.
///
/// Cheap to clone; every clone shares the same entries and listeners. No
/// operation fails: anything that goes wrong is logged and reported as a
/// miss.
#[derive(Clone)]
pub struct CacheStore {
  inner: Arc<Mutex<Inner>>,
  settings: Arc<CacheSettings>,
  clock: Arc<dyn Clock>,
  storage: Arc<dyn CacheStorage>,
}

impl CacheStore {
  /// Memory-only store on the system clock.
  pub fn new(settings: CacheSettings) -> Self {
    Self::with_parts(settings, Arc::new(SystemClock), Arc::new(NoopStorage))
  }

  pub fn with_parts(
    settings: CacheSettings,
    clock: Arc<dyn Clock>,
    storage: Arc<dyn CacheStorage>,
  ) -> Self {
    Self {
      inner: Arc::new(Mutex::new(Inner::default())),
      settings: Arc::new(settings),
      clock,
      storage,
    }
  }

  pub fn settings(&self) -> &CacheSettings {
    &self.settings
  }

  pub fn now(&self) -> DateTime<Utc> {
    self.clock.now()
  }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    self
      .inner
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  /// Current, unexpired entry for `key`, hydrating from storage on a memory
  /// miss. Expired entries are dropped on the way.
  fn live_entry(&self, inner: &mut Inner, key: &str) -> Option<CacheEntry> {
    let entry = match inner.entries.get(key) {
      Some(entry) => entry.clone(),
      None => {
        let persisted = self.storage.load(key).unwrap_or_else(|e| {
          warn!(key, error = %e, "Failed to load persisted cache entry");
          None
        })?;
        debug!(key, "Hydrated cache entry from storage");
        inner.entries.insert(key.to_string(), persisted.clone());
        persisted
      }
    };

    if entry.is_expired(self.now(), &self.settings) {
      debug!(key, "Dropping expired cache entry");
      inner.entries.remove(key);
      self.forget_persisted(key);
      return None;
    }

    Some(entry)
  }

  fn forget_persisted(&self, key: &str) {
    if let Err(e) = self.storage.remove(key) {
      warn!(key, error = %e, "Failed to delete persisted cache entry");
    }
  }

  /// Read a value. Stale values are returned; expired ones are not.
  pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    let entry = {
      let mut inner = self.lock();
      self.live_entry(&mut inner, key)?
    };

    match serde_json::from_value(entry.value) {
      Ok(value) => Some(value),
      Err(e) => {
        warn!(key, error = %e, "Cached value has an unexpected shape");
        None
      }
    }
  }

  /// Write a value, resetting its age. Listeners are not notified.
  pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
    if let Some(entry) = self.make_entry(key, value, ttl) {
      self.write_entry(entry, None);
    }
  }

  fn make_entry<T: Serialize>(
    &self,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
  ) -> Option<CacheEntry> {
    match serde_json::to_value(value) {
      Ok(value) => Some(CacheEntry::new(key, value, self.now()).with_ttl(ttl)),
      Err(e) => {
        warn!(key, error = %e, "Failed to serialize value for cache");
        None
      }
    }
  }

  /// Insert `entry` in memory, then persist it.
  ///
  /// With `expected` set, the generation check and the insert happen under
  /// the same lock, so an invalidation either lands first (nothing is
  /// written) or removes what was written. The save runs unlocked; if the
  /// entry was replaced or invalidated meanwhile, the persisted copy goes.
  fn write_entry(&self, entry: CacheEntry, expected: Option<u64>) -> bool {
    let key = entry.key.clone();
    let evicted = {
      let mut inner = self.lock();
      if let Some(expected) = expected {
        let current = inner.generations.get(&key).copied().unwrap_or(0);
        if current != expected {
          debug!(
            key = %key,
            ticket = expected,
            current,
            "Discarding superseded fetch result"
          );
          return false;
        }
      }
      inner.entries.insert(key.clone(), entry.clone());
      self.evict_over_capacity(&mut inner, &key)
    };
    for evicted_key in evicted {
      debug!(key = %evicted_key, "Evicted cache entry over capacity");
      self.forget_persisted(&evicted_key);
    }

    if let Err(e) = self.storage.save(&entry) {
      warn!(key = %key, error = %e, "Failed to persist cache entry");
      return true;
    }
    let current = self.lock().entries.get(&key) == Some(&entry);
    if !current {
      debug!(key = %key, "Entry changed while persisting, dropping saved copy");
      self.forget_persisted(&key);
    }
    true
  }

  /// Drop the oldest writes until the store is within `max_entries`.
  fn evict_over_capacity(&self, inner: &mut Inner, keep: &str) -> Vec<String> {
    let Some(max_entries) = self.settings.max_entries else {
      return Vec::new();
    };

    let mut evicted = Vec::new();
    while inner.entries.len() > max_entries {
      let oldest = inner
        .entries
        .values()
        .filter(|entry| entry.key != keep)
        .min_by_key(|entry| entry.stored_at)
        .map(|entry| entry.key.clone());

      match oldest {
        Some(key) => {
          inner.entries.remove(&key);
          evicted.push(key);
        }
        None => break,
      }
    }
    evicted
  }

  /// True once a present entry is past the staleness threshold.
  pub fn is_stale(&self, key: &str) -> bool {
    let mut inner = self.lock();
    self
      .live_entry(&mut inner, key)
      .map(|entry| entry.is_stale(self.now(), &self.settings))
      .unwrap_or(false)
  }

  /// Remove `key` and notify every listener before returning.
  ///
  /// Fetches that began before this call can no longer write the key.
  pub fn invalidate(&self, key: &str) {
    let listeners: Vec<Listener> = {
      let mut inner = self.lock();
      inner.entries.remove(key);
      inner.bump_generation(key);
      inner
        .listeners
        .iter()
        .map(|(_, listener)| Arc::clone(listener))
        .collect()
    };
    self.forget_persisted(key);

    debug!(key, listeners = listeners.len(), "Invalidated cache key");
    for listener in listeners {
      listener(key);
    }
  }

  /// Invalidate every cached key starting with `prefix`.
  ///
  /// Persisted keys count too, so a page written in an earlier run cannot be
  /// hydrated later. Returns how many keys were invalidated.
  pub fn invalidate_prefix(&self, prefix: &str) -> usize {
    let mut keys: BTreeSet<String> = self
      .lock()
      .entries
      .keys()
      .filter(|key| key.starts_with(prefix))
      .cloned()
      .collect();
    match self.storage.keys_with_prefix(prefix) {
      Ok(persisted) => keys.extend(persisted),
      Err(e) => warn!(prefix, error = %e, "Failed to list persisted cache keys"),
    }

    for key in &keys {
      self.invalidate(key);
    }
    keys.len()
  }

  /// Register a callback for every invalidated key.
  ///
  /// The callback runs synchronously inside [`invalidate`](Self::invalidate)
  /// and must stay short. Dropping the returned guard unsubscribes.
  pub fn on_invalidate<F>(&self, listener: F) -> Subscription
  where
    F: Fn(&str) + Send + Sync + 'static,
  {
    let mut inner = self.lock();
    let id = inner.next_listener_id;
    inner.next_listener_id += 1;
    inner.listeners.push((id, Arc::new(listener)));

    Subscription {
      store: Arc::downgrade(&self.inner),
      id,
    }
  }

  /// Mark the start of a fetch for `key`.
  pub fn begin_fetch(&self, key: &str) -> FetchTicket {
    let generation = self.lock().bump_generation(key);
    FetchTicket {
      key: key.to_string(),
      generation,
    }
  }

  /// Write a fetch result unless it has been superseded.
  ///
  /// Returns false (and writes nothing) when a newer fetch started or the
  /// key was invalidated after `ticket` was issued.
  pub fn complete_fetch<T: Serialize>(
    &self,
    ticket: &FetchTicket,
    value: &T,
    ttl: Option<Duration>,
  ) -> bool {
    match self.make_entry(&ticket.key, value, ttl) {
      Some(entry) => self.write_entry(entry, Some(ticket.generation)),
      None => false,
    }
  }

  /// Drop every expired entry held in memory.
  pub fn purge_expired(&self) -> usize {
    let now = self.now();
    let expired: Vec<String> = {
      let mut inner = self.lock();
      let expired: Vec<String> = inner
        .entries
        .values()
        .filter(|entry| entry.is_expired(now, &self.settings))
        .map(|entry| entry.key.clone())
        .collect();
      for key in &expired {
        inner.entries.remove(key);
      }
      expired
    };

    for key in &expired {
      self.forget_persisted(key);
    }
    expired.len()
  }

  /// Drop everything without notifying listeners.
  #[allow(dead_code)]
  pub fn clear(&self) {
    self.lock().entries.clear();
    if let Err(e) = self.storage.clear() {
      warn!(error = %e, "Failed to clear persisted cache");
    }
  }

  /// Metadata for a live entry.
  pub fn entry_info(&self, key: &str) -> Option<EntryInfo> {
    let mut inner = self.lock();
    let entry = self.live_entry(&mut inner, key)?;
    let now = self.now();

    Some(EntryInfo {
      key: entry.key.clone(),
      stored_at: entry.stored_at,
      age: entry.age(now),
      freshness: entry.freshness(now, &self.settings),
    })
  }

  pub fn stats(&self) -> CacheStats {
    let now = self.now();
    let inner = self.lock();
    let mut stats = CacheStats {
      entries: inner.entries.len(),
      listeners: inner.listeners.len(),
      ..CacheStats::default()
    };

    for entry in inner.entries.values() {
      match entry.freshness(now, &self.settings) {
        Freshness::Fresh => stats.fresh += 1,
        Freshness::Stale => stats.stale += 1,
        Freshness::Expired => stats.expired += 1,
      }
    }
    stats
  }
}

impl fmt::Debug for CacheStore {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheStore")
      .field("settings", &self.settings)
      .field("stats", &self.stats())
      .finish_non_exhaustive()
  }
}

/// Live invalidation listener. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
  store: Weak<Mutex<Inner>>,
  id: u64,
}

impl Drop for Subscription {
  fn drop(&mut self) {
    if let Some(inner) = self.store.upgrade() {
      let mut inner = inner
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
      inner.listeners.retain(|(id, _)| *id != self.id);
    }
  }
}

impl fmt::Debug for Subscription {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Subscription").field("id", &self.id).finish()
  }
}
