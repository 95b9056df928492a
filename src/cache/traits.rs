//! Core types for the caching system.

use chrono::{DateTime, Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;

/// A single cached value with its write time.
///
/// The payload is kept as JSON so the store stays agnostic of what it holds
/// and entries can be written to a persistent backend unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
  pub key: String,
  pub value: Value,
  pub stored_at: DateTime<Utc>,
  /// Per-entry expiry override
  pub ttl: Option<Duration>,
}

impl CacheEntry {
  pub fn new(key: impl Into<String>, value: Value, stored_at: DateTime<Utc>) -> Self {
    Self {
      key: key.into(),
      value,
      stored_at,
      ttl: None,
    }
  }

  pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
    self.ttl = ttl;
    self
  }

  pub fn age(&self, now: DateTime<Utc>) -> Duration {
    now - self.stored_at
  }

  /// Effective TTL for this entry.
  pub fn ttl(&self, settings: &CacheSettings) -> Duration {
    self.ttl.unwrap_or(settings.default_ttl)
  }

  /// Effective staleness threshold for this entry.
  ///
  /// Always shorter than the entry's TTL: an override below the configured
  /// threshold gets half its TTL instead.
  pub fn stale_after(&self, settings: &CacheSettings) -> Duration {
    let ttl = self.ttl(settings);
    if settings.stale_after < ttl {
      settings.stale_after
    } else {
      ttl / 2
    }
  }

  pub fn is_expired(&self, now: DateTime<Utc>, settings: &CacheSettings) -> bool {
    self.age(now) > self.ttl(settings)
  }

  pub fn is_stale(&self, now: DateTime<Utc>, settings: &CacheSettings) -> bool {
    self.age(now) > self.stale_after(settings)
  }

  pub fn freshness(&self, now: DateTime<Utc>, settings: &CacheSettings) -> Freshness {
    if self.is_expired(now, settings) {
      Freshness::Expired
    } else if self.is_stale(now, settings) {
      Freshness::Stale
    } else {
      Freshness::Fresh
    }
  }
}

/// Where an entry sits on the fresh → stale → expired path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
  Fresh,
  /// Still served, should be refreshed in the background
  Stale,
  /// Never served
  Expired,
}

/// Expiry configuration for a store.
#[derive(Debug, Clone)]
pub struct CacheSettings {
  /// Default time-to-live for entries without an override
  pub default_ttl: Duration,
  /// Age after which an entry is reported stale
  pub stale_after: Duration,
  /// Optional capacity bound; the oldest write is evicted beyond it
  pub max_entries: Option<usize>,
}

impl CacheSettings {
  pub fn new(default_ttl: Duration, stale_after: Duration) -> Result<Self> {
    let settings = Self {
      default_ttl,
      stale_after,
      max_entries: None,
    };
    settings.validate()?;
    Ok(settings)
  }

  pub fn with_max_entries(mut self, max_entries: Option<usize>) -> Self {
    self.max_entries = max_entries;
    self
  }

  pub fn validate(&self) -> Result<()> {
    if self.default_ttl <= Duration::zero() {
      return Err(eyre!("Cache TTL must be positive"));
    }
    if self.stale_after >= self.default_ttl {
      return Err(eyre!(
        "Staleness threshold ({}s) must be shorter than the TTL ({}s)",
        self.stale_after.num_seconds(),
        self.default_ttl.num_seconds()
      ));
    }
    if self.max_entries == Some(0) {
      return Err(eyre!("max_entries must be at least 1"));
    }
    Ok(())
  }
}

impl Default for CacheSettings {
  fn default() -> Self {
    Self {
      default_ttl: Duration::minutes(10),
      stale_after: Duration::minutes(5),
      max_entries: None,
    }
  }
}

/// Metadata about a live entry, for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryInfo {
  pub key: String,
  pub stored_at: DateTime<Utc>,
  pub age: Duration,
  pub freshness: Freshness,
}

/// Entry counts for a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
  pub entries: usize,
  pub fresh: usize,
  pub stale: usize,
  pub expired: usize,
  pub listeners: usize,
}

/// Proof that a fetch for `key` was started at a given generation.
///
/// Handed back to [`CacheStore::complete_fetch`](super::CacheStore::complete_fetch),
/// which only writes if no newer fetch or invalidation happened since.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
  pub(crate) key: String,
  pub(crate) generation: u64,
}

impl FetchTicket {
  pub fn key(&self) -> &str {
    &self.key
  }
}
