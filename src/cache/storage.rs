//! Persistence backends for the cache store.

use chrono::{DateTime, Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::traits::CacheEntry;

/// Trait for cache storage backends.
///
/// The in-memory store is authoritative; a backend only lets entries survive
/// a restart. Errors are reported to the store, which logs and carries on.
pub trait CacheStorage: Send + Sync {
  /// Load a persisted entry by key.
  fn load(&self, key: &str) -> Result<Option<CacheEntry>>;

  /// Insert or replace an entry.
  fn save(&self, entry: &CacheEntry) -> Result<()>;

  /// Delete an entry. Deleting a missing key is not an error.
  fn remove(&self, key: &str) -> Result<()>;

  /// Delete every entry.
  fn clear(&self) -> Result<()>;

  /// Keys of persisted entries starting with `prefix`.
  fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Storage implementation that doesn't persist anything.
/// Used when persistence is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn load(&self, _key: &str) -> Result<Option<CacheEntry>> {
    Ok(None) // Always miss
  }

  fn save(&self, _entry: &CacheEntry) -> Result<()> {
    Ok(()) // Discard
  }

  fn remove(&self, _key: &str) -> Result<()> {
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    Ok(())
  }

  fn keys_with_prefix(&self, _prefix: &str) -> Result<Vec<String>> {
    Ok(Vec::new())
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the cache database at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open (or create) the cache database at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// In-memory database, gone when dropped.
  #[allow(dead_code)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("campus-cache").join("cache.db"))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    cache_key TEXT PRIMARY KEY,
    data BLOB NOT NULL,
    stored_at TEXT NOT NULL,
    ttl_ms INTEGER
);
"#;

impl CacheStorage for SqliteStorage {
  fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row: Option<(Vec<u8>, String, Option<i64>)> = conn
      .query_row(
        "SELECT data, stored_at, ttl_ms FROM cache_entries WHERE cache_key = ?",
        params![key],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to load cache entry {}: {}", key, e))?;

    let Some((data, stored_at, ttl_ms)) = row else {
      return Ok(None);
    };

    let value = serde_json::from_slice(&data)
      .map_err(|e| eyre!("Failed to deserialize cache entry {}: {}", key, e))?;

    Ok(Some(
      CacheEntry::new(key, value, parse_datetime(&stored_at)?)
        .with_ttl(ttl_ms.map(Duration::milliseconds)),
    ))
  }

  fn save(&self, entry: &CacheEntry) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let data = serde_json::to_vec(&entry.value)
      .map_err(|e| eyre!("Failed to serialize cache entry {}: {}", entry.key, e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO cache_entries (cache_key, data, stored_at, ttl_ms)
         VALUES (?, ?, ?, ?)",
        params![
          entry.key,
          data,
          entry.stored_at.to_rfc3339(),
          entry.ttl.map(|ttl| ttl.num_milliseconds())
        ],
      )
      .map_err(|e| eyre!("Failed to store cache entry {}: {}", entry.key, e))?;

    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM cache_entries WHERE cache_key = ?", params![key])
      .map_err(|e| eyre!("Failed to delete cache entry {}: {}", key, e))?;

    Ok(())
  }

  fn clear(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM cache_entries", [])
      .map_err(|e| eyre!("Failed to clear cache: {}", e))?;

    Ok(())
  }

  fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    // substr rather than LIKE: keys contain '_', a LIKE wildcard
    let mut stmt = conn
      .prepare(
        "SELECT cache_key FROM cache_entries
         WHERE substr(cache_key, 1, length(?1)) = ?1",
      )
      .map_err(|e| eyre!("Failed to prepare prefix query: {}", e))?;
    let keys = stmt
      .query_map(params![prefix], |row| row.get::<_, String>(0))
      .and_then(|rows| rows.collect::<rusqlite::Result<Vec<String>>>())
      .map_err(|e| eyre!("Failed to list cache keys with prefix {}: {}", prefix, e))?;

    Ok(keys)
  }
}

/// Parse a stored RFC 3339 timestamp.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn stored_at() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::days(20_000)
  }

  #[test]
  fn test_sqlite_save_and_load() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let entry = CacheEntry::new("user_profile_7", json!({"name": "Ada"}), stored_at())
      .with_ttl(Some(Duration::minutes(3)));

    storage.save(&entry).unwrap();

    assert_eq!(storage.load("user_profile_7").unwrap(), Some(entry));
  }

  #[test]
  fn test_sqlite_load_missing_is_none() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    assert_eq!(storage.load("nope").unwrap(), None);
  }

  #[test]
  fn test_sqlite_save_replaces() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage
      .save(&CacheEntry::new("k", json!(1), stored_at()))
      .unwrap();
    storage
      .save(&CacheEntry::new("k", json!(2), stored_at()))
      .unwrap();

    let loaded = storage.load("k").unwrap().unwrap();
    assert_eq!(loaded.value, json!(2));
    assert_eq!(loaded.ttl, None);
  }

  #[test]
  fn test_sqlite_remove_and_clear() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage
      .save(&CacheEntry::new("a", json!("a"), stored_at()))
      .unwrap();
    storage
      .save(&CacheEntry::new("b", json!("b"), stored_at()))
      .unwrap();

    storage.remove("a").unwrap();
    storage.remove("missing").unwrap();
    assert_eq!(storage.load("a").unwrap(), None);
    assert!(storage.load("b").unwrap().is_some());

    storage.clear().unwrap();
    assert_eq!(storage.load("b").unwrap(), None);
  }

  #[test]
  fn test_sqlite_keys_with_prefix() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    for key in ["jobs_list_1_all", "jobs_list_2_all", "jobsXlist_3", "job_detail_4"] {
      storage
        .save(&CacheEntry::new(key, json!(null), stored_at()))
        .unwrap();
    }

    let mut keys = storage.keys_with_prefix("jobs_list_").unwrap();
    keys.sort();
    assert_eq!(keys, vec!["jobs_list_1_all", "jobs_list_2_all"]);
  }

  #[test]
  fn test_noop_storage_always_misses() {
    let storage = NoopStorage;
    storage
      .save(&CacheEntry::new("k", json!(1), stored_at()))
      .unwrap();
    assert_eq!(storage.load("k").unwrap(), None);
  }
}
