//! SQLite-backed persistent store for master release metadata.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};

use crate::discogs::types::MasterRelease;

/// A cached master release with its bookkeeping timestamps.
///
/// `id` always equals `master.id`, and `last_accessed_at` never precedes
/// `cached_at`.
#[derive(Debug, Clone)]
pub struct CacheEntry {
  pub id: u64,
  pub master: MasterRelease,
  /// When the record was written.
  pub cached_at: DateTime<Utc>,
  /// Most recent read, refreshed by every get.
  pub last_accessed_at: DateTime<Utc>,
}

/// Read-only cache diagnostics.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
  pub count: u64,
  pub oldest_cached_at: Option<DateTime<Utc>>,
  pub newest_cached_at: Option<DateTime<Utc>>,
}

/// Schema for the master release cache.
///
/// Timestamps are RFC 3339 UTC strings, which compare correctly as text.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS master_cache (
    id INTEGER PRIMARY KEY,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL,
    last_accessed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_master_cache_cached_at ON master_cache(cached_at);

PRAGMA user_version = 1;
"#;

/// SQLite-based cache storage.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Create a new SQLite storage at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;
    Self::open_at(&path)
  }

  /// Create a new SQLite storage at the given path, creating parent
  /// directories and the table on first open.
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// In-memory storage, used by tests.
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory cache: {}", e))?;

    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Get the default database path.
  fn default_path() -> Result<std::path::PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("waxcrate").join("cache.db"))
  }

  /// Run database migrations. `user_version` 1 is the only schema so far.
  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock()?;
    conn
      .execute_batch(SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;
    Ok(())
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Get a cached master release. A hit refreshes `last_accessed_at` to now
  /// before returning; a miss is `Ok(None)`.
  pub fn get(&self, id: u64) -> Result<Option<CacheEntry>> {
    let conn = self.lock()?;

    let row: Option<(Vec<u8>, String)> = conn
      .query_row(
        "SELECT data, cached_at FROM master_cache WHERE id = ?",
        params![id],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .ok();

    let Some((data, cached_at)) = row else {
      return Ok(None);
    };

    let now = Utc::now();
    conn
      .execute(
        "UPDATE master_cache SET last_accessed_at = ? WHERE id = ?",
        params![now.to_rfc3339(), id],
      )
      .map_err(|e| eyre!("Failed to update access time for {}: {}", id, e))?;

    Ok(Some(CacheEntry {
      id,
      master: decode_master(&data)?,
      cached_at: parse_datetime(&cached_at)?,
      last_accessed_at: now,
    }))
  }

  /// Batch get. Returns only the ids that are present and refreshes their
  /// access times in one pass with a single timestamp.
  pub fn get_many(&self, ids: &[u64]) -> Result<HashMap<u64, CacheEntry>> {
    let conn = self.lock()?;
    let now = Utc::now();
    let mut entries = HashMap::new();

    {
      let mut select = conn
        .prepare("SELECT data, cached_at FROM master_cache WHERE id = ?")
        .map_err(|e| eyre!("Failed to prepare cache query: {}", e))?;
      let mut touch = conn
        .prepare("UPDATE master_cache SET last_accessed_at = ? WHERE id = ?")
        .map_err(|e| eyre!("Failed to prepare access-time update: {}", e))?;

      for &id in ids {
        let row: Option<(Vec<u8>, String)> = select
          .query_row(params![id], |row| Ok((row.get(0)?, row.get(1)?)))
          .ok();

        let Some((data, cached_at)) = row else {
          continue;
        };

        touch
          .execute(params![now.to_rfc3339(), id])
          .map_err(|e| eyre!("Failed to update access time for {}: {}", id, e))?;

        entries.insert(
          id,
          CacheEntry {
            id,
            master: decode_master(&data)?,
            cached_at: parse_datetime(&cached_at)?,
            last_accessed_at: now,
          },
        );
      }
    }

    Ok(entries)
  }

  /// Insert or overwrite the entry for this master. Both timestamps are
  /// stamped to now: a put always represents a fresh write.
  pub fn put(&self, master: &MasterRelease) -> Result<()> {
    let conn = self.lock()?;
    let data =
      serde_json::to_vec(master).map_err(|e| eyre!("Failed to serialize master: {}", e))?;
    let now = Utc::now().to_rfc3339();

    conn
      .execute(
        "INSERT OR REPLACE INTO master_cache (id, data, cached_at, last_accessed_at)
         VALUES (?, ?, ?, ?)",
        params![master.id, data, now, now],
      )
      .map_err(|e| eyre!("Failed to store master {}: {}", master.id, e))?;

    Ok(())
  }

  /// Delete entries written before `now - max_age`. Returns the number of
  /// rows removed. Never invoked automatically.
  pub fn purge_older_than(&self, max_age: Duration) -> Result<usize> {
    let conn = self.lock()?;
    let cutoff = Utc::now()
      - chrono::Duration::from_std(max_age).map_err(|e| eyre!("Age out of range: {}", e))?;

    let removed = conn
      .execute(
        "DELETE FROM master_cache WHERE cached_at < ?",
        params![cutoff.to_rfc3339()],
      )
      .map_err(|e| eyre!("Failed to purge cache: {}", e))?;

    Ok(removed)
  }

  pub fn stats(&self) -> Result<CacheStats> {
    let conn = self.lock()?;

    let (count, oldest, newest): (u64, Option<String>, Option<String>) = conn
      .query_row(
        "SELECT COUNT(*), MIN(cached_at), MAX(cached_at) FROM master_cache",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
      )
      .map_err(|e| eyre!("Failed to read cache stats: {}", e))?;

    Ok(CacheStats {
      count,
      oldest_cached_at: oldest.as_deref().map(parse_datetime).transpose()?,
      newest_cached_at: newest.as_deref().map(parse_datetime).transpose()?,
    })
  }
}

fn decode_master(data: &[u8]) -> Result<MasterRelease> {
  serde_json::from_slice(data).map_err(|e| eyre!("Failed to deserialize cached master: {}", e))
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

  fn master(id: u64, year: u32) -> MasterRelease {
    MasterRelease {
      id,
      title: format!("Master {}", id),
      year,
      artists: vec!["Miles Davis".to_string()],
      genres: vec!["Jazz".to_string()],
      styles: vec!["Modal".to_string()],
    }
  }

  /// Backdate a row's cached_at for age-based tests.
  fn backdate(storage: &SqliteStorage, id: u64, days: i64) {
    let past = (Utc::now() - chrono::Duration::days(days)).to_rfc3339();
    storage
      .lock()
      .unwrap()
      .execute(
        "UPDATE master_cache SET cached_at = ?, last_accessed_at = ? WHERE id = ?",
        params![past, past, id],
      )
      .unwrap();
  }

  #[test]
  fn test_put_get_round_trip() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let m = master(10, 1959);
    storage.put(&m).unwrap();

    let entry = storage.get(10).unwrap().unwrap();
    assert_eq!(entry.master, m);
    assert_eq!(entry.id, entry.master.id);
    assert!(entry.last_accessed_at >= entry.cached_at);
  }

  #[test]
  fn test_miss_is_none_not_error() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    assert!(storage.get(404).unwrap().is_none());
  }

  #[test]
  fn test_get_refreshes_access_time_only() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.put(&master(10, 1959)).unwrap();
    backdate(&storage, 10, 30);

    let entry = storage.get(10).unwrap().unwrap();
    assert!(entry.last_accessed_at > entry.cached_at);

    // cached_at survives reads untouched.
    let again = storage.get(10).unwrap().unwrap();
    assert_eq!(again.cached_at, entry.cached_at);
  }

  #[test]
  fn test_put_overwrites_and_restamps() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.put(&master(10, 1959)).unwrap();
    backdate(&storage, 10, 30);
    let old = storage.get(10).unwrap().unwrap();

    storage.put(&master(10, 1960)).unwrap();
    let fresh = storage.get(10).unwrap().unwrap();
    assert_eq!(fresh.master.year, 1960);
    assert!(fresh.cached_at > old.cached_at);
  }

  #[test]
  fn test_get_many_returns_only_present_ids() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.put(&master(10, 1959)).unwrap();
    storage.put(&master(20, 1971)).unwrap();

    let entries = storage.get_many(&[10, 20, 30]).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[&10].master.year, 1959);
    assert_eq!(entries[&20].master.year, 1971);
    assert!(!entries.contains_key(&30));
  }

  #[test]
  fn test_purge_removes_only_old_entries() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.put(&master(10, 1959)).unwrap();
    storage.put(&master(20, 1971)).unwrap();
    backdate(&storage, 10, 120);

    let removed = storage
      .purge_older_than(Duration::from_secs(90 * 24 * 60 * 60))
      .unwrap();
    assert_eq!(removed, 1);
    assert!(storage.get(10).unwrap().is_none());
    assert!(storage.get(20).unwrap().is_some());
  }

  #[test]
  fn test_stats() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    assert_eq!(storage.stats().unwrap().count, 0);

    storage.put(&master(10, 1959)).unwrap();
    storage.put(&master(20, 1971)).unwrap();
    backdate(&storage, 10, 5);

    let stats = storage.stats().unwrap();
    assert_eq!(stats.count, 2);
    assert!(stats.oldest_cached_at.unwrap() < stats.newest_cached_at.unwrap());
  }
}
