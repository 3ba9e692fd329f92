//! Error-absorbing facade over the SQLite storage.
//!
//! Storage failures, including failure to open the database at all, are
//! logged and converted into cache misses or no-ops, so the fetch pipeline
//! degrades to network-only behavior instead of failing.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use tracing::warn;

use crate::discogs::types::MasterRelease;

use super::storage::{CacheEntry, CacheStats, SqliteStorage};

pub struct MasterCache {
  storage: Option<SqliteStorage>,
}

impl MasterCache {
  /// Open the cache at the default location, or at `path` when configured.
  /// An unopenable database leaves the cache disabled rather than failing.
  pub fn open(path: Option<&Path>) -> Self {
    let storage = match path {
      Some(p) => SqliteStorage::open_at(p),
      None => SqliteStorage::open(),
    };

    match storage {
      Ok(storage) => Self {
        storage: Some(storage),
      },
      Err(e) => {
        warn!(error = %e, "cache unavailable, running network-only");
        Self { storage: None }
      }
    }
  }

  pub fn from_storage(storage: SqliteStorage) -> Self {
    Self {
      storage: Some(storage),
    }
  }

  /// A cache that never hits, for tests of the degraded path.
  #[cfg(test)]
  pub fn disabled() -> Self {
    Self { storage: None }
  }

  pub fn get(&self, id: u64) -> Option<CacheEntry> {
    match self.storage.as_ref()?.get(id) {
      Ok(entry) => entry,
      Err(e) => {
        warn!(id, error = %e, "cache read failed, treating as miss");
        None
      }
    }
  }

  pub fn get_many(&self, ids: &[u64]) -> HashMap<u64, CacheEntry> {
    let Some(storage) = self.storage.as_ref() else {
      return HashMap::new();
    };

    match storage.get_many(ids) {
      Ok(entries) => entries,
      Err(e) => {
        warn!(error = %e, "cache batch read failed, treating as miss");
        HashMap::new()
      }
    }
  }

  pub fn put(&self, master: &MasterRelease) {
    let Some(storage) = self.storage.as_ref() else {
      return;
    };

    if let Err(e) = storage.put(master) {
      warn!(id = master.id, error = %e, "cache write failed, continuing without");
    }
  }

  pub fn purge_older_than(&self, max_age: Duration) -> usize {
    let Some(storage) = self.storage.as_ref() else {
      return 0;
    };

    match storage.purge_older_than(max_age) {
      Ok(removed) => removed,
      Err(e) => {
        warn!(error = %e, "cache purge failed");
        0
      }
    }
  }

  pub fn stats(&self) -> Option<CacheStats> {
    match self.storage.as_ref()?.stats() {
      Ok(stats) => Some(stats),
      Err(e) => {
        warn!(error = %e, "cache stats failed");
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn master(id: u64) -> MasterRelease {
    MasterRelease {
      id,
      title: "Blue Train".to_string(),
      year: 1958,
      artists: vec!["John Coltrane".to_string()],
      genres: vec!["Jazz".to_string()],
      styles: vec![],
    }
  }

  #[test]
  fn test_unavailable_storage_degrades_to_misses() {
    let cache = MasterCache::disabled();

    cache.put(&master(10));
    assert!(cache.get(10).is_none());
    assert!(cache.get_many(&[10, 20]).is_empty());
    assert_eq!(cache.purge_older_than(Duration::from_secs(1)), 0);
    assert!(cache.stats().is_none());
  }

  #[test]
  fn test_facade_round_trip() {
    let cache = MasterCache::from_storage(SqliteStorage::open_in_memory().unwrap());

    cache.put(&master(10));
    let entry = cache.get(10).expect("hit");
    assert_eq!(entry.master.title, "Blue Train");

    let stats = cache.stats().unwrap();
    assert_eq!(stats.count, 1);
  }
}
