//! Collection loading and enrichment.
//!
//! `CollectionService` is the seam presentation code talks to: it walks the
//! paginated collection through the rate gate, annotates items with master
//! years from the persistent cache, and resolves individual master records
//! on demand, filling cache misses over the network.

pub mod project;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use color_eyre::{eyre::eyre, Result};
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use crate::cache::MasterCache;
use crate::discogs::client::DiscogsClient;
use crate::discogs::types::{CollectionItem, Folder, MasterRelease};

/// The built-in folder that contains the entire collection.
pub const ALL_FOLDER_ID: u64 = 0;

/// A loaded collection. `partial` is set when a pagination cursor cycle cut
/// the walk short; the items are still usable and the caller should surface
/// a warning.
#[derive(Debug, Clone)]
pub struct CollectionLoad {
  pub items: Vec<CollectionItem>,
  pub partial: bool,
}

pub struct CollectionService {
  client: DiscogsClient,
  cache: MasterCache,
  /// Per-id cells resolved at most once per session. Concurrent callers for
  /// the same missing id await the same in-flight fetch instead of issuing
  /// duplicates.
  masters: Mutex<HashMap<u64, Arc<OnceCell<MasterRelease>>>>,
}

impl CollectionService {
  pub fn new(client: DiscogsClient, cache: MasterCache) -> Self {
    Self {
      client,
      cache,
      masters: Mutex::new(HashMap::new()),
    }
  }

  /// List a user's collection folders.
  pub async fn folders(&self, username: &str) -> Result<Vec<Folder>> {
    self.client.collection_folders(username).await
  }

  /// Load a user's full collection and annotate it from the cache.
  ///
  /// The bulk path never fetches master records over the network; items
  /// whose master is not cached stay unannotated until `ensure_master`
  /// resolves them.
  pub async fn load_collection(&self, username: &str, folder_id: u64) -> Result<CollectionLoad> {
    let outcome = self.client.collection_items(username, folder_id).await?;

    let mut items: Vec<CollectionItem> = outcome
      .response
      .releases
      .into_iter()
      .map(|release| release.into_item())
      .collect();

    self.annotate_from_cache(&mut items);

    Ok(CollectionLoad {
      items,
      partial: outcome.aborted_on_cycle,
    })
  }

  /// Annotate every item whose master is already cached, in one batch read.
  fn annotate_from_cache(&self, items: &mut [CollectionItem]) {
    let ids: BTreeSet<u64> = items.iter().filter_map(|item| item.master_id).collect();
    if ids.is_empty() {
      return;
    }

    let ids: Vec<u64> = ids.into_iter().collect();
    let hits = self.cache.get_many(&ids);
    debug!(requested = ids.len(), hits = hits.len(), "bulk cache annotation");

    for item in items.iter_mut() {
      if let Some(id) = item.master_id {
        if let Some(entry) = hits.get(&id) {
          item.master_year = Some(entry.master.year);
        }
      }
    }
  }

  /// Resolve one master record: session map first, then cache, then the
  /// network (writing the result back to the cache).
  ///
  /// Ids at or below zero never reach this point as `master_id` is `None`
  /// for them; a zero argument is rejected before any I/O.
  pub async fn ensure_master(&self, master_id: u64) -> Result<MasterRelease> {
    if master_id == 0 {
      return Err(eyre!("Release has no master record"));
    }

    let cell = {
      let mut masters = self.masters.lock().await;
      Arc::clone(masters.entry(master_id).or_default())
    };

    let master = cell
      .get_or_try_init(|| async {
        if let Some(entry) = self.cache.get(master_id) {
          debug!(master_id, "master resolved from cache");
          return Ok(entry.master);
        }

        debug!(master_id, "cache miss, fetching master release");
        let master = self.client.master_release(master_id).await?;
        self.cache.put(&master);
        Ok::<_, color_eyre::Report>(master)
      })
      .await?;

    Ok(master.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::SqliteStorage;
  use crate::config::Config;

  fn service_with_cache(masters: &[MasterRelease]) -> CollectionService {
    let storage = SqliteStorage::open_in_memory().unwrap();
    for master in masters {
      storage.put(master).unwrap();
    }
    let client = DiscogsClient::new(&Config::default()).unwrap();
    CollectionService::new(client, MasterCache::from_storage(storage))
  }

  fn master(id: u64, year: u32) -> MasterRelease {
    MasterRelease {
      id,
      title: format!("Master {}", id),
      year,
      artists: vec!["Artist".to_string()],
      genres: vec![],
      styles: vec![],
    }
  }

  fn item(instance_id: u64, master_id: Option<u64>, year: u32, artist: &str) -> CollectionItem {
    CollectionItem {
      instance_id,
      release_id: instance_id,
      master_id,
      title: format!("Item {}", instance_id),
      year,
      artists: vec![artist.to_string()],
      formats: vec!["Vinyl".to_string()],
      cover_image: String::new(),
      date_added: String::new(),
      master_year: None,
    }
  }

  #[tokio::test]
  async fn test_bulk_annotation_hits_cache_only() {
    // Collection of 3: two share master 10, one has no master at all.
    // No network is involved anywhere on this path.
    let service = service_with_cache(&[master(10, 1999)]);
    let mut items = vec![
      item(1, Some(10), 0, "Zebra"),
      item(2, None, 1995, "Aardvark"),
      item(3, Some(10), 0, "Zebra"),
    ];

    service.annotate_from_cache(&mut items);

    assert_eq!(items[0].master_year, Some(1999));
    assert_eq!(items[1].master_year, None);
    assert_eq!(items[2].master_year, Some(1999));

    let projected = project::project(&items, project::ALL_FORMATS);
    let order: Vec<u64> = projected.iter().map(|i| i.instance_id).collect();
    assert_eq!(order, vec![2, 1, 3]);
    assert_eq!(projected[0].display_year(), Some(1995));
    assert_eq!(projected[1].display_year(), Some(1999));
  }

  #[tokio::test]
  async fn test_bulk_annotation_misses_stay_unannotated() {
    let service = service_with_cache(&[]);
    let mut items = vec![item(1, Some(10), 0, "Artist")];

    service.annotate_from_cache(&mut items);
    assert_eq!(items[0].master_year, None);
  }

  #[tokio::test]
  async fn test_ensure_master_rejects_zero_before_io() {
    let service = service_with_cache(&[]);
    assert!(service.ensure_master(0).await.is_err());
  }

  #[tokio::test]
  async fn test_ensure_master_resolves_from_cache() {
    let service = service_with_cache(&[master(10, 1999)]);

    let resolved = service.ensure_master(10).await.unwrap();
    assert_eq!(resolved.year, 1999);

    // Second call is served by the session map; even a wiped cache would
    // not trigger a refetch.
    let again = service.ensure_master(10).await.unwrap();
    assert_eq!(again, resolved);
  }

  #[tokio::test]
  async fn test_concurrent_ensure_master_shares_one_resolution() {
    let service = Arc::new(service_with_cache(&[master(10, 1999)]));

    let a = Arc::clone(&service);
    let b = Arc::clone(&service);
    let (ra, rb) = tokio::join!(
      async move { a.ensure_master(10).await },
      async move { b.ensure_master(10).await },
    );

    assert_eq!(ra.unwrap(), rb.unwrap());
  }
}
