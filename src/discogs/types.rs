//! Domain types for the collection pipeline.
//!
//! These are separate from the serde wire types in `api_types` so the rest
//! of the crate works with exactly the fields it needs.

use serde::{Deserialize, Serialize};

/// One entry in a user's collection, referencing a master release by id.
///
/// Immutable once materialized, apart from `master_year` which the
/// enrichment path fills in from the cache or the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionItem {
  /// Instance id, unique within a collection.
  pub instance_id: u64,
  /// Release id of this pressing.
  pub release_id: u64,
  /// Foreign key to the master release. `None` when the API reports 0,
  /// meaning no master record exists.
  pub master_id: Option<u64>,
  pub title: String,
  /// Release year of this pressing; 0 means unknown.
  pub year: u32,
  pub artists: Vec<String>,
  /// Physical format labels, e.g. "Vinyl", "CD".
  pub formats: Vec<String>,
  pub cover_image: String,
  pub date_added: String,
  /// Master release year resolved by enrichment; `None` until annotated.
  pub master_year: Option<u32>,
}

// Named column accessors for presentation. A closed set of typed extractors
// instead of reading fields through dynamic dotted paths.
impl CollectionItem {
  /// All artist names joined for display and sorting.
  pub fn artist_names(&self) -> String {
    self.artists.join(", ")
  }

  /// Distinct format labels joined for display. "All Media" is a container
  /// marker on box sets, not a format, and is dropped.
  pub fn format_names(&self) -> String {
    let mut seen = Vec::new();
    for format in &self.formats {
      if format != "All Media" && !seen.iter().any(|s| s == format) {
        seen.push(format.clone());
      }
    }
    seen.join(", ")
  }

  /// Year to display: the resolved master year when annotated, otherwise
  /// the item's own year when known.
  pub fn display_year(&self) -> Option<u32> {
    self.master_year.or((self.year > 0).then_some(self.year))
  }

  /// Year used for ordering; unknown sorts as 0.
  pub fn sort_year(&self) -> u32 {
    self.display_year().unwrap_or(0)
  }
}

/// A collection folder. Folder 0 is the built-in "All" folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
  pub id: u64,
  pub name: String,
  pub count: u64,
}

/// Master release metadata, fetched lazily and cached across sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterRelease {
  pub id: u64,
  pub title: String,
  /// Original release year; 0 means unknown.
  pub year: u32,
  pub artists: Vec<String>,
  pub genres: Vec<String>,
  pub styles: Vec<String>,
}
