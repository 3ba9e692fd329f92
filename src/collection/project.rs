//! Pure filter and sort projection over collection items.
//!
//! No I/O here: the same deterministic ordering feeds both the table and
//! the carousel views.

use std::cmp::Ordering;

use crate::discogs::types::CollectionItem;

/// Format label that passes every item through the filter.
pub const ALL_FORMATS: &str = "all";

/// Filter by format label and sort by normalized artist name, then year.
///
/// The sort is stable and total: artists compare case-insensitively with
/// leading articles stripped, ties break on the effective year (master year
/// when resolved, else the item's own year, with unknown treated as 0).
/// Applying the projection twice is the same as applying it once.
pub fn project(items: &[CollectionItem], selected_format: &str) -> Vec<CollectionItem> {
  let mut out: Vec<CollectionItem> = items
    .iter()
    .filter(|item| {
      selected_format == ALL_FORMATS || item.formats.iter().any(|f| f == selected_format)
    })
    .cloned()
    .collect();

  out.sort_by(compare_items);
  out
}

fn compare_items(a: &CollectionItem, b: &CollectionItem) -> Ordering {
  let artist_a = normalize_artist_name(&a.artist_names()).to_lowercase();
  let artist_b = normalize_artist_name(&b.artist_names()).to_lowercase();

  artist_a
    .cmp(&artist_b)
    .then_with(|| a.sort_year().cmp(&b.sort_year()))
}

/// Strip a leading "The", "A" or "An" article, case-insensitively.
pub fn normalize_artist_name(name: &str) -> String {
  let trimmed = name.trim();

  if let Some((first, rest)) = trimmed.split_once(char::is_whitespace) {
    if ["the", "a", "an"]
      .iter()
      .any(|article| first.eq_ignore_ascii_case(article))
    {
      return rest.trim_start().to_string();
    }
  }

  trimmed.to_string()
}
