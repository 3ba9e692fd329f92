//! Pagination walker that follows `next` cursor links until a full result
//! set is assembled.
//!
//! The cursor is server-supplied and not validated locally, so the walk keeps
//! a visited-link set: a repeated link means the server is looping and the
//! walk aborts with whatever was accumulated so far instead of spinning on
//! the request budget forever.

use std::collections::HashSet;
use std::future::Future;

use color_eyre::Result;
use tracing::{debug, warn};

/// A paginated API response that can be folded into a single materialized
/// result.
pub trait Paged: Sized {
  /// Absolute URL of the next page, if any.
  fn next_link(&self) -> Option<String>;

  /// Fold a later page's items into this one.
  fn merge(&mut self, later: Self);

  /// Rewrite pagination metadata so consumers see one fully materialized
  /// page: one page, per-page equal to the total item count, no links.
  fn collapse(&mut self);
}

/// Result of a pagination walk.
pub struct WalkOutcome<R> {
  pub response: R,
  /// True when the walk stopped because a next link repeated. The response
  /// then holds the partial accumulation.
  pub aborted_on_cycle: bool,
}

/// Fetch `seed` and every page linked after it, returning one aggregated
/// response.
///
/// Pages are fetched strictly sequentially; each next link is only known
/// once the prior response has been consumed. A fetch error aborts the walk
/// and propagates with no partial result. A repeated cursor aborts softly
/// (see `WalkOutcome::aborted_on_cycle`).
pub async fn fetch_all<R, F, Fut>(seed: String, mut fetch: F) -> Result<WalkOutcome<R>>
where
  R: Paged,
  F: FnMut(String) -> Fut,
  Fut: Future<Output = Result<R>>,
{
  let mut visited: HashSet<String> = HashSet::new();
  let mut aborted_on_cycle = false;

  let mut acc = fetch(seed).await?;
  let mut pages = 1u64;

  loop {
    let Some(next) = acc.next_link() else {
      break;
    };
    if !visited.insert(next.clone()) {
      warn!(url = %next, "pagination cursor repeated, aborting walk with partial result");
      aborted_on_cycle = true;
      break;
    }

    let page = fetch(next).await?;
    pages += 1;
    acc.merge(page);
  }

  debug!(pages, aborted_on_cycle, "pagination walk finished");
  acc.collapse();

  Ok(WalkOutcome {
    response: acc,
    aborted_on_cycle,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;

  #[derive(Clone)]
  struct TestPage {
    items: Vec<u64>,
    per_page: usize,
    pages: u64,
    next: Option<String>,
  }

  impl Paged for TestPage {
    fn next_link(&self) -> Option<String> {
      self.next.clone()
    }

    fn merge(&mut self, later: Self) {
      self.items.extend(later.items);
      self.next = later.next;
    }

    fn collapse(&mut self) {
      self.pages = 1;
      self.per_page = self.items.len();
      self.next = None;
    }
  }

  fn fetcher(
    pages: HashMap<String, TestPage>,
    calls: Arc<AtomicUsize>,
  ) -> impl FnMut(String) -> std::future::Ready<Result<TestPage>> {
    move |url: String| {
      calls.fetch_add(1, Ordering::SeqCst);
      std::future::ready(Ok(pages[&url].clone()))
    }
  }

  fn page(start: u64, count: u64, next: Option<&str>) -> TestPage {
    TestPage {
      items: (start..start + count).collect(),
      per_page: 100,
      pages: 2,
      next: next.map(String::from),
    }
  }

  #[tokio::test]
  async fn test_two_pages_collapse_into_one_materialized_result() {
    let mut pages = HashMap::new();
    pages.insert("p1".to_string(), page(0, 100, Some("p2")));
    pages.insert("p2".to_string(), page(100, 37, None));

    let calls = Arc::new(AtomicUsize::new(0));
    let outcome = fetch_all("p1".to_string(), fetcher(pages, Arc::clone(&calls)))
      .await
      .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!outcome.aborted_on_cycle);
    assert_eq!(outcome.response.items.len(), 137);
    assert_eq!(outcome.response.pages, 1);
    assert_eq!(outcome.response.per_page, 137);
    assert_eq!(outcome.response.next, None);
  }

  #[tokio::test]
  async fn test_single_page_issues_one_call() {
    let mut pages = HashMap::new();
    pages.insert("p1".to_string(), page(0, 5, None));

    let calls = Arc::new(AtomicUsize::new(0));
    let outcome = fetch_all("p1".to_string(), fetcher(pages, Arc::clone(&calls)))
      .await
      .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.response.items.len(), 5);
  }

  #[tokio::test]
  async fn test_cursor_cycle_aborts_with_partial_result() {
    // Page 2 loops back to page 1: the walk refetches it once, sees page 1's
    // next link again and aborts.
    let mut pages = HashMap::new();
    pages.insert("p1".to_string(), page(0, 100, Some("p2")));
    pages.insert("p2".to_string(), page(100, 37, Some("p1")));

    let calls = Arc::new(AtomicUsize::new(0));
    let outcome = fetch_all("p1".to_string(), fetcher(pages, Arc::clone(&calls)))
      .await
      .unwrap();

    // ceil(N/P) fetches plus the one that exposes the cycle.
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(outcome.aborted_on_cycle);
    assert_eq!(outcome.response.pages, 1);
    assert!(!outcome.response.items.is_empty());
  }

  #[tokio::test]
  async fn test_fetch_error_propagates_without_partial_result() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in = Arc::clone(&calls);
    let result = fetch_all("p1".to_string(), move |_url: String| {
      calls_in.fetch_add(1, Ordering::SeqCst);
      std::future::ready(Err::<TestPage, _>(color_eyre::eyre::eyre!("boom")))
    })
    .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }
}
