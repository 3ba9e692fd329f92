//! Persistent cache for master release metadata.
//!
//! Master records are expensive to fetch and rarely change, so they are
//! kept in a durable keyed store across sessions:
//! - `SqliteStorage` is the raw table with access-time bookkeeping
//! - `MasterCache` wraps it and absorbs storage failures as cache misses

mod storage;
mod store;

pub use storage::{CacheEntry, CacheStats, SqliteStorage};
pub use store::MasterCache;
