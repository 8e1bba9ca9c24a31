//! Cache store trait and statistics.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobboard_core::{JobBoardResult, Tag, TagSet};

use super::key::CacheKey;
use super::watermark::Watermark;

/// A memoized value and when it was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    pub value: Vec<u8>,
    pub cached_at: DateTime<Utc>,
}

/// Tag-indexed cache store.
///
/// The store owns the tag → entries index. Callers only ever:
/// - memoize a resolved computation together with every tag it depends on
///   ([`TagStore::store`]), and
/// - evict every entry carrying a tag ([`TagStore::invalidate_by_tag`]).
///
/// Implementations must be safe for concurrent use and must make the
/// watermark check in `store` atomic with respect to `invalidate_by_tag`.
#[async_trait]
pub trait TagStore: Send + Sync {
    /// Look up a memoized value.
    async fn lookup(&self, key: &CacheKey) -> JobBoardResult<Option<CachedEntry>>;

    /// Snapshot of the invalidation sequence, taken before a pending
    /// computation reads storage.
    async fn watermark(&self) -> JobBoardResult<Watermark>;

    /// Memoize `value` under `key`, tagged with every tag in `tags`.
    ///
    /// Returns `false` without storing if any tag was invalidated after
    /// `observed`; the value may predate that invalidation.
    async fn store(
        &self,
        key: CacheKey,
        value: Vec<u8>,
        tags: &TagSet,
        observed: Watermark,
    ) -> JobBoardResult<bool>;

    /// Evict every entry carrying `tag` and return how many were evicted.
    ///
    /// Invalidating a tag with no entries is not an error.
    async fn invalidate_by_tag(&self, tag: &Tag) -> JobBoardResult<u64>;

    /// Drop journal records and entries older than the given instants.
    async fn prune(
        &self,
        journal_before: DateTime<Utc>,
        entries_before: DateTime<Utc>,
    ) -> JobBoardResult<PruneReport>;

    async fn stats(&self) -> JobBoardResult<CacheStats>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of lookups that found an entry.
    pub hits: u64,
    /// Number of lookups that found nothing.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Number of distinct tags with at least one entry.
    pub tag_count: u64,
    /// Number of `invalidate_by_tag` calls.
    pub invalidations: u64,
    /// Number of entries evicted by invalidation or pruning.
    pub evictions: u64,
    /// Number of stores refused by the watermark check.
    pub rejected_stores: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Outcome of [`TagStore::prune`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub journal_records: u64,
    pub entries: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }
}
