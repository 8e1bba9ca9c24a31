//! Read-through memoization with tag-based invalidation.
//!
//! [`TaggedCache::cached`] is the only way to cache a read, and it takes a
//! [`TagSet`], so a cached read cannot be written without declaring at
//! least one dependency. Tags learned while computing (for example, the
//! organization joined into a listing) are registered on the
//! [`PendingTags`] handle and stored with the entry.
//!
//! Reads degrade rather than fail when the store misbehaves: a lookup or
//! store error is logged and the freshly computed value is returned
//! uncached. Invalidation is the opposite: [`TaggedCache::invalidate`]
//! reports any failure so the enclosing write can fail.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use jobboard_core::{CacheError, JobBoardResult, Tag, TagSet};
use serde::{de::DeserializeOwned, Serialize};

use super::freshness::CacheRead;
use super::key::CacheKey;
use super::traits::{CacheStats, PruneReport, TagStore};

/// Configuration for the tagged cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false, every read goes to storage and nothing is memoized.
    pub enabled: bool,
    /// Entries older than this are treated as misses. A safety net; tag
    /// invalidation is what keeps entries correct.
    pub entry_ttl: Duration,
    /// Journal records older than this are pruned by maintenance.
    pub journal_retention: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            entry_ttl: Duration::from_secs(3600), // 1 hour
            journal_retention: Duration::from_secs(600),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = ttl;
        self
    }

    pub fn with_journal_retention(mut self, retention: Duration) -> Self {
        self.journal_retention = retention;
        self
    }
}

/// Handle through which a pending computation registers tags it discovers.
#[derive(Debug, Clone, Default)]
pub struct PendingTags {
    tags: Arc<Mutex<Vec<Tag>>>,
}

impl PendingTags {
    pub fn register(&self, tag: Tag) {
        self.tags
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .push(tag);
    }

    pub fn register_all(&self, tags: impl IntoIterator<Item = Tag>) {
        self.tags
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .extend(tags);
    }

    fn take(&self) -> Vec<Tag> {
        std::mem::take(&mut *self.tags.lock().unwrap_or_else(|err| err.into_inner()))
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    degraded: AtomicU64,
}

/// Tag-aware read-through cache over an injected [`TagStore`].
#[derive(Clone)]
pub struct TaggedCache {
    store: Arc<dyn TagStore>,
    config: CacheConfig,
    counters: Arc<Counters>,
}

impl TaggedCache {
    pub fn new(store: Arc<dyn TagStore>, config: CacheConfig) -> Self {
        Self {
            store,
            config,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn with_defaults(store: Arc<dyn TagStore>) -> Self {
        Self::new(store, CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn TagStore> {
        &self.store
    }

    /// Return the memoized result of `key`, or run `fetch` and memoize it
    /// under `tags` plus every tag `fetch` registered.
    pub async fn cached<T, F, Fut>(
        &self,
        key: CacheKey,
        tags: TagSet,
        fetch: F,
    ) -> JobBoardResult<CacheRead<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(PendingTags) -> Fut,
        Fut: Future<Output = JobBoardResult<T>>,
    {
        if !self.config.enabled {
            let value = fetch(PendingTags::default()).await?;
            return Ok(CacheRead::from_storage(value));
        }

        if let Some(hit) = self.lookup::<T>(&key).await {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let observed = match self.store.watermark().await {
            Ok(w) => Some(w),
            Err(err) => {
                self.counters.degraded.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(key = %key, error = %err, "Cache watermark unavailable, result will not be memoized");
                None
            }
        };

        let pending = PendingTags::default();
        let value = fetch(pending.clone()).await?;

        let Some(observed) = observed else {
            return Ok(CacheRead::from_storage(value));
        };

        let mut all_tags = tags;
        all_tags.extend(pending.take());

        match serde_json::to_vec(&value) {
            Ok(bytes) => match self.store.store(key.clone(), bytes, &all_tags, observed).await {
                Ok(true) => {
                    tracing::trace!(key = %key, tags = %all_tags, "Memoized read");
                }
                Ok(false) => {
                    tracing::debug!(key = %key, tags = %all_tags, "Read overlapped an invalidation, not memoized");
                }
                Err(err) => {
                    self.counters.degraded.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(key = %key, error = %err, "Failed to memoize read");
                }
            },
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "Failed to serialize read for memoization");
            }
        }

        Ok(CacheRead::from_storage(value))
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<CacheRead<T>> {
        let entry = match self.store.lookup(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(err) => {
                self.counters.degraded.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(key = %key, error = %err, "Cache lookup failed, reading through");
                return None;
            }
        };

        let age = Utc::now()
            .signed_duration_since(entry.cached_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        if age > self.config.entry_ttl {
            return None;
        }

        match serde_json::from_slice::<T>(&entry.value) {
            Ok(value) => Some(CacheRead::from_cache(value)),
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "Discarding undecodable cache entry");
                None
            }
        }
    }

    /// Invalidate a single tag.
    pub async fn invalidate_tag(&self, tag: &Tag) -> JobBoardResult<u64> {
        self.store.invalidate_by_tag(tag).await.map_err(|err| {
            CacheError::InvalidationFailed {
                tag: tag.to_string(),
                reason: err.to_string(),
            }
            .into()
        })
    }

    /// Invalidate every tag in `tags`.
    ///
    /// Every tag is attempted even after a failure; the first failure is
    /// returned.
    pub async fn invalidate(&self, tags: &TagSet) -> JobBoardResult<u64> {
        let mut evicted = 0;
        let mut first_failure = None;
        for tag in tags {
            match self.invalidate_tag(tag).await {
                Ok(n) => evicted += n,
                Err(err) => {
                    tracing::error!(tag = %tag, error = %err, "Cache invalidation failed");
                    if first_failure.is_none() {
                        first_failure = Some(err);
                    }
                }
            }
        }
        match first_failure {
            Some(err) => Err(err),
            None => Ok(evicted),
        }
    }

    /// Drop journal records and entries older than their configured
    /// retention.
    pub async fn prune_expired(&self) -> JobBoardResult<PruneReport> {
        let now = Utc::now();
        let journal_before = now - to_chrono(self.config.journal_retention);
        let entries_before = now - to_chrono(self.config.entry_ttl);
        self.store.prune(journal_before, entries_before).await
    }

    /// Store statistics plus this cache's own hit/miss counters.
    pub async fn stats(&self) -> JobBoardResult<CacheStats> {
        let mut stats = self.store.stats().await?;
        stats.hits = self.counters.hits.load(Ordering::Relaxed);
        stats.misses = self.counters.misses.load(Ordering::Relaxed);
        Ok(stats)
    }

    /// Number of reads that bypassed the store because it failed.
    pub fn degraded_reads(&self) -> u64 {
        self.counters.degraded.load(Ordering::Relaxed)
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::InMemoryTagStore;
    use crate::cache::traits::CachedEntry;
    use crate::cache::watermark::Watermark;
    use async_trait::async_trait;
    use chrono::DateTime;
    use jobboard_core::{global_tag, id_tag, EntityType, OrganizationId, UserId};
    use std::sync::atomic::AtomicUsize;

    fn cache() -> TaggedCache {
        TaggedCache::with_defaults(Arc::new(InMemoryTagStore::new()))
    }

    fn user_tag(id: &str) -> Tag {
        id_tag(EntityType::Users, &UserId::new(id))
    }

    #[tokio::test]
    async fn test_second_read_is_a_hit() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        for expected_hit in [false, true] {
            let read = cache
                .cached(CacheKey::new("user").arg("u1"), TagSet::new(user_tag("u1")), |_| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("Ada".to_string())
                })
                .await
                .expect("cached read should succeed");
            assert_eq!(read.was_cache_hit(), expected_hit);
            assert_eq!(read.into_value(), "Ada");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_discovered_tags_invalidate_entry() {
        let cache = cache();
        let org = OrganizationId::new("org_a");
        let key = CacheKey::new("listing").arg("L1");

        cache
            .cached(key.clone(), TagSet::new(global_tag(EntityType::JobListings)), |pending| {
                let org = org.clone();
                async move {
                    pending.register(id_tag(EntityType::Organizations, &org));
                    Ok(1u32)
                }
            })
            .await
            .expect("cached read should succeed");

        let evicted = cache
            .invalidate_tag(&id_tag(EntityType::Organizations, &org))
            .await
            .expect("invalidate should succeed");
        assert_eq!(evicted, 1);

        let read = cache
            .cached(key, TagSet::new(global_tag(EntityType::JobListings)), |_| async { Ok(2u32) })
            .await
            .expect("cached read should succeed");
        assert!(read.was_cache_miss());
        assert_eq!(read.into_value(), 2);
    }

    #[tokio::test]
    async fn test_fetch_error_is_not_memoized() {
        let cache = cache();
        let key = CacheKey::new("user").arg("u1");
        let err = cache
            .cached::<String, _, _>(key.clone(), TagSet::new(user_tag("u1")), |_| async {
                Err(jobboard_core::JobBoardError::from(
                    jobboard_core::StorageError::LockPoisoned,
                ))
            })
            .await;
        assert!(err.is_err());

        let read = cache
            .cached(key, TagSet::new(user_tag("u1")), |_| async { Ok("ok".to_string()) })
            .await
            .expect("cached read should succeed");
        assert!(read.was_cache_miss());
    }

    #[tokio::test]
    async fn test_disabled_cache_always_reads_through() {
        let cache = TaggedCache::new(
            Arc::new(InMemoryTagStore::new()),
            CacheConfig::default().with_enabled(false),
        );
        for _ in 0..2 {
            let read = cache
                .cached(CacheKey::new("user").arg("u1"), TagSet::new(user_tag("u1")), |_| async {
                    Ok(1u8)
                })
                .await
                .expect("cached read should succeed");
            assert!(read.was_cache_miss());
        }
    }

    /// Store whose every operation fails.
    struct DownStore;

    #[async_trait]
    impl TagStore for DownStore {
        async fn lookup(&self, _key: &CacheKey) -> JobBoardResult<Option<CachedEntry>> {
            Err(CacheError::Unavailable { reason: "down".into() }.into())
        }

        async fn watermark(&self) -> JobBoardResult<Watermark> {
            Err(CacheError::Unavailable { reason: "down".into() }.into())
        }

        async fn store(
            &self,
            _key: CacheKey,
            _value: Vec<u8>,
            _tags: &TagSet,
            _observed: Watermark,
        ) -> JobBoardResult<bool> {
            Err(CacheError::Unavailable { reason: "down".into() }.into())
        }

        async fn invalidate_by_tag(&self, _tag: &Tag) -> JobBoardResult<u64> {
            Err(CacheError::Unavailable { reason: "down".into() }.into())
        }

        async fn prune(
            &self,
            _journal_before: DateTime<Utc>,
            _entries_before: DateTime<Utc>,
        ) -> JobBoardResult<PruneReport> {
            Ok(PruneReport::default())
        }

        async fn stats(&self) -> JobBoardResult<CacheStats> {
            Ok(CacheStats::default())
        }
    }

    #[tokio::test]
    async fn test_reads_degrade_when_store_is_down() {
        let cache = TaggedCache::with_defaults(Arc::new(DownStore));
        let read = cache
            .cached(CacheKey::new("user").arg("u1"), TagSet::new(user_tag("u1")), |_| async {
                Ok("fresh".to_string())
            })
            .await
            .expect("read should succeed without the cache");
        assert_eq!(read.into_value(), "fresh");
        assert!(cache.degraded_reads() >= 2);
    }

    #[tokio::test]
    async fn test_invalidation_failure_is_reported() {
        let cache = TaggedCache::with_defaults(Arc::new(DownStore));
        let tags = TagSet::new(user_tag("u1")).with(global_tag(EntityType::Users));
        let err = cache
            .invalidate(&tags)
            .await
            .expect_err("invalidation against a down store should fail");
        assert!(matches!(
            err,
            jobboard_core::JobBoardError::Cache(CacheError::InvalidationFailed { .. })
        ));
    }
}
