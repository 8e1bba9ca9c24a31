//! In-process tag store.
//!
//! Entries and the tag index live in `DashMap`s so lookups never contend with
//! each other. Stores, invalidations and pruning serialize on the journal
//! mutex, which makes the watermark check and the insert that follows it a
//! single step relative to any invalidation.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use jobboard_core::{JobBoardResult, Tag, TagSet};

use super::key::CacheKey;
use super::traits::{CacheStats, CachedEntry, PruneReport, TagStore};
use super::watermark::{InvalidationJournal, Watermark};

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    cached_at: DateTime<Utc>,
    tags: Vec<String>,
}

/// Tag store held entirely in process memory.
#[derive(Debug, Default)]
pub struct InMemoryTagStore {
    entries: DashMap<CacheKey, Entry>,
    index: DashMap<String, HashSet<CacheKey>>,
    journal: Mutex<InvalidationJournal>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
    evictions: AtomicU64,
    rejected_stores: AtomicU64,
}

impl InMemoryTagStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn journal(&self) -> MutexGuard<'_, InvalidationJournal> {
        self.journal.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Remove an entry and unlink it from every tag it carried.
    fn evict(&self, key: &CacheKey) -> bool {
        let Some((_, entry)) = self.entries.remove(key) else {
            return false;
        };
        for tag in &entry.tags {
            if let Some(mut keys) = self.index.get_mut(tag) {
                keys.remove(key);
            }
            self.index.remove_if(tag, |_, keys| keys.is_empty());
        }
        self.evictions.fetch_add(1, Ordering::Relaxed);
        true
    }
}

#[async_trait]
impl TagStore for InMemoryTagStore {
    async fn lookup(&self, key: &CacheKey) -> JobBoardResult<Option<CachedEntry>> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(CachedEntry {
                    value: entry.value.clone(),
                    cached_at: entry.cached_at,
                }))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn watermark(&self) -> JobBoardResult<Watermark> {
        Ok(self.journal().current())
    }

    async fn store(
        &self,
        key: CacheKey,
        value: Vec<u8>,
        tags: &TagSet,
        observed: Watermark,
    ) -> JobBoardResult<bool> {
        let journal = self.journal();
        if journal.invalidated_since(tags, &observed) {
            self.rejected_stores.fetch_add(1, Ordering::Relaxed);
            return Ok(false);
        }

        self.evict(&key);
        let tag_names: Vec<String> = tags.iter().map(|t| t.as_str().to_string()).collect();
        for tag in &tag_names {
            self.index.entry(tag.clone()).or_default().insert(key.clone());
        }
        self.entries.insert(
            key,
            Entry {
                value,
                cached_at: Utc::now(),
                tags: tag_names,
            },
        );
        drop(journal);
        Ok(true)
    }

    async fn invalidate_by_tag(&self, tag: &Tag) -> JobBoardResult<u64> {
        let mut journal = self.journal();
        journal.record(tag);
        self.invalidations.fetch_add(1, Ordering::Relaxed);

        let keys = self
            .index
            .remove(tag.as_str())
            .map(|(_, keys)| keys)
            .unwrap_or_default();
        let mut evicted = 0;
        for key in &keys {
            if self.evict(key) {
                evicted += 1;
            }
        }
        drop(journal);
        Ok(evicted)
    }

    async fn prune(
        &self,
        journal_before: DateTime<Utc>,
        entries_before: DateTime<Utc>,
    ) -> JobBoardResult<PruneReport> {
        let mut journal = self.journal();
        let journal_records = journal.prune(journal_before) as u64;

        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|entry| entry.cached_at < entries_before)
            .map(|entry| entry.key().clone())
            .collect();
        let mut entries = 0;
        for key in &expired {
            if self.evict(key) {
                entries += 1;
            }
        }
        drop(journal);

        Ok(PruneReport {
            journal_records,
            entries,
        })
    }

    async fn stats(&self) -> JobBoardResult<CacheStats> {
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.entries.len() as u64,
            tag_count: self.index.len() as u64,
            invalidations: self.invalidations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            rejected_stores: self.rejected_stores.load(Ordering::Relaxed),
        })
    }
}
