//! LMDB-backed tag store.
//!
//! Uses the heed crate (Rust bindings for LMDB) so memoized reads and the
//! invalidation journal survive process restarts.
//!
//! # Layout
//!
//! | Database    | Key                       | Value                                        |
//! |-------------|---------------------------|----------------------------------------------|
//! | `entries`   | encoded [`CacheKey`]      | `[cached_at ms: i64 LE][tag count: u32 LE]([len: u32 LE][tag])*[value]` |
//! | `tag_index` | `tag 0xFF key`            | empty                                        |
//! | `journal`   | tag                       | `[sequence: u64 BE][invalidated_at ms: i64 LE]` |
//! | `meta`      | `sequence` / `floor`      | `u64 BE`                                     |
//!
//! LMDB rejects keys longer than 511 bytes. A tag or encoded key longer
//! than 240 bytes is stored under `0xFE` followed by its SHA-256
//! digest, so every index row fits whatever the length of the ids behind it.
//!
//! LMDB admits one write transaction at a time, so the watermark check and
//! the insert in `store` run in the same transaction as each other and
//! never interleave with an invalidation.

use std::borrow::Cow;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};
use jobboard_core::{CacheError, JobBoardError, JobBoardResult, Tag, TagSet};
use sha2::{Digest, Sha256};

use super::key::{CacheKey, SEPARATOR};
use super::traits::{CacheStats, CachedEntry, PruneReport, TagStore};
use super::watermark::Watermark;

const META_SEQUENCE: &[u8] = b"sequence";
const META_FLOOR: &[u8] = b"floor";

/// Longest tag or encoded key stored as-is. Two inline slots and the
/// separator stay under LMDB's 511-byte key limit.
const MAX_INLINE_KEY: usize = 240;

/// Leads a digest slot. Never the first byte of a UTF-8 tag or of an
/// encoded key, which starts with the operation name.
const DIGEST_MARKER: u8 = 0xFE;
const DIGEST_SLOT_LEN: usize = 33;

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    #[error("Failed to open database {name}: {reason}")]
    DbOpen { name: &'static str, reason: String },

    #[error("Transaction error during {operation}: {reason}")]
    Transaction {
        operation: &'static str,
        reason: String,
    },

    #[error("Corrupt record in {db}")]
    Corrupt { db: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for JobBoardError {
    fn from(e: LmdbCacheError) -> Self {
        let operation = match &e {
            LmdbCacheError::EnvOpen(_) | LmdbCacheError::DbOpen { .. } | LmdbCacheError::Io(_) => {
                "open"
            }
            LmdbCacheError::Transaction { operation, .. } => operation,
            LmdbCacheError::Corrupt { .. } => "decode",
        };
        JobBoardError::Cache(CacheError::Lmdb {
            operation: operation.to_string(),
            reason: e.to_string(),
        })
    }
}

fn txn_err(operation: &'static str) -> impl FnOnce(heed::Error) -> LmdbCacheError {
    move |e| LmdbCacheError::Transaction {
        operation,
        reason: e.to_string(),
    }
}

/// LMDB-backed tag store.
///
/// # Example
///
/// ```ignore
/// let store = LmdbTagStore::new("/var/cache/jobboard", 256)?;
/// let cache = TaggedCache::new(Arc::new(store), CacheConfig::default());
/// ```
pub struct LmdbTagStore {
    env: Env,
    entries: Database<Bytes, Bytes>,
    index: Database<Bytes, Bytes>,
    journal: Database<Bytes, Bytes>,
    meta: Database<Bytes, Bytes>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
    evictions: AtomicU64,
    rejected_stores: AtomicU64,
}

impl LmdbTagStore {
    /// Open (or create) a store in `path` with a map of `max_size_mb`.
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(4)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_err("open"))?;
        let mut open = |name: &'static str| -> Result<Database<Bytes, Bytes>, LmdbCacheError> {
            env.create_database(&mut wtxn, Some(name))
                .map_err(|e| LmdbCacheError::DbOpen {
                    name,
                    reason: e.to_string(),
                })
        };
        let entries = open("entries")?;
        let index = open("tag_index")?;
        let journal = open("journal")?;
        let meta = open("meta")?;
        wtxn.commit().map_err(txn_err("open"))?;

        Ok(Self {
            env,
            entries,
            index,
            journal,
            meta,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            rejected_stores: AtomicU64::new(0),
        })
    }

    fn read_u64(&self, txn: &RoTxn, key: &[u8]) -> Result<u64, LmdbCacheError> {
        match self.meta.get(txn, key).map_err(txn_err("meta"))? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .try_into()
                    .map_err(|_| LmdbCacheError::Corrupt { db: "meta" })?;
                Ok(u64::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }

    fn last_invalidated(&self, txn: &RoTxn, tag: &[u8]) -> Result<Option<u64>, LmdbCacheError> {
        match self.journal.get(txn, tag).map_err(txn_err("journal"))? {
            Some(bytes) if bytes.len() == 16 => {
                let raw: [u8; 8] = bytes[0..8]
                    .try_into()
                    .map_err(|_| LmdbCacheError::Corrupt { db: "journal" })?;
                Ok(Some(u64::from_be_bytes(raw)))
            }
            Some(_) => Err(LmdbCacheError::Corrupt { db: "journal" }),
            None => Ok(None),
        }
    }

    /// Delete an entry and its index rows inside `wtxn`.
    fn evict(&self, wtxn: &mut RwTxn, key: &[u8]) -> Result<bool, LmdbCacheError> {
        let tags = match self.entries.get(wtxn, key).map_err(txn_err("evict"))? {
            Some(bytes) => decode_entry(bytes)?.tags,
            None => return Ok(false),
        };
        for tag in tags {
            self.index
                .delete(wtxn, &index_key(&slot(&tag), key))
                .map_err(txn_err("evict"))?;
        }
        self.entries.delete(wtxn, key).map_err(txn_err("evict"))?;
        self.evictions.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }
}

/// The LMDB key a tag or an encoded cache key is stored under.
fn slot(bytes: &[u8]) -> Cow<'_, [u8]> {
    if bytes.len() <= MAX_INLINE_KEY {
        return Cow::Borrowed(bytes);
    }
    let mut out = Vec::with_capacity(DIGEST_SLOT_LEN);
    out.push(DIGEST_MARKER);
    out.extend_from_slice(&Sha256::digest(bytes));
    Cow::Owned(out)
}

/// Tag slot of a `tag_index` row.
fn index_tag(index_key: &[u8]) -> &[u8] {
    if index_key.first() == Some(&DIGEST_MARKER) {
        return &index_key[..DIGEST_SLOT_LEN.min(index_key.len())];
    }
    index_key.split(|b| *b == SEPARATOR).next().unwrap_or_default()
}

fn index_key(tag: &[u8], key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(tag.len() + 1 + key.len());
    out.extend_from_slice(tag);
    out.push(SEPARATOR);
    out.extend_from_slice(key);
    out
}

struct DecodedEntry {
    cached_at: DateTime<Utc>,
    tags: Vec<Vec<u8>>,
    value_offset: usize,
}

fn encode_entry(cached_at: DateTime<Utc>, tags: &TagSet, value: &[u8]) -> Vec<u8> {
    let tag_bytes: usize = tags.iter().map(|t| t.as_bytes().len() + 4).sum();
    let mut out = Vec::with_capacity(12 + tag_bytes + value.len());
    out.extend_from_slice(&cached_at.timestamp_millis().to_le_bytes());
    out.extend_from_slice(&(tags.len() as u32).to_le_bytes());
    for tag in tags {
        out.extend_from_slice(&(tag.as_bytes().len() as u32).to_le_bytes());
        out.extend_from_slice(tag.as_bytes());
    }
    out.extend_from_slice(value);
    out
}

fn decode_entry(bytes: &[u8]) -> Result<DecodedEntry, LmdbCacheError> {
    let corrupt = || LmdbCacheError::Corrupt { db: "entries" };
    let read_u32 = |at: usize| -> Result<u32, LmdbCacheError> {
        let raw: [u8; 4] = bytes
            .get(at..at + 4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(corrupt)?;
        Ok(u32::from_le_bytes(raw))
    };

    let ts: [u8; 8] = bytes
        .get(0..8)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(corrupt)?;
    let cached_at = DateTime::from_timestamp_millis(i64::from_le_bytes(ts)).ok_or_else(corrupt)?;

    let count = read_u32(8)? as usize;
    let mut offset = 12;
    let mut tags = Vec::with_capacity(count);
    for _ in 0..count {
        let len = read_u32(offset)? as usize;
        offset += 4;
        let tag = bytes.get(offset..offset + len).ok_or_else(corrupt)?;
        tags.push(tag.to_vec());
        offset += len;
    }

    Ok(DecodedEntry {
        cached_at,
        tags,
        value_offset: offset,
    })
}

#[async_trait]
impl TagStore for LmdbTagStore {
    async fn lookup(&self, key: &CacheKey) -> JobBoardResult<Option<CachedEntry>> {
        let rtxn = self.env.read_txn().map_err(txn_err("lookup"))?;
        let encoded = key.encode();
        match self.entries.get(&rtxn, &slot(&encoded)).map_err(txn_err("lookup"))? {
            Some(bytes) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                let decoded = decode_entry(bytes)?;
                Ok(Some(CachedEntry {
                    value: bytes[decoded.value_offset..].to_vec(),
                    cached_at: decoded.cached_at,
                }))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn watermark(&self) -> JobBoardResult<Watermark> {
        let rtxn = self.env.read_txn().map_err(txn_err("watermark"))?;
        Ok(Watermark::new(self.read_u64(&rtxn, META_SEQUENCE)?))
    }

    async fn store(
        &self,
        key: CacheKey,
        value: Vec<u8>,
        tags: &TagSet,
        observed: Watermark,
    ) -> JobBoardResult<bool> {
        let mut wtxn = self.env.write_txn().map_err(txn_err("store"))?;

        let mut refused = observed.sequence < self.read_u64(&wtxn, META_FLOOR)?;
        if !refused {
            for tag in tags {
                if self
                    .last_invalidated(&wtxn, &slot(tag.as_bytes()))?
                    .is_some_and(|seq| seq > observed.sequence)
                {
                    refused = true;
                    break;
                }
            }
        }
        if refused {
            self.rejected_stores.fetch_add(1, Ordering::Relaxed);
            wtxn.abort();
            return Ok(false);
        }

        let encoded = key.encode();
        let key_slot = slot(&encoded);
        self.evict(&mut wtxn, &key_slot)?;
        for tag in tags {
            self.index
                .put(&mut wtxn, &index_key(&slot(tag.as_bytes()), &key_slot), &[])
                .map_err(txn_err("store"))?;
        }
        self.entries
            .put(&mut wtxn, &key_slot, &encode_entry(Utc::now(), tags, &value))
            .map_err(txn_err("store"))?;
        wtxn.commit().map_err(txn_err("store"))?;
        Ok(true)
    }

    async fn invalidate_by_tag(&self, tag: &Tag) -> JobBoardResult<u64> {
        let mut wtxn = self.env.write_txn().map_err(txn_err("invalidate"))?;

        let sequence = self.read_u64(&wtxn, META_SEQUENCE)? + 1;
        self.meta
            .put(&mut wtxn, META_SEQUENCE, &sequence.to_be_bytes())
            .map_err(txn_err("invalidate"))?;
        let mut record = Vec::with_capacity(16);
        record.extend_from_slice(&sequence.to_be_bytes());
        record.extend_from_slice(&Utc::now().timestamp_millis().to_le_bytes());
        let tag_slot = slot(tag.as_bytes());
        self.journal
            .put(&mut wtxn, &tag_slot, &record)
            .map_err(txn_err("invalidate"))?;

        let prefix = index_key(&tag_slot, &[]);
        let keys: Vec<Vec<u8>> = {
            let iter = self
                .index
                .prefix_iter(&wtxn, &prefix)
                .map_err(txn_err("invalidate"))?;
            let mut keys = Vec::new();
            for row in iter {
                let (index_key, _) = row.map_err(txn_err("invalidate"))?;
                keys.push(index_key[prefix.len()..].to_vec());
            }
            keys
        };

        let mut evicted = 0;
        for key in &keys {
            if self.evict(&mut wtxn, key)? {
                evicted += 1;
            }
        }
        wtxn.commit().map_err(txn_err("invalidate"))?;
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        Ok(evicted)
    }

    async fn prune(
        &self,
        journal_before: DateTime<Utc>,
        entries_before: DateTime<Utc>,
    ) -> JobBoardResult<PruneReport> {
        let mut wtxn = self.env.write_txn().map_err(txn_err("prune"))?;
        let cutoff = journal_before.timestamp_millis();

        let mut floor = self.read_u64(&wtxn, META_FLOOR)?;
        let stale_tags: Vec<Vec<u8>> = {
            let mut stale = Vec::new();
            for row in self.journal.iter(&wtxn).map_err(txn_err("prune"))? {
                let (tag, record) = row.map_err(txn_err("prune"))?;
                let (seq, at) = match (record.get(0..8), record.get(8..16)) {
                    (Some(seq), Some(at)) => (
                        u64::from_be_bytes(seq.try_into().map_err(|_| LmdbCacheError::Corrupt { db: "journal" })?),
                        i64::from_le_bytes(at.try_into().map_err(|_| LmdbCacheError::Corrupt { db: "journal" })?),
                    ),
                    _ => return Err(LmdbCacheError::Corrupt { db: "journal" }.into()),
                };
                if at < cutoff {
                    floor = floor.max(seq);
                    stale.push(tag.to_vec());
                }
            }
            stale
        };
        for tag in &stale_tags {
            self.journal.delete(&mut wtxn, tag).map_err(txn_err("prune"))?;
        }
        self.meta
            .put(&mut wtxn, META_FLOOR, &floor.to_be_bytes())
            .map_err(txn_err("prune"))?;

        let expired: Vec<Vec<u8>> = {
            let mut expired = Vec::new();
            for row in self.entries.iter(&wtxn).map_err(txn_err("prune"))? {
                let (key, bytes) = row.map_err(txn_err("prune"))?;
                if decode_entry(bytes)?.cached_at < entries_before {
                    expired.push(key.to_vec());
                }
            }
            expired
        };
        let mut entries = 0;
        for key in &expired {
            if self.evict(&mut wtxn, key)? {
                entries += 1;
            }
        }
        wtxn.commit().map_err(txn_err("prune"))?;

        Ok(PruneReport {
            journal_records: stale_tags.len() as u64,
            entries,
        })
    }

    async fn stats(&self) -> JobBoardResult<CacheStats> {
        let rtxn = self.env.read_txn().map_err(txn_err("stats"))?;
        let entry_count = self.entries.len(&rtxn).map_err(txn_err("stats"))?;

        let mut tag_count = 0u64;
        let mut last_tag: Option<Vec<u8>> = None;
        for row in self.index.iter(&rtxn).map_err(txn_err("stats"))? {
            let (key, _) = row.map_err(txn_err("stats"))?;
            let tag = index_tag(key);
            if last_tag.as_deref() != Some(tag) {
                tag_count += 1;
                last_tag = Some(tag.to_vec());
            }
        }

        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count,
            tag_count,
            invalidations: self.invalidations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            rejected_stores: self.rejected_stores.load(Ordering::Relaxed),
        })
    }
}
