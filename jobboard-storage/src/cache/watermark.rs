//! Watermark and invalidation journal.
//!
//! Every `invalidate_by_tag` call advances the store's sequence and records
//! the sequence at which that tag was last invalidated. A pending
//! computation snapshots the watermark before it reads storage; when it
//! resolves, the store refuses to memoize it if any of its tags was
//! invalidated after that snapshot. This closes the window where a read
//! started before a write, finished after the write's invalidation, and
//! would otherwise cache pre-write data under an already-invalidated tag.

use chrono::{DateTime, Utc};
use jobboard_core::{Tag, TagSet};
use std::collections::HashMap;

/// A point in the store's invalidation history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Watermark {
    /// Monotonically increasing; each invalidation increments it.
    pub sequence: u64,
}

impl Watermark {
    pub fn new(sequence: u64) -> Self {
        Self { sequence }
    }
}

#[derive(Debug, Clone, Copy)]
struct TagRecord {
    sequence: u64,
    at: DateTime<Utc>,
}

/// Per-tag record of the last invalidation, owned by a store.
///
/// Not synchronized: stores guard it together with their tag index so the
/// check in [`InvalidationJournal::invalidated_since`] and the insert that
/// follows it are atomic with respect to invalidation.
#[derive(Debug, Default)]
pub struct InvalidationJournal {
    sequence: u64,
    /// Sequences at or below the floor have been pruned.
    floor: u64,
    tags: HashMap<String, TagRecord>,
}

impl InvalidationJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Watermark {
        Watermark::new(self.sequence)
    }

    /// Record an invalidation of `tag` and return the new watermark.
    pub fn record(&mut self, tag: &Tag) -> Watermark {
        self.sequence += 1;
        let now = Utc::now();
        self.tags.insert(
            tag.as_str().to_string(),
            TagRecord {
                sequence: self.sequence,
                at: now,
            },
        );
        Watermark::new(self.sequence)
    }

    /// True if any of `tags` was invalidated after `observed`, or if the
    /// history needed to answer has been pruned.
    pub fn invalidated_since(&self, tags: &TagSet, observed: &Watermark) -> bool {
        if observed.sequence < self.floor {
            return true;
        }
        tags.iter().any(|tag| {
            self.tags
                .get(tag.as_str())
                .is_some_and(|r| r.sequence > observed.sequence)
        })
    }

    /// Drop records older than `before`, raising the floor past them.
    pub fn prune(&mut self, before: DateTime<Utc>) -> usize {
        let mut floor = self.floor;
        let len_before = self.tags.len();
        self.tags.retain(|_, record| {
            if record.at < before {
                floor = floor.max(record.sequence);
                false
            } else {
                true
            }
        });
        self.floor = floor;
        len_before - self.tags.len()
    }
}
