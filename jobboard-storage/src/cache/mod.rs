//! Tag-invalidated cache layer.
//!
//! Cached reads are memoized under a [`CacheKey`] and indexed by the
//! [`Tag`](jobboard_core::Tag)s their correctness depends on. Writes
//! invalidate tags after they commit, evicting every entry that could now
//! be stale.
//!
//! # Contract with callers
//!
//! - Every cached read goes through [`TaggedCache::cached`] with a non-empty
//!   [`TagSet`](jobboard_core::TagSet) taken from
//!   `jobboard_core::tags::reads`, and registers discovered tags on its
//!   [`PendingTags`] handle.
//! - Every write awaits its mutation, then awaits
//!   [`TaggedCache::invalidate`] with the entity's write tags, and fails if
//!   invalidation fails.
//!
//! # Stores
//!
//! The store is injected as `Arc<dyn TagStore>`; nothing here is global.
//! [`InMemoryTagStore`] serves a single process, [`LmdbTagStore`] persists
//! entries and the invalidation journal on disk.
//!
//! # Example
//!
//! ```ignore
//! let cache = TaggedCache::with_defaults(Arc::new(InMemoryTagStore::new()));
//!
//! let listing = cache
//!     .cached(
//!         CacheKey::new("job_listing").arg(id),
//!         reads::published_job_listing(&id),
//!         |pending| async move {
//!             let row = store.job_listing_get_published(&id).await?;
//!             if let Some(row) = &row {
//!                 pending.register(reads::discovered_organization(&row.organization.id));
//!             }
//!             Ok(row)
//!         },
//!     )
//!     .await?
//!     .into_value();
//! ```

pub mod freshness;
pub mod key;
pub mod lmdb;
pub mod memory;
pub mod read_through;
pub mod traits;
pub mod watermark;

pub use freshness::CacheRead;
pub use key::CacheKey;
pub use lmdb::{LmdbCacheError, LmdbTagStore};
pub use memory::InMemoryTagStore;
pub use read_through::{CacheConfig, PendingTags, TaggedCache};
pub use traits::{CacheStats, CachedEntry, PruneReport, TagStore};
pub use watermark::{InvalidationJournal, Watermark};
