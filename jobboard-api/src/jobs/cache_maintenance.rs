//! Cache Maintenance Background Task
//!
//! Periodically prunes the tag cache:
//!
//! - entries whose TTL has elapsed
//! - invalidation journal records older than the retention window
//!
//! Reads already ignore expired entries, so pruning only reclaims space. A
//! failed cycle is logged and retried on the next tick.
//!
//! # Configuration
//!
//! ```rust
//! use jobboard_api::jobs::CacheMaintenanceConfig;
//! use std::time::Duration;
//!
//! let config = CacheMaintenanceConfig {
//!     check_interval: Duration::from_secs(300),
//!     log_empty_cycles: false,
//! };
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::cached_db::CachedDb;
use crate::constants::DEFAULT_CACHE_MAINTENANCE_INTERVAL_SECS;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the cache maintenance task.
#[derive(Debug, Clone)]
pub struct CacheMaintenanceConfig {
    /// How often to prune (default: 300 seconds)
    pub check_interval: Duration,

    /// Log cycles that removed nothing at debug level (default: false)
    pub log_empty_cycles: bool,
}

impl Default for CacheMaintenanceConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(DEFAULT_CACHE_MAINTENANCE_INTERVAL_SECS),
            log_empty_cycles: false,
        }
    }
}

impl CacheMaintenanceConfig {
    /// Create CacheMaintenanceConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `JOBBOARD_CACHE_MAINTENANCE_INTERVAL_SECS`: How often to prune (default: 300)
    /// - `JOBBOARD_CACHE_MAINTENANCE_LOG_EMPTY`: Log empty cycles (default: false)
    pub fn from_env() -> Self {
        let check_interval = Duration::from_secs(
            std::env::var("JOBBOARD_CACHE_MAINTENANCE_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .unwrap_or(DEFAULT_CACHE_MAINTENANCE_INTERVAL_SECS),
        );

        let log_empty_cycles = std::env::var("JOBBOARD_CACHE_MAINTENANCE_LOG_EMPTY")
            .ok()
            .map(|s| s.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            check_interval,
            log_empty_cycles,
        }
    }

    /// Short interval for development and tests.
    pub fn development() -> Self {
        Self {
            check_interval: Duration::from_secs(10),
            log_empty_cycles: true,
        }
    }

    pub fn production() -> Self {
        Self::default()
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for cache maintenance since startup.
#[derive(Debug, Default)]
pub struct CacheMaintenanceMetrics {
    /// Expired cache entries removed
    pub entries_pruned: AtomicU64,

    /// Journal records removed
    pub journal_records_pruned: AtomicU64,

    /// Completed cycles
    pub cycles: AtomicU64,

    /// Cycles that failed
    pub errors: AtomicU64,
}

impl CacheMaintenanceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CacheMaintenanceSnapshot {
        CacheMaintenanceSnapshot {
            entries_pruned: self.entries_pruned.load(Ordering::Relaxed),
            journal_records_pruned: self.journal_records_pruned.load(Ordering::Relaxed),
            cycles: self.cycles.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of maintenance metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheMaintenanceSnapshot {
    pub entries_pruned: u64,
    pub journal_records_pruned: u64,
    pub cycles: u64,
    pub errors: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Prune the cache on an interval until the shutdown signal is received.
///
/// # Example
///
/// ```ignore
/// let (shutdown_tx, shutdown_rx) = watch::channel(false);
/// let handle = tokio::spawn(cache_maintenance_task(db.clone(), config, shutdown_rx));
///
/// let _ = shutdown_tx.send(true);
/// let metrics = handle.await?;
/// ```
pub async fn cache_maintenance_task(
    db: CachedDb,
    config: CacheMaintenanceConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<CacheMaintenanceMetrics> {
    let metrics = Arc::new(CacheMaintenanceMetrics::new());

    let mut prune_interval = interval(config.check_interval);
    prune_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        check_interval_secs = config.check_interval.as_secs(),
        "Cache maintenance task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Cache maintenance task shutting down");
                    break;
                }
            }

            _ = prune_interval.tick() => {
                run_cycle(&db, &config, &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        entries_pruned = snapshot.entries_pruned,
        journal_records_pruned = snapshot.journal_records_pruned,
        cycles = snapshot.cycles,
        errors = snapshot.errors,
        "Cache maintenance task completed"
    );

    metrics
}

/// Perform one prune cycle.
pub async fn run_cycle(
    db: &CachedDb,
    config: &CacheMaintenanceConfig,
    metrics: &CacheMaintenanceMetrics,
) {
    metrics.cycles.fetch_add(1, Ordering::Relaxed);

    match db.prune_cache().await {
        Ok(report) => {
            metrics
                .entries_pruned
                .fetch_add(report.entries, Ordering::Relaxed);
            metrics
                .journal_records_pruned
                .fetch_add(report.journal_records, Ordering::Relaxed);

            if report.entries > 0 || report.journal_records > 0 {
                tracing::info!(
                    entries = report.entries,
                    journal_records = report.journal_records,
                    "Cache maintenance cycle completed"
                );
            } else if config.log_empty_cycles {
                tracing::debug!("Cache maintenance cycle completed with nothing to prune");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Cache maintenance cycle failed");
            metrics.errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobboard_core::UserId;
    use jobboard_storage::{
        CacheConfig, InMemoryStore, InMemoryTagStore, TaggedCache, UserUpsert,
    };

    #[test]
    fn test_default_config() {
        let config = CacheMaintenanceConfig::default();
        assert_eq!(
            config.check_interval,
            Duration::from_secs(DEFAULT_CACHE_MAINTENANCE_INTERVAL_SECS)
        );
        assert!(!config.log_empty_cycles);
    }

    #[test]
    fn test_development_config_is_shorter() {
        let dev = CacheMaintenanceConfig::development();
        let prod = CacheMaintenanceConfig::production();
        assert!(dev.check_interval < prod.check_interval);
    }

    #[tokio::test]
    async fn test_cycle_prunes_expired_entries() {
        let config = CacheConfig {
            entry_ttl: Duration::ZERO,
            journal_retention: Duration::ZERO,
            ..CacheConfig::default()
        };
        let db = CachedDb::new(
            Arc::new(InMemoryStore::new()),
            TaggedCache::new(Arc::new(InMemoryTagStore::new()), config),
        );
        db.sync_user(UserUpsert {
            id: UserId::new("user_1"),
            name: "Ada".to_string(),
            image_url: "https://img.example/ada.png".to_string(),
            email: "ada@example.com".to_string(),
        })
        .await
        .expect("sync should succeed");
        db.user(&UserId::new("user_1"))
            .await
            .expect("read should succeed");
        tokio::time::sleep(Duration::from_millis(5)).await;

        let metrics = CacheMaintenanceMetrics::new();
        run_cycle(&db, &CacheMaintenanceConfig::development(), &metrics).await;

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cycles, 1);
        assert_eq!(snapshot.errors, 0);
        assert!(snapshot.entries_pruned >= 1);
    }

    #[tokio::test]
    async fn test_task_stops_on_shutdown() {
        let db = CachedDb::new(
            Arc::new(InMemoryStore::new()),
            TaggedCache::with_defaults(Arc::new(InMemoryTagStore::new())),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(cache_maintenance_task(
            db,
            CacheMaintenanceConfig::development(),
            shutdown_rx,
        ));

        let _ = shutdown_tx.send(true);
        let metrics = handle.await.expect("task should not panic").snapshot();
        assert_eq!(metrics.errors, 0);
    }
}
