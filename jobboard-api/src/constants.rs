//! Constants for the job board API
//!
//! Default values used by the config structs. Centralizing them keeps the
//! `from_env` fallbacks and the tests in agreement.

// ============================================================================
// SERVER
// ============================================================================

/// Default bind address
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

// ============================================================================
// CORS
// ============================================================================

/// Default CORS max age in seconds (24 hours)
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86400;

// ============================================================================
// AUTH HEADERS
// ============================================================================

/// Header carrying the signed-in user's id, set by the auth edge.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the active organization's id, set by the auth edge.
pub const ORG_ID_HEADER: &str = "x-org-id";

// ============================================================================
// WEBHOOKS
// ============================================================================

/// Maximum accepted clock skew for signed webhook deliveries (5 minutes)
pub const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Prefix of identity-provider webhook signing secrets
pub const WEBHOOK_SECRET_PREFIX: &str = "whsec_";

// ============================================================================
// CACHE
// ============================================================================

/// Default entry time-to-live in seconds (1 hour)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Default invalidation journal retention in seconds (10 minutes)
pub const DEFAULT_JOURNAL_RETENTION_SECS: u64 = 600;

/// Default LMDB map size in megabytes
pub const DEFAULT_LMDB_MAP_SIZE_MB: usize = 1024;

/// Default LMDB directory
pub const DEFAULT_LMDB_PATH: &str = "./data/cache";

/// Default interval between cache maintenance runs in seconds
pub const DEFAULT_CACHE_MAINTENANCE_INTERVAL_SECS: u64 = 300;

// ============================================================================
// EVENTS
// ============================================================================

/// Default capacity of the event queue
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1024;

/// Default number of attempts per event handler
pub const DEFAULT_EVENT_MAX_ATTEMPTS: u32 = 5;

/// Default first retry delay in milliseconds
pub const DEFAULT_EVENT_BASE_BACKOFF_MS: u64 = 200;

/// Default upper bound on retry delay in milliseconds
pub const DEFAULT_EVENT_MAX_BACKOFF_MS: u64 = 10_000;

// ============================================================================
// DATABASE
// ============================================================================

/// Default connection pool size
pub const DEFAULT_DB_POOL_SIZE: usize = 16;

/// Default pool wait timeout in seconds
pub const DEFAULT_DB_TIMEOUT_SECS: u64 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_tolerance_is_five_minutes() {
        assert_eq!(DEFAULT_WEBHOOK_TOLERANCE_SECS, 5 * 60);
    }

    #[test]
    fn test_backoff_bounds_are_ordered() {
        assert!(DEFAULT_EVENT_BASE_BACKOFF_MS < DEFAULT_EVENT_MAX_BACKOFF_MS);
        assert!(DEFAULT_EVENT_MAX_ATTEMPTS >= 1);
    }

    #[test]
    fn test_journal_outlives_nothing_longer_than_ttl() {
        assert!(DEFAULT_JOURNAL_RETENTION_SECS <= DEFAULT_CACHE_TTL_SECS);
    }
}
