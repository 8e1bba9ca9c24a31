//! API Configuration Module
//!
//! Configuration for CORS, webhook verification and the cache backend.
//! Everything is loaded from `JOBBOARD_*` environment variables with
//! defaults suited to development.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use jobboard_core::{ConfigError, JobBoardResult};
use jobboard_storage::{CacheConfig, InMemoryTagStore, LmdbTagStore, TagStore, TaggedCache};

use crate::constants::{
    DEFAULT_BIND_ADDR, DEFAULT_CACHE_MAINTENANCE_INTERVAL_SECS, DEFAULT_CACHE_TTL_SECS,
    DEFAULT_CORS_MAX_AGE_SECS, DEFAULT_JOURNAL_RETENTION_SECS, DEFAULT_LMDB_MAP_SIZE_MB,
    DEFAULT_LMDB_PATH, DEFAULT_WEBHOOK_TOLERANCE_SECS,
};

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key).and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

fn flag_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    lookup(key)
        .map(|s| match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => default,
        })
        .unwrap_or(default)
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API configuration for the listener, CORS and webhook verification.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: String,

    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    /// Example: "https://jobs.example.com,*.example.com"
    pub cors_origins: Vec<String>,

    /// Whether to allow credentials in CORS requests.
    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    // ========================================================================
    // Webhook Configuration
    // ========================================================================
    /// Identity-provider signing secret (`whsec_...`). Webhooks are rejected
    /// while unset.
    pub webhook_secret: Option<String>,

    /// Maximum age of a signed delivery in seconds.
    pub webhook_tolerance_secs: i64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            // CORS defaults: permissive for development
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
            webhook_secret: None,
            webhook_tolerance_secs: DEFAULT_WEBHOOK_TOLERANCE_SECS,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `JOBBOARD_BIND_ADDR`: Listen address (default: 0.0.0.0:3000)
    /// - `JOBBOARD_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `JOBBOARD_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `JOBBOARD_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `JOBBOARD_WEBHOOK_SECRET`: Identity-provider signing secret
    /// - `JOBBOARD_WEBHOOK_TOLERANCE_SECS`: Accepted clock skew (default: 300)
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let cors_origins = lookup("JOBBOARD_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let webhook_secret = lookup("JOBBOARD_WEBHOOK_SECRET")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Self {
            bind_addr: lookup("JOBBOARD_BIND_ADDR").unwrap_or(defaults.bind_addr),
            cors_origins,
            cors_allow_credentials: flag_or(&lookup, "JOBBOARD_CORS_ALLOW_CREDENTIALS", false),
            cors_max_age_secs: parse_or(
                &lookup,
                "JOBBOARD_CORS_MAX_AGE_SECS",
                defaults.cors_max_age_secs,
            ),
            webhook_secret,
            webhook_tolerance_secs: parse_or(
                &lookup,
                "JOBBOARD_WEBHOOK_TOLERANCE_SECS",
                defaults.webhook_tolerance_secs,
            ),
        }
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // Wildcard subdomains: *.example.com
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain
                        .strip_suffix(pattern)
                        .is_some_and(|sub| sub.ends_with('.'));
                }
            }
            false
        })
    }
}

// ============================================================================
// STORAGE CONFIGURATION
// ============================================================================

/// Which [`jobboard_storage::JobBoardStore`] serves the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Postgres through the connection pool in [`crate::db`].
    Postgres,
    /// Process-local tables, for development and demos.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(ConfigError::InvalidValue {
                field: "JOBBOARD_STORAGE_BACKEND".to_string(),
                value: other.to_string(),
                reason: "expected postgres or memory".to_string(),
            }),
        }
    }
}

impl StorageBackend {
    /// `JOBBOARD_STORAGE_BACKEND`: `postgres` (default) or `memory`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        match lookup("JOBBOARD_STORAGE_BACKEND") {
            Some(value) => value.parse(),
            None => Ok(StorageBackend::Postgres),
        }
    }
}

// ============================================================================
// CACHE CONFIGURATION
// ============================================================================

/// Which [`TagStore`] backs the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    /// Process-local, lost on restart.
    Memory,
    /// LMDB environment on local disk.
    Lmdb,
}

impl FromStr for CacheBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "lmdb" => Ok(CacheBackend::Lmdb),
            other => Err(ConfigError::InvalidValue {
                field: "JOBBOARD_CACHE_BACKEND".to_string(),
                value: other.to_string(),
                reason: "expected memory or lmdb".to_string(),
            }),
        }
    }
}

/// Cache backend selection plus the [`CacheConfig`] knobs.
#[derive(Debug, Clone)]
pub struct CacheBackendConfig {
    pub backend: CacheBackend,
    pub enabled: bool,
    pub lmdb_path: PathBuf,
    pub lmdb_map_size_mb: usize,
    pub entry_ttl: Duration,
    pub journal_retention: Duration,
    /// How often the maintenance job prunes expired entries.
    pub maintenance_interval: Duration,
}

impl Default for CacheBackendConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            enabled: true,
            lmdb_path: PathBuf::from(DEFAULT_LMDB_PATH),
            lmdb_map_size_mb: DEFAULT_LMDB_MAP_SIZE_MB,
            entry_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            journal_retention: Duration::from_secs(DEFAULT_JOURNAL_RETENTION_SECS),
            maintenance_interval: Duration::from_secs(DEFAULT_CACHE_MAINTENANCE_INTERVAL_SECS),
        }
    }
}

impl CacheBackendConfig {
    /// Load from environment variables.
    ///
    /// - `JOBBOARD_CACHE_BACKEND`: `memory` (default) or `lmdb`
    /// - `JOBBOARD_CACHE_ENABLED`: "false" disables memoization
    /// - `JOBBOARD_CACHE_PATH`: LMDB directory (default: ./data/cache)
    /// - `JOBBOARD_CACHE_MAP_SIZE_MB`: LMDB map size (default: 1024)
    /// - `JOBBOARD_CACHE_TTL_SECS`: entry time-to-live (default: 3600)
    /// - `JOBBOARD_CACHE_JOURNAL_RETENTION_SECS`: (default: 600)
    /// - `JOBBOARD_CACHE_MAINTENANCE_INTERVAL_SECS`: (default: 300)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let backend = match lookup("JOBBOARD_CACHE_BACKEND") {
            Some(value) => value.parse()?,
            None => defaults.backend,
        };

        let secs = |key: &str, default: Duration| {
            Duration::from_secs(parse_or(&lookup, key, default.as_secs()))
        };

        let config = Self {
            backend,
            enabled: flag_or(&lookup, "JOBBOARD_CACHE_ENABLED", defaults.enabled),
            lmdb_path: lookup("JOBBOARD_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.lmdb_path),
            lmdb_map_size_mb: parse_or(
                &lookup,
                "JOBBOARD_CACHE_MAP_SIZE_MB",
                defaults.lmdb_map_size_mb,
            ),
            entry_ttl: secs("JOBBOARD_CACHE_TTL_SECS", defaults.entry_ttl),
            journal_retention: secs(
                "JOBBOARD_CACHE_JOURNAL_RETENTION_SECS",
                defaults.journal_retention,
            ),
            maintenance_interval: secs(
                "JOBBOARD_CACHE_MAINTENANCE_INTERVAL_SECS",
                defaults.maintenance_interval,
            ),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == CacheBackend::Lmdb && self.lmdb_map_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "JOBBOARD_CACHE_MAP_SIZE_MB".to_string(),
                value: "0".to_string(),
                reason: "map size must be positive".to_string(),
            });
        }
        if self.maintenance_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "JOBBOARD_CACHE_MAINTENANCE_INTERVAL_SECS".to_string(),
                value: "0".to_string(),
                reason: "interval must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_enabled(self.enabled)
            .with_ttl(self.entry_ttl)
            .with_journal_retention(self.journal_retention)
    }

    /// Open the configured store and wrap it in a [`TaggedCache`].
    pub fn build(&self) -> JobBoardResult<TaggedCache> {
        let store: Arc<dyn TagStore> = match self.backend {
            CacheBackend::Memory => Arc::new(InMemoryTagStore::new()),
            CacheBackend::Lmdb => {
                tracing::info!(
                    path = %self.lmdb_path.display(),
                    map_size_mb = self.lmdb_map_size_mb,
                    "Opening LMDB cache store"
                );
                Arc::new(LmdbTagStore::new(&self.lmdb_path, self.lmdb_map_size_mb)?)
            }
        };
        Ok(TaggedCache::new(store, self.cache_config()))
    }
}
