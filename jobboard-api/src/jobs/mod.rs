//! Background Jobs
//!
//! - `cache_maintenance`: prunes expired cache entries and old invalidation
//!   journal records
//!
//! Event handling runs in its own worker, see [`crate::events`].
//!
//! # Usage
//!
//! ```ignore
//! use jobboard_api::jobs::{cache_maintenance_task, CacheMaintenanceConfig};
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! tokio::spawn(cache_maintenance_task(db.clone(), CacheMaintenanceConfig::from_env(), shutdown_rx));
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! ```

pub mod cache_maintenance;

pub use cache_maintenance::{
    cache_maintenance_task, CacheMaintenanceConfig, CacheMaintenanceMetrics,
    CacheMaintenanceSnapshot,
};
