//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use crate::cached_db::CachedDb;
use crate::config::ApiConfig;
use crate::events::EventDispatcher;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Storage behind the tag-invalidated cache. Routes never reach the
    /// store directly.
    pub db: CachedDb,
    /// Queue for webhook sync and application side effects.
    pub events: EventDispatcher,
    pub config: Arc<ApiConfig>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(db: CachedDb, events: EventDispatcher, config: ApiConfig) -> Self {
        Self {
            db,
            events,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }
}

crate::impl_from_ref!(CachedDb, db);
crate::impl_from_ref!(EventDispatcher, events);
crate::impl_from_ref!(Arc<ApiConfig>, config);
crate::impl_from_ref!(Instant, start_time);
