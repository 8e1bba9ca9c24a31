//! Job Board API - REST layer, webhook receiver and background events
//!
//! Every read goes through [`CachedDb`], which memoizes it in the tag cache
//! under the tags of the entities it touched. Every write commits first and
//! then invalidates the tags it affected before the caller sees success.
//!
//! Identity comes from the edge as headers (see [`middleware`]). Users and
//! organizations are mirrored from the identity provider by signed webhooks
//! that the [`events`] dispatcher applies in the background.

#[macro_use]
mod macros;

pub mod cached_db;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod events;
pub mod jobs;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use cached_db::CachedDb;
pub use config::{ApiConfig, CacheBackend, CacheBackendConfig, StorageBackend};
pub use db::{DbClient, DbConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use events::{DispatcherConfig, EventDispatcher, JobBoardEvent};
pub use middleware::{AuthContext, AuthExtractor, OrgContext, OrgExtractor};
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use state::AppState;
pub use types::*;
