//! Shared harness for the jobboard-api integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use jobboard_api::{create_api_router, ApiConfig, AppState, CachedDb, DispatcherConfig, EventDispatcher};
use jobboard_core::{JobListing, JobListingStatus, OrganizationId, UserId};
use jobboard_storage::{InMemoryStore, InMemoryTagStore, TagStore, TaggedCache};
use jobboard_test_utils::fixtures;
use tokio::sync::watch;

/// A `CachedDb` over fresh in-memory stores, with handles to both halves.
pub struct Harness {
    pub db: CachedDb,
    pub store: Arc<InMemoryStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_tag_store(Arc::new(InMemoryTagStore::new()))
    }

    pub fn with_tag_store(tags: Arc<dyn TagStore>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let db = CachedDb::new(store.clone(), TaggedCache::with_defaults(tags));
        Self { db, store }
    }

    pub async fn org(&self, id: &str) -> OrganizationId {
        self.db
            .sync_organization(fixtures::organization(id))
            .await
            .expect("organization sync should succeed")
            .id
    }

    pub async fn user(&self, id: &str) -> UserId {
        self.db
            .sync_user(fixtures::user(id))
            .await
            .expect("user sync should succeed")
            .id
    }

    /// A user with a resume on file, ready to apply.
    pub async fn applicant(&self, id: &str) -> UserId {
        let user = self.user(id).await;
        self.db
            .upsert_resume(fixtures::resume(&user))
            .await
            .expect("resume upload should succeed");
        user
    }

    pub async fn draft(&self, org: &OrganizationId, title: &str) -> JobListing {
        self.db
            .create_job_listing(fixtures::job_listing(org, title))
            .await
            .expect("listing create should succeed")
    }

    pub async fn published(&self, org: &OrganizationId, title: &str) -> JobListing {
        let listing = self.draft(org, title).await;
        self.db
            .set_job_listing_status(org, listing.id, JobListingStatus::Published)
            .await
            .expect("publish should succeed")
    }
}

/// Router plus the shutdown sender that keeps its dispatcher alive.
pub struct TestApp {
    pub router: Router,
    pub harness: Harness,
    pub events: EventDispatcher,
    _shutdown: watch::Sender<bool>,
}

pub fn test_app(config: ApiConfig) -> TestApp {
    let harness = Harness::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (events, _handle) =
        EventDispatcher::spawn(harness.db.clone(), DispatcherConfig::development(), shutdown_rx);
    let router = create_api_router(AppState::new(harness.db.clone(), events.clone(), config));
    TestApp {
        router,
        harness,
        events,
        _shutdown: shutdown_tx,
    }
}

pub fn request(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri)
}

pub fn json_body(value: serde_json::Value) -> Body {
    Body::from(value.to_string())
}

pub async fn read_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    if bytes.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(&bytes).expect("body should be JSON")
}
