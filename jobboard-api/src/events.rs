//! Background Events
//!
//! Identity-provider sync and application side effects run off the request
//! path. Routes and the webhook receiver enqueue a [`JobBoardEvent`]; one
//! worker task drains the queue through [`CachedDb`], so every write it
//! makes follows the same commit-then-invalidate convention as a request.
//!
//! Failed handlers are retried with exponential backoff when the failure is
//! transient (storage or cache unavailable). Anything else is logged and
//! dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use jobboard_core::{
    ApplicationKey, JobBoardError, JobBoardResult, OrganizationId, StorageError, UserId,
};
use jobboard_storage::{OrganizationUpsert, UserUpsert};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::cached_db::CachedDb;
use crate::constants::{
    DEFAULT_EVENT_BASE_BACKOFF_MS, DEFAULT_EVENT_MAX_ATTEMPTS, DEFAULT_EVENT_MAX_BACKOFF_MS,
    DEFAULT_EVENT_QUEUE_CAPACITY,
};
use crate::error::{ApiError, ApiResult};
use crate::telemetry::with_metrics;

// ============================================================================
// EVENTS
// ============================================================================

/// Work queued for the background worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobBoardEvent {
    UserCreated(UserUpsert),
    UserUpdated(UserUpsert),
    UserDeleted { user_id: UserId },
    OrganizationCreated(OrganizationUpsert),
    OrganizationUpdated(OrganizationUpsert),
    OrganizationDeleted { organization_id: OrganizationId },
    /// A job seeker applied; notify opted-in members of the organization.
    ApplicationCreated { key: ApplicationKey },
    /// A resume file was stored; its summary is produced externally.
    ResumeUploaded { user_id: UserId },
}

impl JobBoardEvent {
    /// Event name, as used in logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            JobBoardEvent::UserCreated(_) => "user.created",
            JobBoardEvent::UserUpdated(_) => "user.updated",
            JobBoardEvent::UserDeleted { .. } => "user.deleted",
            JobBoardEvent::OrganizationCreated(_) => "organization.created",
            JobBoardEvent::OrganizationUpdated(_) => "organization.updated",
            JobBoardEvent::OrganizationDeleted { .. } => "organization.deleted",
            JobBoardEvent::ApplicationCreated { .. } => "job_listing_application.created",
            JobBoardEvent::ResumeUploaded { .. } => "resume.uploaded",
        }
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the event dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Bounded queue size; senders wait when it is full
    pub queue_capacity: usize,
    /// Attempts per event including the first (default: 5)
    pub max_attempts: u32,
    /// Delay before the first retry, doubled on each further retry
    pub base_backoff: Duration,
    /// Upper bound on the retry delay
    pub max_backoff: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            max_attempts: DEFAULT_EVENT_MAX_ATTEMPTS,
            base_backoff: Duration::from_millis(DEFAULT_EVENT_BASE_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_EVENT_MAX_BACKOFF_MS),
        }
    }
}

impl DispatcherConfig {
    /// Create DispatcherConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `JOBBOARD_EVENT_QUEUE_CAPACITY` (default: 1024)
    /// - `JOBBOARD_EVENT_MAX_ATTEMPTS` (default: 5)
    /// - `JOBBOARD_EVENT_BASE_BACKOFF_MS` (default: 200)
    /// - `JOBBOARD_EVENT_MAX_BACKOFF_MS` (default: 10000)
    pub fn from_env() -> Self {
        let queue_capacity = std::env::var("JOBBOARD_EVENT_QUEUE_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(DEFAULT_EVENT_QUEUE_CAPACITY);

        let max_attempts = std::env::var("JOBBOARD_EVENT_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n: &u32| *n > 0)
            .unwrap_or(DEFAULT_EVENT_MAX_ATTEMPTS);

        let base_backoff = Duration::from_millis(
            std::env::var("JOBBOARD_EVENT_BASE_BACKOFF_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_EVENT_BASE_BACKOFF_MS),
        );

        let max_backoff = Duration::from_millis(
            std::env::var("JOBBOARD_EVENT_MAX_BACKOFF_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_EVENT_MAX_BACKOFF_MS),
        );

        Self {
            queue_capacity,
            max_attempts,
            base_backoff,
            max_backoff,
        }
    }

    /// Short delays for tests and local development.
    pub fn development() -> Self {
        Self {
            queue_capacity: 64,
            max_attempts: 3,
            base_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(50),
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Dispatcher counters since startup.
#[derive(Debug, Default)]
pub struct DispatcherMetrics {
    pub events_handled: AtomicU64,
    pub events_retried: AtomicU64,
    pub events_failed: AtomicU64,
}

impl DispatcherMetrics {
    pub fn snapshot(&self) -> DispatcherSnapshot {
        DispatcherSnapshot {
            events_handled: self.events_handled.load(Ordering::Relaxed),
            events_retried: self.events_retried.load(Ordering::Relaxed),
            events_failed: self.events_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherSnapshot {
    pub events_handled: u64,
    pub events_retried: u64,
    pub events_failed: u64,
}

// ============================================================================
// DISPATCHER
// ============================================================================

/// Handle for enqueuing events. Cheap to clone.
#[derive(Clone)]
pub struct EventDispatcher {
    sender: mpsc::Sender<JobBoardEvent>,
    metrics: Arc<DispatcherMetrics>,
}

impl EventDispatcher {
    /// Start the worker. It runs until `shutdown_rx` flips to `true`, then
    /// drains what is already queued and returns its metrics.
    pub fn spawn(
        db: CachedDb,
        config: DispatcherConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<Arc<DispatcherMetrics>>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let metrics = Arc::new(DispatcherMetrics::default());
        let handle = tokio::spawn(run_worker(
            db,
            config,
            receiver,
            shutdown_rx,
            Arc::clone(&metrics),
        ));
        (Self { sender, metrics }, handle)
    }

    /// Enqueue an event, waiting for queue space.
    pub async fn dispatch(&self, event: JobBoardEvent) -> ApiResult<()> {
        let kind = event.kind();
        self.sender.send(event).await.map_err(|_| {
            tracing::error!(kind, "Event queue closed");
            ApiError::service_unavailable("Event queue is not accepting work")
        })?;
        tracing::debug!(kind, "Event queued");
        Ok(())
    }

    pub fn metrics(&self) -> DispatcherSnapshot {
        self.metrics.snapshot()
    }
}

async fn run_worker(
    db: CachedDb,
    config: DispatcherConfig,
    mut receiver: mpsc::Receiver<JobBoardEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
    metrics: Arc<DispatcherMetrics>,
) -> Arc<DispatcherMetrics> {
    tracing::info!(
        queue_capacity = config.queue_capacity,
        max_attempts = config.max_attempts,
        "Event dispatcher started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }

            event = receiver.recv() => {
                match event {
                    Some(event) => handle_with_retry(&db, &config, &metrics, event).await,
                    None => break,
                }
            }
        }
    }

    receiver.close();
    while let Some(event) = receiver.recv().await {
        handle_with_retry(&db, &config, &metrics, event).await;
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        events_handled = snapshot.events_handled,
        events_retried = snapshot.events_retried,
        events_failed = snapshot.events_failed,
        "Event dispatcher stopped"
    );
    metrics
}

/// Failures worth another attempt: the backend may come back.
fn is_retryable(err: &JobBoardError) -> bool {
    matches!(
        err,
        JobBoardError::Storage(StorageError::Unavailable { .. })
            | JobBoardError::Storage(StorageError::LockPoisoned)
            | JobBoardError::Cache(_)
    )
}

async fn handle_with_retry(
    db: &CachedDb,
    config: &DispatcherConfig,
    metrics: &DispatcherMetrics,
    event: JobBoardEvent,
) {
    let kind = event.kind();
    let mut attempt = 1;
    loop {
        match handle(db, event.clone()).await {
            Ok(()) => {
                metrics.events_handled.fetch_add(1, Ordering::Relaxed);
                with_metrics(|m| m.record_event(kind, "success"));
                return;
            }
            Err(err) if is_retryable(&err) && attempt < config.max_attempts => {
                let delay = config.backoff(attempt);
                tracing::warn!(kind, attempt, delay_ms = delay.as_millis() as u64, error = %err, "Event handler failed, retrying");
                metrics.events_retried.fetch_add(1, Ordering::Relaxed);
                with_metrics(|m| m.record_event(kind, "retry"));
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                tracing::error!(kind, attempt, error = %err, ?event, "Event handler failed");
                metrics.events_failed.fetch_add(1, Ordering::Relaxed);
                with_metrics(|m| m.record_event(kind, "failure"));
                return;
            }
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

async fn handle(db: &CachedDb, event: JobBoardEvent) -> JobBoardResult<()> {
    match event {
        JobBoardEvent::UserCreated(user) | JobBoardEvent::UserUpdated(user) => {
            let user = db.sync_user(user).await?;
            tracing::info!(user_id = %user.id, "User synced");
        }
        JobBoardEvent::UserDeleted { user_id } => match db.delete_user(&user_id).await? {
            Some(cascade) => tracing::info!(
                user_id = %user_id,
                applications = cascade.applications.len(),
                "User deleted"
            ),
            None => tracing::debug!(user_id = %user_id, "Deleted user was never synced"),
        },
        JobBoardEvent::OrganizationCreated(org) | JobBoardEvent::OrganizationUpdated(org) => {
            let org = db.sync_organization(org).await?;
            tracing::info!(organization_id = %org.id, "Organization synced");
        }
        JobBoardEvent::OrganizationDeleted { organization_id } => {
            match db.delete_organization(&organization_id).await? {
                Some(cascade) => tracing::info!(
                    organization_id = %organization_id,
                    job_listings = cascade.job_listings.len(),
                    "Organization deleted"
                ),
                None => tracing::debug!(
                    organization_id = %organization_id,
                    "Deleted organization was never synced"
                ),
            }
        }
        JobBoardEvent::ApplicationCreated { key } => notify_new_application(db, &key).await?,
        JobBoardEvent::ResumeUploaded { user_id } => match db.user_resume(&user_id).await? {
            Some(resume) => tracing::info!(
                user_id = %user_id,
                resume_file_key = %resume.resume_file_key,
                "Resume uploaded, summary pending"
            ),
            None => tracing::debug!(user_id = %user_id, "Uploaded resume no longer exists"),
        },
    }
    Ok(())
}

/// Resolve which members of the listing's organization want to hear about
/// this application. Delivery itself belongs to the mail provider.
async fn notify_new_application(db: &CachedDb, key: &ApplicationKey) -> JobBoardResult<()> {
    let Some(application) = db.application(key).await? else {
        tracing::debug!(application = %key, "Application withdrawn before notification");
        return Ok(());
    };
    let Some(listing) = db.published_job_listing(key.job_listing_id).await? else {
        tracing::debug!(application = %key, "Listing no longer published, skipping notification");
        return Ok(());
    };

    let recipients: Vec<UserId> = db
        .notifiable_members(&listing.organization.id)
        .await?
        .into_iter()
        .filter(|member| {
            member
                .minimum_rating
                .map_or(true, |min| application.rating.is_some_and(|r| r >= min))
        })
        .map(|member| member.user_id)
        .collect();

    tracing::info!(
        application = %key,
        organization_id = %listing.organization.id,
        recipients = recipients.len(),
        "New application notification resolved"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobboard_storage::{InMemoryStore, InMemoryTagStore, TaggedCache};

    fn cached_db() -> CachedDb {
        CachedDb::new(
            Arc::new(InMemoryStore::new()),
            TaggedCache::with_defaults(Arc::new(InMemoryTagStore::new())),
        )
    }

    fn user(id: &str) -> UserUpsert {
        UserUpsert {
            id: UserId::new(id),
            name: "Ada".to_string(),
            image_url: "https://img.example/ada.png".to_string(),
            email: format!("{}@example.com", id),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = DispatcherConfig {
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
            ..DispatcherConfig::default()
        };
        assert_eq!(config.backoff(1), Duration::from_millis(100));
        assert_eq!(config.backoff(2), Duration::from_millis(200));
        assert_eq!(config.backoff(3), Duration::from_millis(350));
        assert_eq!(config.backoff(40), Duration::from_millis(350));
    }

    #[test]
    fn test_only_transient_failures_retry() {
        assert!(is_retryable(&JobBoardError::from(StorageError::Unavailable {
            reason: "down".to_string()
        })));
        assert!(!is_retryable(&JobBoardError::from(StorageError::not_found(
            jobboard_core::EntityType::Users,
            "user_1"
        ))));
    }

    #[tokio::test]
    async fn test_worker_syncs_then_drains_on_shutdown() {
        let db = cached_db();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (dispatcher, handle) =
            EventDispatcher::spawn(db.clone(), DispatcherConfig::development(), shutdown_rx);

        dispatcher
            .dispatch(JobBoardEvent::UserCreated(user("user_1")))
            .await
            .expect("dispatch should succeed");
        dispatcher
            .dispatch(JobBoardEvent::UserDeleted {
                user_id: UserId::new("user_missing"),
            })
            .await
            .expect("dispatch should succeed");

        let _ = shutdown_tx.send(true);
        let metrics = handle.await.expect("worker should not panic").snapshot();
        assert_eq!(metrics.events_handled, 2);
        assert_eq!(metrics.events_failed, 0);

        let synced = db.user(&UserId::new("user_1")).await.expect("read should succeed");
        assert!(synced.is_some());
        assert!(db
            .notification_settings(&UserId::new("user_1"))
            .await
            .expect("read should succeed")
            .is_some());
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (dispatcher, handle) =
            EventDispatcher::spawn(cached_db(), DispatcherConfig::development(), shutdown_rx);

        // Email is unique across users.
        dispatcher
            .dispatch(JobBoardEvent::UserCreated(user("user_1")))
            .await
            .expect("dispatch should succeed");
        let mut clash = user("user_2");
        clash.email = "user_1@example.com".to_string();
        dispatcher
            .dispatch(JobBoardEvent::UserCreated(clash))
            .await
            .expect("dispatch should succeed");

        let _ = shutdown_tx.send(true);
        let metrics = handle.await.expect("worker should not panic").snapshot();
        assert_eq!(metrics.events_handled, 1);
        assert_eq!(metrics.events_failed, 1);
        assert_eq!(metrics.events_retried, 0);
    }

    #[test]
    fn test_event_kinds() {
        assert_eq!(
            JobBoardEvent::UserDeleted {
                user_id: UserId::new("u")
            }
            .kind(),
            "user.deleted"
        );
        assert_eq!(
            JobBoardEvent::ResumeUploaded {
                user_id: UserId::new("u")
            }
            .kind(),
            "resume.uploaded"
        );
    }
}
