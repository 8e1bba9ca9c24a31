//! Cached Database Client
//!
//! `CachedDb` is the only way routes and event handlers reach storage. It
//! applies the two caching conventions uniformly:
//!
//! - every read is memoized through [`TaggedCache::cached`] with the tag set
//!   of its read shape, plus the tags of rows discovered while fetching;
//! - every write commits, then invalidates the full tag set of what it
//!   touched, and only then reports success.
//!
//! The mutate + invalidate pair runs on a spawned task that the caller
//! awaits, so a dropped request future cannot leave a committed write with
//! live stale entries.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use jobboard_core::tags::reads;
use jobboard_core::{
    ApplicationKey, ApplicationWithApplicant, CacheError, CacheTagged, EntityType, JobBoardResult,
    JobListing, JobListingApplication, JobListingId, JobListingMenuItem, JobListingStatus,
    Organization, OrganizationCascade, OrganizationId, OrganizationUserKey,
    OrganizationUserSettings, PublishedJobListing, StorageError, TagSet, User, UserCascade, UserId,
    UserNotificationSettings, UserResume, ValidationError,
};
use jobboard_storage::{
    ApplicationUpdate, CacheKey, CacheStats, JobBoardStore, JobListingUpdate, NewApplication,
    NewJobListing, NotificationSettingsUpsert, OrganizationUpsert, OrganizationUserSettingsUpsert,
    PendingTags, PruneReport, ResumeUpdate, ResumeUpsert, TaggedCache, UserUpsert,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::telemetry::with_metrics;

/// Storage facade that tags every read and invalidates after every write.
#[derive(Clone)]
pub struct CachedDb {
    store: Arc<dyn JobBoardStore>,
    cache: TaggedCache,
}

impl CachedDb {
    pub fn new(store: Arc<dyn JobBoardStore>, cache: TaggedCache) -> Self {
        Self { store, cache }
    }

    pub fn cache(&self) -> &TaggedCache {
        &self.cache
    }

    /// Readiness probe against the backing store.
    pub async fn ping(&self) -> JobBoardResult<()> {
        self.store.ping().await
    }

    pub async fn cache_stats(&self) -> JobBoardResult<CacheStats> {
        self.cache.stats().await
    }

    pub async fn prune_cache(&self) -> JobBoardResult<PruneReport> {
        let report = self.cache.prune_expired().await?;
        with_metrics(|m| m.record_expired(report.entries));
        Ok(report)
    }

    // ========================================================================
    // CONVENTIONS
    // ========================================================================

    async fn read<T, F, Fut>(&self, key: CacheKey, tags: TagSet, fetch: F) -> JobBoardResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Arc<dyn JobBoardStore>, PendingTags) -> Fut,
        Fut: Future<Output = JobBoardResult<T>>,
    {
        let operation = key.operation();
        let store = Arc::clone(&self.store);
        let read = self
            .cache
            .cached(key, tags, move |pending| async move {
                let start = Instant::now();
                let result = fetch(store, pending).await;
                with_metrics(|m| {
                    m.record_store_operation(operation, result.is_ok(), start.elapsed().as_secs_f64())
                });
                result
            })
            .await?;
        with_metrics(|m| m.record_cache_read(operation, read.was_cache_hit()));
        Ok(read.into_value())
    }

    async fn write<T, F, Fut>(&self, operation: &'static str, mutate: F) -> JobBoardResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn JobBoardStore>) -> Fut + Send + 'static,
        Fut: Future<Output = JobBoardResult<(T, TagSet)>> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let cache = self.cache.clone();
        let task = tokio::spawn(async move {
            let start = Instant::now();
            let result = mutate(store).await;
            with_metrics(|m| {
                m.record_store_operation(operation, result.is_ok(), start.elapsed().as_secs_f64())
            });
            let (value, tags) = result?;

            match cache.invalidate(&tags).await {
                Ok(evicted) => {
                    with_metrics(|m| m.record_invalidation(true, evicted));
                    tracing::debug!(operation, tags = %tags, evicted, "Write committed and invalidated");
                    Ok(value)
                }
                Err(err) => {
                    with_metrics(|m| m.record_invalidation(false, 0));
                    tracing::error!(operation, tags = %tags, error = %err, "Write committed but invalidation failed");
                    Err(err)
                }
            }
        });

        match task.await {
            Ok(result) => result,
            Err(err) => Err(CacheError::TaskFailed {
                reason: err.to_string(),
            }
            .into()),
        }
    }

    // ========================================================================
    // JOB LISTINGS (READS)
    // ========================================================================

    /// A listing as its owning organization sees it, whatever its status.
    pub async fn job_listing_for_organization(
        &self,
        organization_id: &OrganizationId,
        id: JobListingId,
    ) -> JobBoardResult<Option<JobListing>> {
        let listing = self
            .read(
                CacheKey::new("job_listing_get").arg(id),
                reads::job_listing_for_organization(&id),
                move |store, _| async move { store.job_listing_get(&id).await },
            )
            .await?;
        Ok(listing.filter(|l| &l.organization_id == organization_id))
    }

    pub async fn published_job_listing(
        &self,
        id: JobListingId,
    ) -> JobBoardResult<Option<PublishedJobListing>> {
        self.read(
            CacheKey::new("job_listing_get_published").arg(id),
            reads::published_job_listing(&id),
            move |store, pending| async move {
                let listing = store.job_listing_get_published(&id).await?;
                if let Some(published) = &listing {
                    pending.register(reads::discovered_organization(&published.organization.id));
                }
                Ok(listing)
            },
        )
        .await
    }

    pub async fn published_job_listing_exists(&self, id: JobListingId) -> JobBoardResult<bool> {
        self.read(
            CacheKey::new("job_listing_published_exists").arg(id),
            reads::published_job_listing_exists(&id),
            move |store, _| async move {
                let listing = store.job_listing_get(&id).await?;
                Ok(listing.is_some_and(|l| l.status.is_public()))
            },
        )
        .await
    }

    pub async fn published_board(&self) -> JobBoardResult<Vec<PublishedJobListing>> {
        self.read(
            CacheKey::new("job_listing_list_published"),
            reads::published_board(),
            |store, pending| async move {
                let listings = store.job_listing_list_published().await?;
                pending.register_all(
                    listings
                        .iter()
                        .map(|l| reads::discovered_organization(&l.organization.id)),
                );
                Ok(listings)
            },
        )
        .await
    }

    pub async fn listing_menu(
        &self,
        organization_id: &OrganizationId,
    ) -> JobBoardResult<Vec<JobListingMenuItem>> {
        let org = organization_id.clone();
        self.read(
            CacheKey::new("job_listing_menu_for_org").arg(organization_id),
            reads::listing_menu(organization_id),
            move |store, pending| async move {
                let menu = store.job_listing_menu_for_org(&org).await?;
                pending.register_all(menu.iter().map(|item| reads::listing_applications(&item.id)));
                Ok(menu)
            },
        )
        .await
    }

    // ========================================================================
    // JOB LISTINGS (WRITES)
    // ========================================================================

    pub async fn create_job_listing(&self, listing: NewJobListing) -> JobBoardResult<JobListing> {
        self.write("job_listing_insert", move |store| async move {
            let created = store.job_listing_insert(listing).await?;
            let tags = created.write_tags();
            Ok((created, tags))
        })
        .await
    }

    pub async fn update_job_listing(
        &self,
        organization_id: &OrganizationId,
        id: JobListingId,
        update: JobListingUpdate,
    ) -> JobBoardResult<JobListing> {
        let org = organization_id.clone();
        self.write("job_listing_update", move |store| async move {
            require_owned_listing(store.as_ref(), &org, &id).await?;
            let updated = store.job_listing_update(&id, update).await?;
            let tags = updated.write_tags();
            Ok((updated, tags))
        })
        .await
    }

    /// Change a listing's status. The first publish stamps `posted_at`.
    pub async fn set_job_listing_status(
        &self,
        organization_id: &OrganizationId,
        id: JobListingId,
        status: JobListingStatus,
    ) -> JobBoardResult<JobListing> {
        self.update_job_listing(organization_id, id, JobListingUpdate::status(status))
            .await
    }

    pub async fn set_job_listing_featured(
        &self,
        organization_id: &OrganizationId,
        id: JobListingId,
        is_featured: bool,
    ) -> JobBoardResult<JobListing> {
        self.update_job_listing(organization_id, id, JobListingUpdate::featured(is_featured))
            .await
    }

    pub async fn delete_job_listing(
        &self,
        organization_id: &OrganizationId,
        id: JobListingId,
    ) -> JobBoardResult<JobListing> {
        let org = organization_id.clone();
        self.write("job_listing_delete", move |store| async move {
            require_owned_listing(store.as_ref(), &org, &id).await?;
            let cascade = store
                .job_listing_delete(&id)
                .await?
                .ok_or_else(|| StorageError::not_found(EntityType::JobListings, id))?;
            let tags = cascade.write_tags();
            Ok((cascade.job_listing, tags))
        })
        .await
    }

    // ========================================================================
    // APPLICATIONS (READS)
    // ========================================================================

    pub async fn applications_for_listing(
        &self,
        job_listing_id: JobListingId,
    ) -> JobBoardResult<Vec<ApplicationWithApplicant>> {
        self.read(
            CacheKey::new("application_list_for_listing").arg(job_listing_id),
            reads::applications_for_listing(&job_listing_id),
            move |store, pending| async move {
                let rows = store.application_list_for_listing(&job_listing_id).await?;
                for row in &rows {
                    pending.register_all(reads::discovered_applicant(&row.applicant.user_id));
                }
                Ok(rows)
            },
        )
        .await
    }

    pub async fn application_count(&self, job_listing_id: JobListingId) -> JobBoardResult<u64> {
        self.read(
            CacheKey::new("application_count_for_listing").arg(job_listing_id),
            reads::application_count(&job_listing_id),
            move |store, _| async move { store.application_count_for_listing(&job_listing_id).await },
        )
        .await
    }

    pub async fn applications_for_user(
        &self,
        user_id: &UserId,
    ) -> JobBoardResult<Vec<JobListingApplication>> {
        let user = user_id.clone();
        self.read(
            CacheKey::new("application_list_for_user").arg(user_id),
            reads::applications_for_user(user_id),
            move |store, _| async move { store.application_list_for_user(&user).await },
        )
        .await
    }

    pub async fn application(
        &self,
        key: &ApplicationKey,
    ) -> JobBoardResult<Option<JobListingApplication>> {
        let lookup = key.clone();
        self.read(
            CacheKey::new("application_get").key(key),
            reads::application(key),
            move |store, _| async move { store.application_get(&lookup).await },
        )
        .await
    }

    // ========================================================================
    // APPLICATIONS (WRITES)
    // ========================================================================

    /// Apply to a published listing. The applicant must have uploaded a
    /// resume, and may apply to each listing once.
    pub async fn apply(&self, application: NewApplication) -> JobBoardResult<JobListingApplication> {
        if !self
            .published_job_listing_exists(application.job_listing_id)
            .await?
        {
            return Err(
                StorageError::not_found(EntityType::JobListings, application.job_listing_id).into(),
            );
        }
        if self.user_resume(&application.user_id).await?.is_none() {
            return Err(ValidationError::ConstraintViolation {
                constraint: "resume_required".to_string(),
                reason: "upload a resume before applying".to_string(),
            }
            .into());
        }

        self.write("application_insert", move |store| async move {
            let created = store.application_insert(application).await?;
            let tags = created.write_tags();
            Ok((created, tags))
        })
        .await
    }

    pub async fn update_application(
        &self,
        organization_id: &OrganizationId,
        key: ApplicationKey,
        update: ApplicationUpdate,
    ) -> JobBoardResult<JobListingApplication> {
        let org = organization_id.clone();
        self.write("application_update", move |store| async move {
            require_owned_listing(store.as_ref(), &org, &key.job_listing_id).await?;
            let updated = store.application_update(&key, update).await?;
            let tags = updated.write_tags();
            Ok((updated, tags))
        })
        .await
    }

    /// Move an application to another listing of the same organization.
    /// Reads scoped to either listing are invalidated.
    pub async fn move_application(
        &self,
        organization_id: &OrganizationId,
        key: ApplicationKey,
        to: JobListingId,
    ) -> JobBoardResult<JobListingApplication> {
        let org = organization_id.clone();
        self.write("application_move", move |store| async move {
            require_owned_listing(store.as_ref(), &org, &key.job_listing_id).await?;
            require_owned_listing(store.as_ref(), &org, &to).await?;
            let moved = store.application_move(&key, &to).await?;
            let tags = jobboard_core::moved_write_tags(&moved.before, &moved.after);
            Ok((moved.after, tags))
        })
        .await
    }

    // ========================================================================
    // USERS AND ORGANIZATIONS
    // ========================================================================

    pub async fn user(&self, id: &UserId) -> JobBoardResult<Option<User>> {
        let lookup = id.clone();
        self.read(
            CacheKey::new("user_get").arg(id),
            reads::user(id),
            move |store, _| async move { store.user_get(&lookup).await },
        )
        .await
    }

    /// Mirror a user from the identity provider and make sure they have
    /// notification settings.
    pub async fn sync_user(&self, user: UserUpsert) -> JobBoardResult<User> {
        let synced = self
            .write("user_upsert", move |store| async move {
                let saved = store.user_upsert(user).await?;
                let tags = saved.write_tags();
                Ok((saved, tags))
            })
            .await?;
        self.ensure_notification_settings(&synced.id).await?;
        Ok(synced)
    }

    /// Delete a user and everything that belonged to them. Returns `None`
    /// when the user was never mirrored.
    pub async fn delete_user(&self, id: &UserId) -> JobBoardResult<Option<UserCascade>> {
        let id = id.clone();
        self.write("user_delete", move |store| async move {
            match store.user_delete(&id).await? {
                Some(cascade) => {
                    let tags = cascade.write_tags();
                    Ok((Some(cascade), tags))
                }
                None => Ok((None, reads::user(&id))),
            }
        })
        .await
    }

    pub async fn organization(&self, id: &OrganizationId) -> JobBoardResult<Option<Organization>> {
        let lookup = id.clone();
        self.read(
            CacheKey::new("organization_get").arg(id),
            reads::organization(id),
            move |store, _| async move { store.organization_get(&lookup).await },
        )
        .await
    }

    pub async fn sync_organization(&self, org: OrganizationUpsert) -> JobBoardResult<Organization> {
        self.write("organization_upsert", move |store| async move {
            let saved = store.organization_upsert(org).await?;
            let tags = saved.write_tags();
            Ok((saved, tags))
        })
        .await
    }

    pub async fn delete_organization(
        &self,
        id: &OrganizationId,
    ) -> JobBoardResult<Option<OrganizationCascade>> {
        let id = id.clone();
        self.write("organization_delete", move |store| async move {
            match store.organization_delete(&id).await? {
                Some(cascade) => {
                    let tags = cascade.write_tags();
                    Ok((Some(cascade), tags))
                }
                None => Ok((None, reads::organization(&id))),
            }
        })
        .await
    }

    // ========================================================================
    // RESUMES
    // ========================================================================

    pub async fn user_resume(&self, user_id: &UserId) -> JobBoardResult<Option<UserResume>> {
        let lookup = user_id.clone();
        self.read(
            CacheKey::new("resume_get").arg(user_id),
            reads::user_resume(user_id),
            move |store, _| async move { store.resume_get(&lookup).await },
        )
        .await
    }

    pub async fn upsert_resume(&self, resume: ResumeUpsert) -> JobBoardResult<UserResume> {
        self.write("resume_upsert", move |store| async move {
            let saved = store.resume_upsert(resume).await?;
            let tags = saved.write_tags();
            Ok((saved, tags))
        })
        .await
    }

    pub async fn update_resume(
        &self,
        user_id: &UserId,
        update: ResumeUpdate,
    ) -> JobBoardResult<UserResume> {
        let user = user_id.clone();
        self.write("resume_update", move |store| async move {
            let saved = store.resume_update(&user, update).await?;
            let tags = saved.write_tags();
            Ok((saved, tags))
        })
        .await
    }

    // ========================================================================
    // NOTIFICATION SETTINGS
    // ========================================================================

    pub async fn notification_settings(
        &self,
        user_id: &UserId,
    ) -> JobBoardResult<Option<UserNotificationSettings>> {
        let lookup = user_id.clone();
        self.read(
            CacheKey::new("notification_settings_get").arg(user_id),
            reads::notification_settings(user_id),
            move |store, _| async move { store.notification_settings_get(&lookup).await },
        )
        .await
    }

    /// Insert default settings unless the user already has some.
    pub async fn ensure_notification_settings(
        &self,
        user_id: &UserId,
    ) -> JobBoardResult<Option<UserNotificationSettings>> {
        let user = user_id.clone();
        self.write("notification_settings_insert_default", move |store| async move {
            let inserted = store.notification_settings_insert_default(&user).await?;
            let tags = match &inserted {
                Some(settings) => settings.write_tags(),
                None => reads::notification_settings(&user),
            };
            Ok((inserted, tags))
        })
        .await
    }

    pub async fn upsert_notification_settings(
        &self,
        settings: NotificationSettingsUpsert,
    ) -> JobBoardResult<UserNotificationSettings> {
        self.write("notification_settings_upsert", move |store| async move {
            let saved = store.notification_settings_upsert(settings).await?;
            let tags = saved.write_tags();
            Ok((saved, tags))
        })
        .await
    }

    // ========================================================================
    // ORGANIZATION USER SETTINGS
    // ========================================================================

    pub async fn organization_user_settings(
        &self,
        key: &OrganizationUserKey,
    ) -> JobBoardResult<Option<OrganizationUserSettings>> {
        let lookup = key.clone();
        self.read(
            CacheKey::new("org_user_settings_get").key(key),
            reads::organization_user_settings(key),
            move |store, _| async move { store.org_user_settings_get(&lookup).await },
        )
        .await
    }

    pub async fn upsert_organization_user_settings(
        &self,
        settings: OrganizationUserSettingsUpsert,
    ) -> JobBoardResult<OrganizationUserSettings> {
        self.write("org_user_settings_upsert", move |store| async move {
            let saved = store.org_user_settings_upsert(settings).await?;
            let tags = saved.write_tags();
            Ok((saved, tags))
        })
        .await
    }

    /// Members of `organization_id` who opted into new-application emails.
    pub async fn notifiable_members(
        &self,
        organization_id: &OrganizationId,
    ) -> JobBoardResult<Vec<OrganizationUserSettings>> {
        let org = organization_id.clone();
        self.read(
            CacheKey::new("org_user_settings_list_notifiable").arg(organization_id),
            reads::notifiable_members(organization_id),
            move |store, _| async move { store.org_user_settings_list_notifiable(&org).await },
        )
        .await
    }
}

/// Fail with not-found unless `id` exists and belongs to `organization_id`.
/// A foreign listing is indistinguishable from a missing one.
async fn require_owned_listing(
    store: &dyn JobBoardStore,
    organization_id: &OrganizationId,
    id: &JobListingId,
) -> JobBoardResult<JobListing> {
    match store.job_listing_get(id).await? {
        Some(listing) if &listing.organization_id == organization_id => Ok(listing),
        _ => Err(StorageError::not_found(EntityType::JobListings, id).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobboard_core::{
        ExperienceLevel, JobBoardError, JobListingType, LocationRequirement, ApplicationStage,
    };
    use jobboard_storage::{InMemoryStore, InMemoryTagStore};

    fn cached_db() -> CachedDb {
        CachedDb::new(
            Arc::new(InMemoryStore::new()),
            TaggedCache::with_defaults(Arc::new(InMemoryTagStore::new())),
        )
    }

    async fn seed_org(db: &CachedDb, id: &str) -> OrganizationId {
        db.sync_organization(OrganizationUpsert {
            id: OrganizationId::new(id),
            name: format!("Org {}", id),
            image_url: None,
        })
        .await
        .expect("organization sync should succeed")
        .id
    }

    async fn seed_user(db: &CachedDb, id: &str) -> UserId {
        db.sync_user(UserUpsert {
            id: UserId::new(id),
            name: format!("User {}", id),
            image_url: "https://img.example/u.png".to_string(),
            email: format!("{}@example.com", id),
        })
        .await
        .expect("user sync should succeed")
        .id
    }

    fn new_listing(org: &OrganizationId, title: &str) -> NewJobListing {
        NewJobListing {
            organization_id: org.clone(),
            title: title.to_string(),
            description: "Build things".to_string(),
            wage: Some(120_000),
            wage_interval: None,
            state_abbreviation: None,
            city: None,
            location_requirement: LocationRequirement::Remote,
            experience_level: ExperienceLevel::Senior,
            listing_type: JobListingType::FullTime,
        }
    }

    #[tokio::test]
    async fn test_sync_user_creates_default_notification_settings() {
        let db = cached_db();
        let user = seed_user(&db, "user_1").await;

        let settings = db
            .notification_settings(&user)
            .await
            .expect("read should succeed")
            .expect("settings should exist");
        assert!(!settings.new_job_email_notifications);

        // Re-syncing keeps the existing row.
        seed_user(&db, "user_1").await;
        let again = db
            .ensure_notification_settings(&user)
            .await
            .expect("ensure should succeed");
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_foreign_listing_is_not_found() {
        let db = cached_db();
        let owner = seed_org(&db, "org_owner").await;
        let other = seed_org(&db, "org_other").await;
        let listing = db
            .create_job_listing(new_listing(&owner, "Engineer"))
            .await
            .expect("create should succeed");

        assert!(db
            .job_listing_for_organization(&other, listing.id)
            .await
            .expect("read should succeed")
            .is_none());

        let err = db
            .set_job_listing_status(&other, listing.id, JobListingStatus::Published)
            .await
            .expect_err("foreign update should fail");
        assert!(matches!(
            err,
            JobBoardError::Storage(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_apply_requires_published_listing_and_resume() {
        let db = cached_db();
        let org = seed_org(&db, "org_1").await;
        let user = seed_user(&db, "user_1").await;
        let listing = db
            .create_job_listing(new_listing(&org, "Engineer"))
            .await
            .expect("create should succeed");
        let application = NewApplication {
            job_listing_id: listing.id,
            user_id: user.clone(),
            cover_letter: None,
        };

        let draft = db.apply(application.clone()).await.expect_err("draft should reject");
        assert!(matches!(draft, JobBoardError::Storage(StorageError::NotFound { .. })));

        db.set_job_listing_status(&org, listing.id, JobListingStatus::Published)
            .await
            .expect("publish should succeed");
        let no_resume = db.apply(application.clone()).await.expect_err("missing resume");
        assert!(matches!(
            no_resume,
            JobBoardError::Validation(ValidationError::ConstraintViolation { .. })
        ));

        db.upsert_resume(ResumeUpsert {
            user_id: user.clone(),
            resume_file_url: "https://files.example/r.pdf".to_string(),
            resume_file_key: "r.pdf".to_string(),
        })
        .await
        .expect("resume upload should succeed");

        let created = db.apply(application.clone()).await.expect("apply should succeed");
        assert_eq!(created.stage, ApplicationStage::Applied);

        let duplicate = db.apply(application).await.expect_err("second apply");
        assert!(matches!(
            duplicate,
            JobBoardError::Storage(StorageError::AlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_reads_hit_cache_until_a_write() {
        let db = cached_db();
        let user = seed_user(&db, "user_1").await;

        db.user(&user).await.expect("first read");
        db.user(&user).await.expect("second read");
        let stats = db.cache_stats().await.expect("stats");
        assert!(stats.hits >= 1);

        seed_user(&db, "user_1").await;
        let entries = db.cache_stats().await.expect("stats").entry_count;
        assert_eq!(entries, 0);
    }

    #[tokio::test]
    async fn test_applicant_profile_change_refreshes_listing_applications() {
        let db = cached_db();
        let org = seed_org(&db, "org_1").await;
        let user = seed_user(&db, "user_1").await;
        let listing = db
            .create_job_listing(new_listing(&org, "Engineer"))
            .await
            .expect("create");
        db.set_job_listing_status(&org, listing.id, JobListingStatus::Published)
            .await
            .expect("publish");
        db.upsert_resume(ResumeUpsert {
            user_id: user.clone(),
            resume_file_url: "https://files.example/r.pdf".to_string(),
            resume_file_key: "r.pdf".to_string(),
        })
        .await
        .expect("resume");
        db.apply(NewApplication {
            job_listing_id: listing.id,
            user_id: user.clone(),
            cover_letter: Some("Hello".to_string()),
        })
        .await
        .expect("apply");

        let before = db.applications_for_listing(listing.id).await.expect("read");
        assert_eq!(before[0].applicant.ai_summary, None);

        db.update_resume(
            &user,
            ResumeUpdate {
                ai_summary: Some(Some("Strong candidate".to_string())),
                ..ResumeUpdate::default()
            },
        )
        .await
        .expect("summary");

        let after = db.applications_for_listing(listing.id).await.expect("read");
        assert_eq!(after[0].applicant.ai_summary.as_deref(), Some("Strong candidate"));
    }

    #[tokio::test]
    async fn test_delete_organization_clears_board() {
        let db = cached_db();
        let org = seed_org(&db, "org_1").await;
        let listing = db
            .create_job_listing(new_listing(&org, "Engineer"))
            .await
            .expect("create");
        db.set_job_listing_status(&org, listing.id, JobListingStatus::Published)
            .await
            .expect("publish");
        assert_eq!(db.published_board().await.expect("board").len(), 1);

        let cascade = db
            .delete_organization(&org)
            .await
            .expect("delete")
            .expect("organization existed");
        assert_eq!(cascade.job_listings.len(), 1);
        assert!(db.published_board().await.expect("board").is_empty());
        assert!(db
            .delete_organization(&org)
            .await
            .expect("second delete")
            .is_none());
    }

    #[tokio::test]
    async fn test_settings_for_pairs_with_shared_punctuation_stay_apart() {
        let db = cached_db();
        let first_user = seed_user(&db, "a, b").await;
        let second_user = seed_user(&db, "a").await;
        let first_org = seed_org(&db, "c").await;
        let second_org = seed_org(&db, "b, c").await;

        db.upsert_organization_user_settings(OrganizationUserSettingsUpsert {
            user_id: first_user.clone(),
            organization_id: first_org.clone(),
            new_application_email_notifications: true,
            minimum_rating: Some(3),
        })
        .await
        .expect("upsert should succeed");

        let written = OrganizationUserKey::new(first_user, first_org);
        let saved = db
            .organization_user_settings(&written)
            .await
            .expect("read should succeed")
            .expect("settings should exist");
        assert_eq!(saved.minimum_rating, Some(3));

        let other = OrganizationUserKey::new(second_user, second_org);
        assert_eq!(written.to_string(), other.to_string());
        assert!(db
            .organization_user_settings(&other)
            .await
            .expect("read should succeed")
            .is_none());
    }
}
