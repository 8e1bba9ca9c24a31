//! Job Board Test Utilities
//!
//! Shared test infrastructure for the job board workspace:
//! - Proptest generators for identifiers, enums and write payloads
//! - Fixtures for common users, organizations and listings
//! - A fault-injecting cache store for invalidation-failure scenarios
//! - Assertions for the job board error taxonomy

// Re-export core types for convenience
pub use jobboard_core::{
    ApplicationKey, ApplicationStage, CacheError, EntityType, ExperienceLevel, JobBoardError,
    JobBoardResult, JobListingId, JobListingStatus, JobListingType, LocationRequirement,
    OrganizationId, OrganizationUserKey, StorageError, Tag, TagSet, UserId, ValidationError,
    WageInterval,
};
pub use jobboard_storage::{
    InMemoryStore, InMemoryTagStore, NewApplication, NewJobListing, OrganizationUpsert,
    ResumeUpsert, TagStore, UserUpsert,
};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobboard_storage::{CacheKey, CacheStats, CachedEntry, PruneReport, Watermark};

// ============================================================================
// FAULT INJECTION
// ============================================================================

/// Tag store that wraps [`InMemoryTagStore`] and can be armed to fail every
/// `invalidate_by_tag` call.
///
/// Starts disarmed so fixtures can be seeded through the normal write path.
#[derive(Default)]
pub struct FailingTagStore {
    inner: InMemoryTagStore,
    failing: AtomicBool,
    failed_invalidations: AtomicU64,
}

impl FailingTagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that fails from the first invalidation on.
    pub fn armed() -> Self {
        let store = Self::default();
        store.arm();
        store
    }

    pub fn arm(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn disarm(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }

    pub fn failed_invalidations(&self) -> u64 {
        self.failed_invalidations.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &InMemoryTagStore {
        &self.inner
    }
}

#[async_trait]
impl TagStore for FailingTagStore {
    async fn lookup(&self, key: &CacheKey) -> JobBoardResult<Option<CachedEntry>> {
        self.inner.lookup(key).await
    }

    async fn watermark(&self) -> JobBoardResult<Watermark> {
        self.inner.watermark().await
    }

    async fn store(
        &self,
        key: CacheKey,
        value: Vec<u8>,
        tags: &TagSet,
        observed: Watermark,
    ) -> JobBoardResult<bool> {
        self.inner.store(key, value, tags, observed).await
    }

    async fn invalidate_by_tag(&self, tag: &Tag) -> JobBoardResult<u64> {
        if self.failing.load(Ordering::SeqCst) {
            self.failed_invalidations.fetch_add(1, Ordering::SeqCst);
            return Err(CacheError::InvalidationFailed {
                tag: tag.to_string(),
                reason: "injected failure".to_string(),
            }
            .into());
        }
        self.inner.invalidate_by_tag(tag).await
    }

    async fn prune(
        &self,
        journal_before: DateTime<Utc>,
        entries_before: DateTime<Utc>,
    ) -> JobBoardResult<PruneReport> {
        self.inner.prune(journal_before, entries_before).await
    }

    async fn stats(&self) -> JobBoardResult<CacheStats> {
        self.inner.stats().await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for job board payloads.

    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    /// Identity-provider style user ids (`user_` + base62-ish suffix).
    pub fn arb_user_id() -> impl Strategy<Value = UserId> {
        "[a-zA-Z0-9]{8,24}".prop_map(|suffix| UserId::new(format!("user_{}", suffix)))
    }

    pub fn arb_organization_id() -> impl Strategy<Value = OrganizationId> {
        "[a-zA-Z0-9]{8,24}".prop_map(|suffix| OrganizationId::new(format!("org_{}", suffix)))
    }

    pub fn arb_job_listing_id() -> impl Strategy<Value = JobListingId> {
        any::<u128>().prop_map(|bits| JobListingId::from_uuid(Uuid::from_u128(bits)))
    }

    pub fn arb_wage_interval() -> impl Strategy<Value = WageInterval> {
        prop::sample::select(WageInterval::ALL)
    }

    pub fn arb_location_requirement() -> impl Strategy<Value = LocationRequirement> {
        prop::sample::select(LocationRequirement::ALL)
    }

    pub fn arb_experience_level() -> impl Strategy<Value = ExperienceLevel> {
        prop::sample::select(ExperienceLevel::ALL)
    }

    pub fn arb_job_listing_status() -> impl Strategy<Value = JobListingStatus> {
        prop::sample::select(JobListingStatus::ALL)
    }

    pub fn arb_job_listing_type() -> impl Strategy<Value = JobListingType> {
        prop::sample::select(JobListingType::ALL)
    }

    pub fn arb_application_stage() -> impl Strategy<Value = ApplicationStage> {
        prop::sample::select(ApplicationStage::ALL)
    }

    pub fn arb_rating() -> impl Strategy<Value = Option<i16>> {
        prop::option::of(1i16..=5)
    }

    pub fn arb_state_abbreviation() -> impl Strategy<Value = String> {
        "[A-Z]{2}"
    }

    pub fn arb_user_upsert() -> impl Strategy<Value = UserUpsert> {
        (arb_user_id(), "[A-Z][a-z]{1,12} [A-Z][a-z]{1,12}").prop_map(|(id, name)| {
            let email = format!("{}@example.com", id.as_str().to_lowercase());
            UserUpsert {
                image_url: format!("https://img.example/{}.png", id.as_str()),
                id,
                name,
                email,
            }
        })
    }

    pub fn arb_organization_upsert() -> impl Strategy<Value = OrganizationUpsert> {
        (
            arb_organization_id(),
            "[A-Z][a-z]{2,16}( Inc| LLC)?",
            any::<bool>(),
        )
            .prop_map(|(id, name, has_image)| OrganizationUpsert {
                image_url: has_image.then(|| format!("https://img.example/{}.png", id.as_str())),
                id,
                name,
            })
    }

    pub fn arb_new_job_listing(organization_id: OrganizationId) -> impl Strategy<Value = NewJobListing> {
        (
            "[A-Z][a-z]{3,12}( Engineer| Designer| Analyst)",
            "[a-zA-Z ,.]{10,200}",
            prop::option::of((1_000i32..500_000, arb_wage_interval())),
            prop::option::of((arb_state_abbreviation(), "[A-Z][a-z]{2,14}")),
            arb_location_requirement(),
            arb_experience_level(),
            arb_job_listing_type(),
        )
            .prop_map(
                move |(title, description, wage, place, location, level, listing_type)| {
                    NewJobListing {
                        organization_id: organization_id.clone(),
                        title,
                        description,
                        wage: wage.map(|(amount, _)| amount),
                        wage_interval: wage.map(|(_, interval)| interval),
                        state_abbreviation: place.as_ref().map(|(state, _)| state.clone()),
                        city: place.map(|(_, city)| city),
                        location_requirement: location,
                        experience_level: level,
                        listing_type,
                    }
                },
            )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Fixed payloads for common scenarios.

    use super::*;

    pub fn user(id: &str) -> UserUpsert {
        UserUpsert {
            id: UserId::new(id),
            name: format!("User {}", id),
            image_url: format!("https://img.example/{}.png", id),
            email: format!("{}@example.com", id),
        }
    }

    pub fn organization(id: &str) -> OrganizationUpsert {
        OrganizationUpsert {
            id: OrganizationId::new(id),
            name: format!("Org {}", id),
            image_url: None,
        }
    }

    /// A remote full-time draft listing.
    pub fn job_listing(organization_id: &OrganizationId, title: &str) -> NewJobListing {
        NewJobListing {
            organization_id: organization_id.clone(),
            title: title.to_string(),
            description: "Build and run the services behind the board".to_string(),
            wage: Some(120_000),
            wage_interval: Some(WageInterval::Yearly),
            state_abbreviation: None,
            city: None,
            location_requirement: LocationRequirement::Remote,
            experience_level: ExperienceLevel::MidLevel,
            listing_type: JobListingType::FullTime,
        }
    }

    pub fn resume(user_id: &UserId) -> ResumeUpsert {
        ResumeUpsert {
            user_id: user_id.clone(),
            resume_file_url: format!("https://files.example/{}.pdf", user_id.as_str()),
            resume_file_key: format!("{}.pdf", user_id.as_str()),
        }
    }

    pub fn application(job_listing_id: JobListingId, user_id: &UserId) -> NewApplication {
        NewApplication {
            job_listing_id,
            user_id: user_id.clone(),
            cover_letter: Some("I would love to join the team.".to_string()),
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over [`JobBoardResult`] variants.

    use super::*;

    pub fn assert_not_found<T: std::fmt::Debug>(result: &JobBoardResult<T>, entity_type: EntityType) {
        match result {
            Err(JobBoardError::Storage(StorageError::NotFound { entity_type: got, .. })) => {
                assert_eq!(*got, entity_type, "not-found for the wrong entity type");
            }
            other => panic!("Expected NotFound for {}, got: {:?}", entity_type, other),
        }
    }

    pub fn assert_already_exists<T: std::fmt::Debug>(result: &JobBoardResult<T>) {
        assert!(
            matches!(result, Err(JobBoardError::Storage(StorageError::AlreadyExists { .. }))),
            "Expected AlreadyExists, got: {:?}",
            result
        );
    }

    pub fn assert_validation_error<T: std::fmt::Debug>(result: &JobBoardResult<T>) {
        assert!(
            matches!(result, Err(JobBoardError::Validation(_))),
            "Expected validation error, got: {:?}",
            result
        );
    }

    pub fn assert_invalidation_failed<T: std::fmt::Debug>(result: &JobBoardResult<T>) {
        assert!(
            matches!(
                result,
                Err(JobBoardError::Cache(CacheError::InvalidationFailed { .. }))
            ),
            "Expected invalidation failure, got: {:?}",
            result
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobboard_core::tags::reads;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_failing_store_only_fails_when_armed() {
        let store = Arc::new(FailingTagStore::new());
        let tag = reads::user(&UserId::new("user_1"));
        let tag = tag.iter().next().cloned().expect("tag set is never empty");

        assert_eq!(store.invalidate_by_tag(&tag).await, Ok(0));
        store.arm();
        let result = store.invalidate_by_tag(&tag).await;
        assertions::assert_invalidation_failed(&result);
        assert_eq!(store.failed_invalidations(), 1);
        store.disarm();
        assert!(store.invalidate_by_tag(&tag).await.is_ok());
    }
}
