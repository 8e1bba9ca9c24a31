//! Job board storage: the data-access trait, an in-memory implementation
//! and the tag-invalidated cache layer.
//!
//! The Postgres implementation lives in `jobboard-api`, next to its pool.

pub mod cache;
pub mod memory;
pub mod store;

pub use memory::InMemoryStore;
pub use store::{ApplicationMove, JobBoardStore};

// Re-export cache types for API integration
pub use cache::{
    CacheConfig, CacheKey, CacheRead, CacheStats, CachedEntry, InMemoryTagStore,
    InvalidationJournal, LmdbCacheError, LmdbTagStore, PendingTags, PruneReport, TagStore,
    TaggedCache, Watermark,
};

use chrono::Utc;
use jobboard_core::{
    ApplicationStage, ExperienceLevel, JobListing, JobListingApplication, JobListingId,
    JobListingStatus, JobListingType, LocationRequirement, OrganizationId, Timestamp, UserId,
    UserResume, WageInterval,
};

// ============================================================================
// WRITE PAYLOADS
// ============================================================================

/// User row as mirrored from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserUpsert {
    pub id: UserId,
    pub name: String,
    pub image_url: String,
    pub email: String,
}

/// Organization row as mirrored from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationUpsert {
    pub id: OrganizationId,
    pub name: String,
    pub image_url: Option<String>,
}

/// A new listing. Listings are always created as unfeatured drafts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJobListing {
    pub organization_id: OrganizationId,
    pub title: String,
    pub description: String,
    pub wage: Option<i32>,
    pub wage_interval: Option<WageInterval>,
    pub state_abbreviation: Option<String>,
    pub city: Option<String>,
    pub location_requirement: LocationRequirement,
    pub experience_level: ExperienceLevel,
    pub listing_type: JobListingType,
}

impl NewJobListing {
    pub fn into_listing(self, id: JobListingId, now: Timestamp) -> JobListing {
        JobListing {
            id,
            organization_id: self.organization_id,
            title: self.title,
            description: self.description,
            wage: self.wage,
            wage_interval: self.wage_interval,
            state_abbreviation: self.state_abbreviation,
            city: self.city,
            is_featured: false,
            location_requirement: self.location_requirement,
            experience_level: self.experience_level,
            status: JobListingStatus::Draft,
            listing_type: self.listing_type,
            posted_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Update payload for job listings.
///
/// Nullable columns use `Option<Option<_>>`: the outer `None` leaves the
/// column alone, `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobListingUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub wage: Option<Option<i32>>,
    pub wage_interval: Option<Option<WageInterval>>,
    pub state_abbreviation: Option<Option<String>>,
    pub city: Option<Option<String>>,
    pub location_requirement: Option<LocationRequirement>,
    pub experience_level: Option<ExperienceLevel>,
    pub listing_type: Option<JobListingType>,
    pub status: Option<JobListingStatus>,
    pub is_featured: Option<bool>,
}

impl JobListingUpdate {
    pub fn status(status: JobListingStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn featured(is_featured: bool) -> Self {
        Self {
            is_featured: Some(is_featured),
            ..Self::default()
        }
    }

    /// Apply the update in place. The first transition to `published`
    /// stamps `posted_at`; later republishing keeps the original date.
    pub fn apply_to(self, listing: &mut JobListing, now: Timestamp) {
        if let Some(title) = self.title {
            listing.title = title;
        }
        if let Some(description) = self.description {
            listing.description = description;
        }
        if let Some(wage) = self.wage {
            listing.wage = wage;
        }
        if let Some(wage_interval) = self.wage_interval {
            listing.wage_interval = wage_interval;
        }
        if let Some(state) = self.state_abbreviation {
            listing.state_abbreviation = state;
        }
        if let Some(city) = self.city {
            listing.city = city;
        }
        if let Some(location) = self.location_requirement {
            listing.location_requirement = location;
        }
        if let Some(level) = self.experience_level {
            listing.experience_level = level;
        }
        if let Some(listing_type) = self.listing_type {
            listing.listing_type = listing_type;
        }
        if let Some(is_featured) = self.is_featured {
            listing.is_featured = is_featured;
        }
        if let Some(status) = self.status {
            if status == JobListingStatus::Published && listing.posted_at.is_none() {
                listing.posted_at = Some(now);
            }
            listing.status = status;
        }
        listing.updated_at = now;
    }
}

/// A new application; stage starts at `applied` and rating is unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApplication {
    pub job_listing_id: JobListingId,
    pub user_id: UserId,
    pub cover_letter: Option<String>,
}

impl NewApplication {
    pub fn into_application(self, now: Timestamp) -> JobListingApplication {
        JobListingApplication {
            job_listing_id: self.job_listing_id,
            user_id: self.user_id,
            cover_letter: self.cover_letter,
            rating: None,
            stage: ApplicationStage::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Update payload for applications.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationUpdate {
    pub stage: Option<ApplicationStage>,
    pub rating: Option<Option<i16>>,
}

impl ApplicationUpdate {
    pub fn apply_to(self, application: &mut JobListingApplication, now: Timestamp) {
        if let Some(stage) = self.stage {
            application.stage = stage;
        }
        if let Some(rating) = self.rating {
            application.rating = rating;
        }
        application.updated_at = now;
    }
}

/// Uploaded resume file. Replacing the file keeps any existing summary
/// until a new one is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeUpsert {
    pub user_id: UserId,
    pub resume_file_url: String,
    pub resume_file_key: String,
}

/// Update payload for resumes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeUpdate {
    pub resume_file_url: Option<String>,
    pub resume_file_key: Option<String>,
    pub ai_summary: Option<Option<String>>,
}

impl ResumeUpdate {
    pub fn apply_to(self, resume: &mut UserResume, now: Timestamp) {
        if let Some(url) = self.resume_file_url {
            resume.resume_file_url = url;
        }
        if let Some(key) = self.resume_file_key {
            resume.resume_file_key = key;
        }
        if let Some(summary) = self.ai_summary {
            resume.ai_summary = summary;
        }
        resume.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSettingsUpsert {
    pub user_id: UserId,
    pub new_job_email_notifications: bool,
    pub ai_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationUserSettingsUpsert {
    pub user_id: UserId,
    pub organization_id: OrganizationId,
    pub new_application_email_notifications: bool,
    pub minimum_rating: Option<i16>,
}

/// Current time, truncated to the microsecond precision Postgres keeps so
/// rows compare equal after a round trip.
pub fn now() -> Timestamp {
    let now = Utc::now();
    let micros = now.timestamp_micros();
    chrono::DateTime::from_timestamp_micros(micros).unwrap_or(now)
}
