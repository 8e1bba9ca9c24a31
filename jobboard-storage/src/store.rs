//! Async data-access trait for the job board.
//!
//! Implementations only move rows. Tagging reads and invalidating after
//! writes is the caller's job (see `jobboard-api::cached_db`), which is why
//! deletes hand back everything they removed.

use async_trait::async_trait;
use jobboard_core::{
    ApplicationKey, ApplicationWithApplicant, JobBoardResult, JobListing, JobListingApplication,
    JobListingCascade, JobListingId, JobListingMenuItem, Organization, OrganizationCascade,
    OrganizationId, OrganizationUserKey, OrganizationUserSettings, PublishedJobListing, User,
    UserCascade, UserId, UserNotificationSettings, UserResume,
};

use crate::{
    ApplicationUpdate, JobListingUpdate, NewApplication, NewJobListing,
    NotificationSettingsUpsert, OrganizationUpsert, OrganizationUserSettingsUpsert, ResumeUpdate,
    ResumeUpsert, UserUpsert,
};

/// An application before and after its listing changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationMove {
    pub before: JobListingApplication,
    pub after: JobListingApplication,
}

/// Async storage trait for job board rows.
///
/// Lookups of a missing row return `Ok(None)`; updates of a missing row
/// return `StorageError::NotFound`.
#[async_trait]
pub trait JobBoardStore: Send + Sync {
    // ========================================================================
    // USERS
    // ========================================================================

    async fn user_upsert(&self, user: UserUpsert) -> JobBoardResult<User>;

    async fn user_get(&self, id: &UserId) -> JobBoardResult<Option<User>>;

    /// Delete a user and every row keyed by them. `None` if absent.
    async fn user_delete(&self, id: &UserId) -> JobBoardResult<Option<UserCascade>>;

    // ========================================================================
    // ORGANIZATIONS
    // ========================================================================

    async fn organization_upsert(&self, org: OrganizationUpsert) -> JobBoardResult<Organization>;

    async fn organization_get(&self, id: &OrganizationId) -> JobBoardResult<Option<Organization>>;

    /// Delete an organization together with its listings, their
    /// applications and its members' settings. `None` if absent.
    async fn organization_delete(
        &self,
        id: &OrganizationId,
    ) -> JobBoardResult<Option<OrganizationCascade>>;

    // ========================================================================
    // JOB LISTINGS
    // ========================================================================

    /// Insert a draft listing. The organization must exist.
    async fn job_listing_insert(&self, listing: NewJobListing) -> JobBoardResult<JobListing>;

    /// Listing by id regardless of status.
    async fn job_listing_get(&self, id: &JobListingId) -> JobBoardResult<Option<JobListing>>;

    /// Published listing by id, joined with its organization.
    async fn job_listing_get_published(
        &self,
        id: &JobListingId,
    ) -> JobBoardResult<Option<PublishedJobListing>>;

    async fn job_listing_update(
        &self,
        id: &JobListingId,
        update: JobListingUpdate,
    ) -> JobBoardResult<JobListing>;

    /// Delete a listing and its applications. `None` if absent.
    async fn job_listing_delete(&self, id: &JobListingId)
        -> JobBoardResult<Option<JobListingCascade>>;

    /// Published listings, featured first, then most recently posted.
    async fn job_listing_list_published(&self) -> JobBoardResult<Vec<PublishedJobListing>>;

    /// Every listing of an organization, newest first, with its
    /// application count.
    async fn job_listing_menu_for_org(
        &self,
        organization_id: &OrganizationId,
    ) -> JobBoardResult<Vec<JobListingMenuItem>>;

    // ========================================================================
    // APPLICATIONS
    // ========================================================================

    /// Insert an application. A second application by the same user to the
    /// same listing fails with `StorageError::AlreadyExists`.
    async fn application_insert(
        &self,
        application: NewApplication,
    ) -> JobBoardResult<JobListingApplication>;

    async fn application_get(
        &self,
        key: &ApplicationKey,
    ) -> JobBoardResult<Option<JobListingApplication>>;

    async fn application_update(
        &self,
        key: &ApplicationKey,
        update: ApplicationUpdate,
    ) -> JobBoardResult<JobListingApplication>;

    /// Re-point an application at another listing.
    async fn application_move(
        &self,
        key: &ApplicationKey,
        to: &JobListingId,
    ) -> JobBoardResult<ApplicationMove>;

    /// Applications of a listing with each applicant's profile and resume.
    async fn application_list_for_listing(
        &self,
        job_listing_id: &JobListingId,
    ) -> JobBoardResult<Vec<ApplicationWithApplicant>>;

    async fn application_count_for_listing(&self, job_listing_id: &JobListingId)
        -> JobBoardResult<u64>;

    /// Applications of a user, newest first.
    async fn application_list_for_user(
        &self,
        user_id: &UserId,
    ) -> JobBoardResult<Vec<JobListingApplication>>;

    // ========================================================================
    // RESUMES
    // ========================================================================

    async fn resume_upsert(&self, resume: ResumeUpsert) -> JobBoardResult<UserResume>;

    async fn resume_update(
        &self,
        user_id: &UserId,
        update: ResumeUpdate,
    ) -> JobBoardResult<UserResume>;

    async fn resume_get(&self, user_id: &UserId) -> JobBoardResult<Option<UserResume>>;

    // ========================================================================
    // NOTIFICATION SETTINGS
    // ========================================================================

    /// Insert default settings unless the user already has some. Returns
    /// the inserted row, or `None` when nothing changed.
    async fn notification_settings_insert_default(
        &self,
        user_id: &UserId,
    ) -> JobBoardResult<Option<UserNotificationSettings>>;

    async fn notification_settings_upsert(
        &self,
        settings: NotificationSettingsUpsert,
    ) -> JobBoardResult<UserNotificationSettings>;

    async fn notification_settings_get(
        &self,
        user_id: &UserId,
    ) -> JobBoardResult<Option<UserNotificationSettings>>;

    // ========================================================================
    // ORGANIZATION USER SETTINGS
    // ========================================================================

    async fn org_user_settings_upsert(
        &self,
        settings: OrganizationUserSettingsUpsert,
    ) -> JobBoardResult<OrganizationUserSettings>;

    async fn org_user_settings_get(
        &self,
        key: &OrganizationUserKey,
    ) -> JobBoardResult<Option<OrganizationUserSettings>>;

    /// Members of an organization who opted into new-application emails.
    async fn org_user_settings_list_notifiable(
        &self,
        organization_id: &OrganizationId,
    ) -> JobBoardResult<Vec<OrganizationUserSettings>>;

    // ========================================================================
    // HEALTH
    // ========================================================================

    /// Cheap round trip to the backend for readiness checks.
    async fn ping(&self) -> JobBoardResult<()>;
}
