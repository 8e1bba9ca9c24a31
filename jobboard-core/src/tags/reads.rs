//! Read shapes and the tags each must carry.
//!
//! | Read shape                                   | Tags at call site                         | Tags discovered while fetching                     |
//! |----------------------------------------------|-------------------------------------------|----------------------------------------------------|
//! | listing by id for its organization           | `jobListings:id:L`                        |                                                    |
//! | published listing by id with organization    | `jobListings:id:L`                        | `organizations:id:O`                               |
//! | published listing existence (apply flow)     | `jobListings:id:L`                        |                                                    |
//! | published listings board                     | `jobListings:global`                      | `organizations:id:O` per row                       |
//! | employer listing menu with application count | `jobListings:organization:O`              | `jobListingApplications:jobListing:L` per row      |
//! | applications for a listing, with applicant   | `jobListingApplications:jobListing:L`     | `users:id:U`, `userResumes:id:U` per row           |
//! | application count for a listing              | `jobListingApplications:jobListing:L`     |                                                    |
//! | applications of a user                       | `jobListingApplications:user:U`           |                                                    |
//! | application by (listing, user)               | `jobListingApplications:id:(L,U)`         |                                                    |
//! | user by id                                   | `users:id:U`                              |                                                    |
//! | organization by id                           | `organizations:id:O`                      |                                                    |
//! | resume of a user                             | `userResumes:id:U`                        |                                                    |
//! | notification settings of a user              | `userNotificationSettings:id:U`           |                                                    |
//! | organization settings of a member            | `organizationUserSettings:id:(U,O)`       |                                                    |
//! | members notified of new applications         | `organizationUserSettings:organization:O` |                                                    |
//!
//! Keep this table and the functions below in step: a read that omits a
//! dependency keeps serving stale data after the next write to that scope.

use super::{global_tag, id_tag, relation_tag, Tag, TagSet};
use crate::{
    ApplicationKey, EntityType, JobListingId, OrganizationId, OrganizationUserKey, RelatedEntity,
    UserId,
};

pub fn job_listing_for_organization(id: &JobListingId) -> TagSet {
    TagSet::new(id_tag(EntityType::JobListings, id))
}

/// Call-site tags; the organization is registered once it is known.
pub fn published_job_listing(id: &JobListingId) -> TagSet {
    TagSet::new(id_tag(EntityType::JobListings, id))
}

pub fn published_job_listing_exists(id: &JobListingId) -> TagSet {
    TagSet::new(id_tag(EntityType::JobListings, id))
}

pub fn published_board() -> TagSet {
    TagSet::new(global_tag(EntityType::JobListings))
}

pub fn listing_menu(organization_id: &OrganizationId) -> TagSet {
    TagSet::new(relation_tag(
        EntityType::JobListings,
        RelatedEntity::Organization,
        organization_id,
    ))
}

pub fn applications_for_listing(id: &JobListingId) -> TagSet {
    TagSet::new(listing_applications(id))
}

pub fn application_count(id: &JobListingId) -> TagSet {
    TagSet::new(listing_applications(id))
}

pub fn applications_for_user(user_id: &UserId) -> TagSet {
    TagSet::new(relation_tag(
        EntityType::JobListingApplications,
        RelatedEntity::User,
        user_id,
    ))
}

pub fn application(key: &ApplicationKey) -> TagSet {
    TagSet::new(id_tag(EntityType::JobListingApplications, key))
}

pub fn user(id: &UserId) -> TagSet {
    TagSet::new(id_tag(EntityType::Users, id))
}

pub fn organization(id: &OrganizationId) -> TagSet {
    TagSet::new(discovered_organization(id))
}

pub fn user_resume(user_id: &UserId) -> TagSet {
    TagSet::new(id_tag(EntityType::UserResumes, user_id))
}

pub fn notification_settings(user_id: &UserId) -> TagSet {
    TagSet::new(id_tag(EntityType::UserNotificationSettings, user_id))
}

pub fn organization_user_settings(key: &OrganizationUserKey) -> TagSet {
    TagSet::new(id_tag(EntityType::OrganizationUserSettings, key))
}

pub fn notifiable_members(organization_id: &OrganizationId) -> TagSet {
    TagSet::new(relation_tag(
        EntityType::OrganizationUserSettings,
        RelatedEntity::Organization,
        organization_id,
    ))
}

// ============================================================================
// DISCOVERED DEPENDENCIES
// ============================================================================

/// Organization joined into a listing read.
pub fn discovered_organization(id: &OrganizationId) -> Tag {
    id_tag(EntityType::Organizations, id)
}

/// Applications aggregated into a listing menu row.
pub fn listing_applications(id: &JobListingId) -> Tag {
    relation_tag(
        EntityType::JobListingApplications,
        RelatedEntity::JobListing,
        id,
    )
}

/// Applicant profile and resume joined into an application row.
pub fn discovered_applicant(user_id: &UserId) -> [Tag; 2] {
    [
        id_tag(EntityType::Users, user_id),
        id_tag(EntityType::UserResumes, user_id),
    ]
}
