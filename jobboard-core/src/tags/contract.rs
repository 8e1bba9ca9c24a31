//! Write-side invalidation contract.
//!
//! Every successful write of an entity invalidates its global tag, its id
//! tag and one relation tag per foreign key. A write that moves a foreign key
//! invalidates the relation tags on both sides ([`moved_write_tags`]).
//! Deletes that cascade through the schema report the removed children so
//! the writer can invalidate them as well, together with the dependent
//! type's relation tag keyed by the parent.

use super::{global_tag, id_tag, relation_tag, Tag, TagSet};
use crate::{
    EntityType, JobListing, JobListingApplication, Organization, OrganizationUserSettings,
    RelatedEntity, User, UserNotificationSettings, UserResume,
};

/// An entity whose writes invalidate cached reads.
pub trait CacheTagged {
    const ENTITY_TYPE: EntityType;

    /// Id-scope tag of this instance.
    fn id_tag(&self) -> Tag;

    /// One relation-scope tag per foreign key held by this instance.
    fn relation_tags(&self) -> Vec<Tag> {
        Vec::new()
    }

    /// Full tag set a write of this instance must invalidate.
    fn write_tags(&self) -> TagSet {
        let mut tags = TagSet::new(global_tag(Self::ENTITY_TYPE)).with(self.id_tag());
        tags.extend(self.relation_tags());
        tags
    }
}

/// Tags for a write that changed an instance's foreign keys: the relation
/// scopes it left and the ones it entered.
pub fn moved_write_tags<E: CacheTagged>(before: &E, after: &E) -> TagSet {
    before.write_tags().union(after.write_tags())
}

impl CacheTagged for User {
    const ENTITY_TYPE: EntityType = EntityType::Users;

    fn id_tag(&self) -> Tag {
        id_tag(Self::ENTITY_TYPE, &self.id)
    }
}

impl CacheTagged for Organization {
    const ENTITY_TYPE: EntityType = EntityType::Organizations;

    fn id_tag(&self) -> Tag {
        id_tag(Self::ENTITY_TYPE, &self.id)
    }
}

impl CacheTagged for JobListing {
    const ENTITY_TYPE: EntityType = EntityType::JobListings;

    fn id_tag(&self) -> Tag {
        id_tag(Self::ENTITY_TYPE, &self.id)
    }

    fn relation_tags(&self) -> Vec<Tag> {
        vec![relation_tag(
            Self::ENTITY_TYPE,
            RelatedEntity::Organization,
            &self.organization_id,
        )]
    }
}

impl CacheTagged for JobListingApplication {
    const ENTITY_TYPE: EntityType = EntityType::JobListingApplications;

    fn id_tag(&self) -> Tag {
        id_tag(Self::ENTITY_TYPE, &self.key())
    }

    fn relation_tags(&self) -> Vec<Tag> {
        vec![
            relation_tag(Self::ENTITY_TYPE, RelatedEntity::JobListing, &self.job_listing_id),
            relation_tag(Self::ENTITY_TYPE, RelatedEntity::User, &self.user_id),
        ]
    }
}

impl CacheTagged for UserResume {
    const ENTITY_TYPE: EntityType = EntityType::UserResumes;

    fn id_tag(&self) -> Tag {
        id_tag(Self::ENTITY_TYPE, &self.user_id)
    }

    fn relation_tags(&self) -> Vec<Tag> {
        vec![relation_tag(Self::ENTITY_TYPE, RelatedEntity::User, &self.user_id)]
    }
}

impl CacheTagged for UserNotificationSettings {
    const ENTITY_TYPE: EntityType = EntityType::UserNotificationSettings;

    fn id_tag(&self) -> Tag {
        id_tag(Self::ENTITY_TYPE, &self.user_id)
    }

    fn relation_tags(&self) -> Vec<Tag> {
        vec![relation_tag(Self::ENTITY_TYPE, RelatedEntity::User, &self.user_id)]
    }
}

impl CacheTagged for OrganizationUserSettings {
    const ENTITY_TYPE: EntityType = EntityType::OrganizationUserSettings;

    fn id_tag(&self) -> Tag {
        id_tag(Self::ENTITY_TYPE, &self.key())
    }

    fn relation_tags(&self) -> Vec<Tag> {
        vec![
            relation_tag(Self::ENTITY_TYPE, RelatedEntity::User, &self.user_id),
            relation_tag(Self::ENTITY_TYPE, RelatedEntity::Organization, &self.organization_id),
        ]
    }
}

// ============================================================================
// CASCADES
// ============================================================================

fn extend_with_all<E: CacheTagged>(tags: &mut TagSet, rows: &[E]) {
    for row in rows {
        tags.extend(row.write_tags());
    }
}

/// A deleted job listing and the applications removed with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobListingCascade {
    pub job_listing: JobListing,
    pub applications: Vec<JobListingApplication>,
}

impl JobListingCascade {
    pub fn write_tags(&self) -> TagSet {
        let mut tags = self.job_listing.write_tags().with(relation_tag(
            EntityType::JobListingApplications,
            RelatedEntity::JobListing,
            &self.job_listing.id,
        ));
        extend_with_all(&mut tags, &self.applications);
        tags
    }
}

/// A deleted organization, its listings (with their applications) and its
/// members' settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationCascade {
    pub organization: Organization,
    pub job_listings: Vec<JobListingCascade>,
    pub member_settings: Vec<OrganizationUserSettings>,
}

impl OrganizationCascade {
    pub fn write_tags(&self) -> TagSet {
        let org_id = &self.organization.id;
        let mut tags = self
            .organization
            .write_tags()
            .with(relation_tag(EntityType::JobListings, RelatedEntity::Organization, org_id))
            .with(relation_tag(
                EntityType::OrganizationUserSettings,
                RelatedEntity::Organization,
                org_id,
            ));
        for listing in &self.job_listings {
            tags.extend(listing.write_tags());
        }
        extend_with_all(&mut tags, &self.member_settings);
        tags
    }
}

/// A deleted user and every row keyed by them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCascade {
    pub user: User,
    pub applications: Vec<JobListingApplication>,
    pub resume: Option<UserResume>,
    pub notification_settings: Option<UserNotificationSettings>,
    pub organization_settings: Vec<OrganizationUserSettings>,
}

impl UserCascade {
    pub fn write_tags(&self) -> TagSet {
        let user_id = &self.user.id;
        let mut tags = self
            .user
            .write_tags()
            .with(relation_tag(
                EntityType::JobListingApplications,
                RelatedEntity::User,
                user_id,
            ))
            .with(id_tag(EntityType::UserResumes, user_id))
            .with(id_tag(EntityType::UserNotificationSettings, user_id))
            .with(relation_tag(
                EntityType::OrganizationUserSettings,
                RelatedEntity::User,
                user_id,
            ));
        extend_with_all(&mut tags, &self.applications);
        if let Some(resume) = &self.resume {
            tags.extend(resume.write_tags());
        }
        if let Some(settings) = &self.notification_settings {
            tags.extend(settings.write_tags());
        }
        extend_with_all(&mut tags, &self.organization_settings);
        tags
    }
}
