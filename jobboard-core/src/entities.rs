//! Core entity structures

use crate::{
    ApplicationKey, ApplicationStage, ExperienceLevel, JobListingId, JobListingStatus,
    JobListingType, LocationRequirement, OrganizationId, OrganizationUserKey, Timestamp, UserId,
    WageInterval,
};
use serde::{Deserialize, Serialize};

/// User - mirrored from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct User {
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub id: UserId,
    pub name: String,
    pub image_url: String,
    pub email: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

/// Organization - an employer, mirrored from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Organization {
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub id: OrganizationId,
    pub name: String,
    pub image_url: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

/// The slice of an organization shown next to its public listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OrganizationSummary {
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub id: OrganizationId,
    pub name: String,
    pub image_url: Option<String>,
}

impl From<&Organization> for OrganizationSummary {
    fn from(org: &Organization) -> Self {
        Self {
            id: org.id.clone(),
            name: org.name.clone(),
            image_url: org.image_url.clone(),
        }
    }
}

/// Job listing owned by an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct JobListing {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: JobListingId,
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub organization_id: OrganizationId,
    pub title: String,
    pub description: String,
    pub wage: Option<i32>,
    pub wage_interval: Option<WageInterval>,
    pub state_abbreviation: Option<String>,
    pub city: Option<String>,
    pub is_featured: bool,
    pub location_requirement: LocationRequirement,
    pub experience_level: ExperienceLevel,
    pub status: JobListingStatus,
    #[serde(rename = "type")]
    pub listing_type: JobListingType,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub posted_at: Option<Timestamp>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

/// A published listing joined with its organization, as shown on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PublishedJobListing {
    pub job_listing: JobListing,
    pub organization: OrganizationSummary,
}

/// Row of the employer's listing menu. The application count is a
/// denormalized aggregate over the listing's applications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct JobListingMenuItem {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: JobListingId,
    pub title: String,
    pub status: JobListingStatus,
    pub is_featured: bool,
    pub application_count: u64,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

/// A user's application to a job listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct JobListingApplication {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub job_listing_id: JobListingId,
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub user_id: UserId,
    pub cover_letter: Option<String>,
    /// 1 to 5 when set by the employer.
    pub rating: Option<i16>,
    pub stage: ApplicationStage,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

impl JobListingApplication {
    pub fn key(&self) -> ApplicationKey {
        ApplicationKey::new(self.job_listing_id, self.user_id.clone())
    }
}

/// Applicant details joined onto an application for the employer view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Applicant {
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub user_id: UserId,
    pub name: String,
    pub image_url: String,
    pub email: String,
    pub resume_file_url: Option<String>,
    pub ai_summary: Option<String>,
}

/// An application together with its applicant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApplicationWithApplicant {
    pub application: JobListingApplication,
    pub applicant: Applicant,
}

/// Uploaded resume of a user. The file itself lives with the upload provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserResume {
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub user_id: UserId,
    pub resume_file_url: String,
    pub resume_file_key: String,
    pub ai_summary: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserNotificationSettings {
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub user_id: UserId,
    pub new_job_email_notifications: bool,
    pub ai_prompt: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

/// Per-organization settings of a member user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OrganizationUserSettings {
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub user_id: UserId,
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub organization_id: OrganizationId,
    pub new_application_email_notifications: bool,
    pub minimum_rating: Option<i16>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

impl OrganizationUserSettings {
    pub fn key(&self) -> OrganizationUserKey {
        OrganizationUserKey::new(self.user_id.clone(), self.organization_id.clone())
    }
}
