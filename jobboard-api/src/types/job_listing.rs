//! Job listing API types

use jobboard_core::{
    ExperienceLevel, JobListing, JobListingMenuItem, JobListingStatus, JobListingType,
    LocationRequirement, OrganizationId, PublishedJobListing, WageInterval,
};
use jobboard_storage::{JobListingUpdate, NewJobListing};
use serde::{Deserialize, Serialize};

/// Job listing form, used both to create a listing and to replace its
/// editable fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct JobListingRequest {
    pub title: String,
    /// Markdown body
    pub description: String,
    pub wage: Option<i32>,
    pub wage_interval: Option<WageInterval>,
    /// Two-letter state code; required unless the listing is remote
    pub state_abbreviation: Option<String>,
    /// Required unless the listing is remote
    pub city: Option<String>,
    pub location_requirement: LocationRequirement,
    pub experience_level: ExperienceLevel,
    #[serde(rename = "type")]
    pub listing_type: JobListingType,
}

impl JobListingRequest {
    pub fn into_new(self, organization_id: OrganizationId) -> NewJobListing {
        NewJobListing {
            organization_id,
            title: self.title,
            description: self.description,
            wage: self.wage,
            wage_interval: self.wage_interval,
            state_abbreviation: self.state_abbreviation,
            city: self.city,
            location_requirement: self.location_requirement,
            experience_level: self.experience_level,
            listing_type: self.listing_type,
        }
    }

    /// Replace every form field; status and featured are left alone.
    pub fn into_update(self) -> JobListingUpdate {
        JobListingUpdate {
            title: Some(self.title),
            description: Some(self.description),
            wage: Some(self.wage),
            wage_interval: Some(self.wage_interval),
            state_abbreviation: Some(self.state_abbreviation),
            city: Some(self.city),
            location_requirement: Some(self.location_requirement),
            experience_level: Some(self.experience_level),
            listing_type: Some(self.listing_type),
            ..JobListingUpdate::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateJobListingStatusRequest {
    pub status: JobListingStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateJobListingFeaturedRequest {
    pub is_featured: bool,
}

/// The public job board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct JobBoardResponse {
    pub job_listings: Vec<PublishedJobListing>,
    pub total: usize,
}

/// An organization's listings with their application counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ListingMenuResponse {
    pub job_listings: Vec<JobListingMenuItem>,
}

/// A listing as its organization sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EmployerJobListingResponse {
    pub job_listing: JobListing,
    pub application_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> JobListingRequest {
        JobListingRequest {
            title: "Backend Engineer".to_string(),
            description: "Rust services".to_string(),
            wage: Some(50),
            wage_interval: Some(WageInterval::Hourly),
            state_abbreviation: Some("CA".to_string()),
            city: Some("Oakland".to_string()),
            location_requirement: LocationRequirement::Hybrid,
            experience_level: ExperienceLevel::MidLevel,
            listing_type: JobListingType::PartTime,
        }
    }

    #[test]
    fn test_form_uses_type_key() {
        let json = serde_json::to_value(form()).expect("serialize should succeed");
        assert_eq!(json["type"], "part-time");
        assert_eq!(json["location_requirement"], "hybrid");
    }

    #[test]
    fn test_into_update_leaves_status_alone() {
        let update = form().into_update();
        assert_eq!(update.status, None);
        assert_eq!(update.is_featured, None);
        assert_eq!(update.city, Some(Some("Oakland".to_string())));
    }
}
