//! Application API types

use jobboard_core::{ApplicationStage, ApplicationWithApplicant, JobListingApplication, JobListingId};
use jobboard_storage::ApplicationUpdate;
use serde::{Deserialize, Serialize};

use super::double_option;
use crate::validation::HasUpdates;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApplyRequest {
    pub cover_letter: Option<String>,
}

/// Employer review of an application. `rating: null` clears the rating.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateApplicationRequest {
    pub stage: Option<ApplicationStage>,
    #[serde(default, deserialize_with = "double_option")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<i16>, minimum = 1, maximum = 5))]
    pub rating: Option<Option<i16>>,
}

impl HasUpdates for UpdateApplicationRequest {
    fn has_any_updates(&self) -> bool {
        self.stage.is_some() || self.rating.is_some()
    }
}

impl From<UpdateApplicationRequest> for ApplicationUpdate {
    fn from(req: UpdateApplicationRequest) -> Self {
        ApplicationUpdate {
            stage: req.stage,
            rating: req.rating,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MoveApplicationRequest {
    /// Listing of the same organization to move the application to
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub job_listing_id: JobListingId,
}

/// Applications to one listing, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ListingApplicationsResponse {
    pub applications: Vec<ApplicationWithApplicant>,
}

/// The current user's applications, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MyApplicationsResponse {
    pub applications: Vec<JobListingApplication>,
}
