//! OpenAPI Specification for the job board API
//!
//! Generated from the route annotations and the request/response types with
//! utoipa. Served at `/openapi.json` and rendered by Swagger UI when the
//! `swagger-ui` feature is enabled.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::constants::{ORG_ID_HEADER, USER_ID_HEADER};
use crate::error::{ApiError, ErrorCode};
use crate::types::*;

// Import route modules for path references
use crate::routes::{employer, health, job_listings, me, webhooks};

use jobboard_core::{
    Applicant, ApplicationKey, ApplicationStage, ApplicationWithApplicant, ExperienceLevel,
    JobListing, JobListingApplication, JobListingId, JobListingMenuItem, JobListingStatus,
    JobListingType, LocationRequirement, Organization, OrganizationId, OrganizationSummary,
    OrganizationUserSettings, PublishedJobListing, User, UserId, UserNotificationSettings,
    UserResume, WageInterval,
};

/// OpenAPI document for the job board API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Job Board API",
        version = "0.1.0",
        description = "Job listings, applications and employer tooling backed by a tag-invalidated read cache",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Job Listings", description = "Public job board and the apply flow"),
        (name = "Me", description = "The signed-in user's resume, settings and applications"),
        (name = "Employer", description = "Listing and applicant management for the active organization"),
        (name = "Webhooks", description = "Identity-provider user and organization sync"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        // === Job Seeker Routes ===
        job_listings::list_published,
        job_listings::get_published,
        job_listings::get_my_application,
        job_listings::apply,

        // === Signed-in User Routes ===
        me::get_resume,
        me::put_resume,
        me::get_notification_settings,
        me::put_notification_settings,
        me::list_my_applications,

        // === Employer Routes ===
        employer::list_job_listings,
        employer::create_job_listing,
        employer::get_job_listing,
        employer::update_job_listing,
        employer::delete_job_listing,
        employer::update_job_listing_status,
        employer::update_job_listing_featured,
        employer::list_applications,
        employer::update_application,
        employer::move_application,
        employer::get_settings,
        employer::put_settings,

        // === Webhooks ===
        webhooks::receive_identity_webhook,

        // === Health & Metrics ===
        health::ping,
        health::liveness,
        health::readiness,
        crate::telemetry::metrics::metrics_handler,
    ),
    components(
        schemas(
            // === Error Types ===
            ApiError, ErrorCode,

            // === Request/Response Types ===
            JobListingRequest, UpdateJobListingStatusRequest, UpdateJobListingFeaturedRequest,
            JobBoardResponse, ListingMenuResponse, EmployerJobListingResponse,
            ApplyRequest, UpdateApplicationRequest, MoveApplicationRequest,
            ListingApplicationsResponse, MyApplicationsResponse,
            ResumeRequest, NotificationSettingsRequest, OrganizationUserSettingsRequest,
            webhooks::WebhookAck,
            health::HealthResponse, health::HealthStatus, health::HealthDetails,
            health::ComponentHealth,

            // === Domain Types (from jobboard-core) ===
            UserId, OrganizationId, JobListingId, ApplicationKey,
            WageInterval, LocationRequirement, ExperienceLevel, JobListingStatus,
            JobListingType, ApplicationStage,
            User, Organization, OrganizationSummary, JobListing, PublishedJobListing,
            JobListingMenuItem, JobListingApplication, Applicant, ApplicationWithApplicant,
            UserResume, UserNotificationSettings, OrganizationUserSettings
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Identity headers forwarded by the edge.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "user_id",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(USER_ID_HEADER))),
            );
            components.add_security_scheme(
                "org_id",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(ORG_ID_HEADER))),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_every_route_group() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in [
            "/api/v1/job-listings",
            "/api/v1/job-listings/{id}/applications",
            "/api/v1/me/resume",
            "/api/v1/employer/job-listings/{id}/applications/{user_id}/move",
            "/api/webhooks/identity",
            "/health/ready",
        ] {
            assert!(
                paths.iter().any(|p| p.as_str() == expected),
                "missing path {}",
                expected
            );
        }
    }

    #[test]
    fn test_openapi_serializes() {
        let json = serde_json::to_string(&ApiDoc::openapi()).expect("document should serialize");
        assert!(json.contains("JobListingRequest"));
        assert!(json.contains("x-user-id"));
    }
}
