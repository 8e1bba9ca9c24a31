//! Employer Routes
//!
//! Everything here is scoped to the caller's active organization. A listing
//! owned by another organization is reported as not found, never as
//! forbidden, so ids of other employers' drafts are not confirmed.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use jobboard_core::{
    ApplicationKey, JobListing, JobListingApplication, JobListingId, OrganizationUserKey,
    OrganizationUserSettings, UserId,
};
use jobboard_storage::OrganizationUserSettingsUpsert;

use crate::{
    cached_db::CachedDb,
    error::{ApiError, ApiResult},
    middleware::OrgExtractor,
    state::AppState,
    types::{
        EmployerJobListingResponse, JobListingRequest, ListingApplicationsResponse,
        ListingMenuResponse, MoveApplicationRequest, OrganizationUserSettingsRequest,
        UpdateApplicationRequest, UpdateJobListingFeaturedRequest, UpdateJobListingStatusRequest,
    },
    validation::{
        validate_job_listing, validate_organization_user_settings, validate_rating, HasUpdates,
    },
};

async fn owned_listing(
    db: &CachedDb,
    ctx: &OrgExtractor,
    id: JobListingId,
) -> ApiResult<JobListing> {
    db.job_listing_for_organization(&ctx.organization_id, id)
        .await?
        .ok_or_else(|| ApiError::job_listing_not_found(id))
}

// ============================================================================
// JOB LISTINGS
// ============================================================================

/// GET /api/v1/employer/job-listings - The organization's listings
#[utoipa::path(
    get,
    path = "/api/v1/employer/job-listings",
    tag = "Employer",
    responses(
        (status = 200, description = "Listing menu", body = ListingMenuResponse),
        (status = 401, description = "Not signed in", body = ApiError),
        (status = 403, description = "No active organization", body = ApiError),
    ),
)]
pub async fn list_job_listings(
    State(db): State<CachedDb>,
    ctx: OrgExtractor,
) -> ApiResult<Json<ListingMenuResponse>> {
    let job_listings = db.listing_menu(&ctx.organization_id).await?;
    Ok(Json(ListingMenuResponse { job_listings }))
}

/// POST /api/v1/employer/job-listings - Create a draft listing
#[utoipa::path(
    post,
    path = "/api/v1/employer/job-listings",
    tag = "Employer",
    request_body = JobListingRequest,
    responses(
        (status = 201, description = "Draft created", body = JobListing),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 401, description = "Not signed in", body = ApiError),
        (status = 403, description = "No active organization", body = ApiError),
        (status = 404, description = "Organization not synced yet", body = ApiError),
    ),
)]
pub async fn create_job_listing(
    State(db): State<CachedDb>,
    ctx: OrgExtractor,
    Json(req): Json<JobListingRequest>,
) -> ApiResult<impl IntoResponse> {
    let req = validate_job_listing(req)?;
    let listing = db
        .create_job_listing(req.into_new(ctx.organization_id.clone()))
        .await?;
    tracing::info!(
        job_listing_id = %listing.id,
        organization_id = %listing.organization_id,
        user_id = %ctx.user_id,
        "Job listing created"
    );
    Ok((StatusCode::CREATED, Json(listing)))
}

/// GET /api/v1/employer/job-listings/{id} - Listing with its application count
#[utoipa::path(
    get,
    path = "/api/v1/employer/job-listings/{id}",
    tag = "Employer",
    params(
        ("id" = String, Path, description = "Job listing ID (UUID)")
    ),
    responses(
        (status = 200, description = "Listing details", body = EmployerJobListingResponse),
        (status = 404, description = "Listing not found", body = ApiError),
    ),
)]
pub async fn get_job_listing(
    State(db): State<CachedDb>,
    ctx: OrgExtractor,
    Path(id): Path<JobListingId>,
) -> ApiResult<Json<EmployerJobListingResponse>> {
    let job_listing = owned_listing(&db, &ctx, id).await?;
    let application_count = db.application_count(id).await?;
    Ok(Json(EmployerJobListingResponse {
        job_listing,
        application_count,
    }))
}

/// PUT /api/v1/employer/job-listings/{id} - Replace the listing's form fields
#[utoipa::path(
    put,
    path = "/api/v1/employer/job-listings/{id}",
    tag = "Employer",
    params(
        ("id" = String, Path, description = "Job listing ID (UUID)")
    ),
    request_body = JobListingRequest,
    responses(
        (status = 200, description = "Listing updated", body = JobListing),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Listing not found", body = ApiError),
    ),
)]
pub async fn update_job_listing(
    State(db): State<CachedDb>,
    ctx: OrgExtractor,
    Path(id): Path<JobListingId>,
    Json(req): Json<JobListingRequest>,
) -> ApiResult<Json<JobListing>> {
    let req = validate_job_listing(req)?;
    let listing = db
        .update_job_listing(&ctx.organization_id, id, req.into_update())
        .await?;
    Ok(Json(listing))
}

/// DELETE /api/v1/employer/job-listings/{id} - Delete a listing and its applications
#[utoipa::path(
    delete,
    path = "/api/v1/employer/job-listings/{id}",
    tag = "Employer",
    params(
        ("id" = String, Path, description = "Job listing ID (UUID)")
    ),
    responses(
        (status = 204, description = "Listing deleted"),
        (status = 404, description = "Listing not found", body = ApiError),
    ),
)]
pub async fn delete_job_listing(
    State(db): State<CachedDb>,
    ctx: OrgExtractor,
    Path(id): Path<JobListingId>,
) -> ApiResult<StatusCode> {
    db.delete_job_listing(&ctx.organization_id, id).await?;
    tracing::info!(job_listing_id = %id, user_id = %ctx.user_id, "Job listing deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/employer/job-listings/{id}/status - Publish, delist or revert to draft
#[utoipa::path(
    put,
    path = "/api/v1/employer/job-listings/{id}/status",
    tag = "Employer",
    params(
        ("id" = String, Path, description = "Job listing ID (UUID)")
    ),
    request_body = UpdateJobListingStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = JobListing),
        (status = 404, description = "Listing not found", body = ApiError),
    ),
)]
pub async fn update_job_listing_status(
    State(db): State<CachedDb>,
    ctx: OrgExtractor,
    Path(id): Path<JobListingId>,
    Json(req): Json<UpdateJobListingStatusRequest>,
) -> ApiResult<Json<JobListing>> {
    let listing = db
        .set_job_listing_status(&ctx.organization_id, id, req.status)
        .await?;
    Ok(Json(listing))
}

/// PUT /api/v1/employer/job-listings/{id}/featured - Toggle featured placement
#[utoipa::path(
    put,
    path = "/api/v1/employer/job-listings/{id}/featured",
    tag = "Employer",
    params(
        ("id" = String, Path, description = "Job listing ID (UUID)")
    ),
    request_body = UpdateJobListingFeaturedRequest,
    responses(
        (status = 200, description = "Featured flag changed", body = JobListing),
        (status = 404, description = "Listing not found", body = ApiError),
    ),
)]
pub async fn update_job_listing_featured(
    State(db): State<CachedDb>,
    ctx: OrgExtractor,
    Path(id): Path<JobListingId>,
    Json(req): Json<UpdateJobListingFeaturedRequest>,
) -> ApiResult<Json<JobListing>> {
    let listing = db
        .set_job_listing_featured(&ctx.organization_id, id, req.is_featured)
        .await?;
    Ok(Json(listing))
}

// ============================================================================
// APPLICATIONS
// ============================================================================

/// GET /api/v1/employer/job-listings/{id}/applications - Applicants for a listing
#[utoipa::path(
    get,
    path = "/api/v1/employer/job-listings/{id}/applications",
    tag = "Employer",
    params(
        ("id" = String, Path, description = "Job listing ID (UUID)")
    ),
    responses(
        (status = 200, description = "Applications with applicant details", body = ListingApplicationsResponse),
        (status = 404, description = "Listing not found", body = ApiError),
    ),
)]
pub async fn list_applications(
    State(db): State<CachedDb>,
    ctx: OrgExtractor,
    Path(id): Path<JobListingId>,
) -> ApiResult<Json<ListingApplicationsResponse>> {
    owned_listing(&db, &ctx, id).await?;
    let applications = db.applications_for_listing(id).await?;
    Ok(Json(ListingApplicationsResponse { applications }))
}

/// PUT /api/v1/employer/job-listings/{id}/applications/{user_id} - Stage and rating
#[utoipa::path(
    put,
    path = "/api/v1/employer/job-listings/{id}/applications/{user_id}",
    tag = "Employer",
    params(
        ("id" = String, Path, description = "Job listing ID (UUID)"),
        ("user_id" = String, Path, description = "Applicant user ID")
    ),
    request_body = UpdateApplicationRequest,
    responses(
        (status = 200, description = "Application updated", body = JobListingApplication),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Listing or application not found", body = ApiError),
    ),
)]
pub async fn update_application(
    State(db): State<CachedDb>,
    ctx: OrgExtractor,
    Path((id, user_id)): Path<(JobListingId, String)>,
    Json(req): Json<UpdateApplicationRequest>,
) -> ApiResult<Json<JobListingApplication>> {
    req.validate_has_updates()?;
    validate_rating(req.rating.flatten(), "rating")?;

    let key = ApplicationKey::new(id, UserId::new(user_id));
    let application = db
        .update_application(&ctx.organization_id, key, req.into())
        .await?;
    Ok(Json(application))
}

/// POST /api/v1/employer/job-listings/{id}/applications/{user_id}/move
///
/// Moves the application to another listing of the same organization.
#[utoipa::path(
    post,
    path = "/api/v1/employer/job-listings/{id}/applications/{user_id}/move",
    tag = "Employer",
    params(
        ("id" = String, Path, description = "Current job listing ID (UUID)"),
        ("user_id" = String, Path, description = "Applicant user ID")
    ),
    request_body = MoveApplicationRequest,
    responses(
        (status = 200, description = "Application moved", body = JobListingApplication),
        (status = 404, description = "Listing or application not found", body = ApiError),
        (status = 409, description = "Applicant already applied to the target", body = ApiError),
    ),
)]
pub async fn move_application(
    State(db): State<CachedDb>,
    ctx: OrgExtractor,
    Path((id, user_id)): Path<(JobListingId, String)>,
    Json(req): Json<MoveApplicationRequest>,
) -> ApiResult<Json<JobListingApplication>> {
    let key = ApplicationKey::new(id, UserId::new(user_id));
    let application = db
        .move_application(&ctx.organization_id, key, req.job_listing_id)
        .await?;
    Ok(Json(application))
}

// ============================================================================
// MEMBER SETTINGS
// ============================================================================

/// GET /api/v1/employer/settings - The caller's settings in this organization
#[utoipa::path(
    get,
    path = "/api/v1/employer/settings",
    tag = "Employer",
    responses(
        (status = 200, description = "Member settings", body = OrganizationUserSettings),
        (status = 404, description = "No settings saved yet", body = ApiError),
    ),
)]
pub async fn get_settings(
    State(db): State<CachedDb>,
    ctx: OrgExtractor,
) -> ApiResult<Json<OrganizationUserSettings>> {
    let key = OrganizationUserKey::new(ctx.user_id.clone(), ctx.organization_id.clone());
    let settings = db
        .organization_user_settings(&key)
        .await?
        .ok_or_else(|| ApiError::entity_not_found("organization_user_settings", &key))?;
    Ok(Json(settings))
}

/// PUT /api/v1/employer/settings - New-application notifications and rating threshold
#[utoipa::path(
    put,
    path = "/api/v1/employer/settings",
    tag = "Employer",
    request_body = OrganizationUserSettingsRequest,
    responses(
        (status = 200, description = "Settings saved", body = OrganizationUserSettings),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "User or organization not synced yet", body = ApiError),
    ),
)]
pub async fn put_settings(
    State(db): State<CachedDb>,
    ctx: OrgExtractor,
    Json(req): Json<OrganizationUserSettingsRequest>,
) -> ApiResult<Json<OrganizationUserSettings>> {
    let req = validate_organization_user_settings(req)?;
    let OrgExtractor(ctx) = ctx;
    let settings = db
        .upsert_organization_user_settings(OrganizationUserSettingsUpsert {
            user_id: ctx.user_id,
            organization_id: ctx.organization_id,
            new_application_email_notifications: req.new_application_email_notifications,
            minimum_rating: req.minimum_rating,
        })
        .await?;
    Ok(Json(settings))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/job-listings", get(list_job_listings).post(create_job_listing))
        .route(
            "/job-listings/:id",
            get(get_job_listing)
                .put(update_job_listing)
                .delete(delete_job_listing),
        )
        .route("/job-listings/:id/status", put(update_job_listing_status))
        .route("/job-listings/:id/featured", put(update_job_listing_featured))
        .route("/job-listings/:id/applications", get(list_applications))
        .route(
            "/job-listings/:id/applications/:user_id",
            put(update_application),
        )
        .route(
            "/job-listings/:id/applications/:user_id/move",
            post(move_application),
        )
        .route("/settings", get(get_settings).put(put_settings))
}
