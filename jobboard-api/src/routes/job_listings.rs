//! Job Seeker Routes
//!
//! The public job board, listing detail and the apply flow. Browsing needs
//! no identity; applying and checking an existing application need the
//! signed-in user.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use jobboard_core::{ApplicationKey, JobListingId, JobListingApplication, PublishedJobListing};
use jobboard_storage::NewApplication;

use crate::{
    cached_db::CachedDb,
    error::{ApiError, ApiResult},
    events::{EventDispatcher, JobBoardEvent},
    middleware::AuthExtractor,
    state::AppState,
    types::{ApplyRequest, JobBoardResponse},
    validation::normalize_optional,
};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/v1/job-listings - Published listings, featured first then newest
#[utoipa::path(
    get,
    path = "/api/v1/job-listings",
    tag = "Job Listings",
    responses(
        (status = 200, description = "Published job listings", body = JobBoardResponse),
    ),
)]
pub async fn list_published(State(db): State<CachedDb>) -> ApiResult<Json<JobBoardResponse>> {
    let job_listings = db.published_board().await?;
    let total = job_listings.len();
    Ok(Json(JobBoardResponse {
        job_listings,
        total,
    }))
}

/// GET /api/v1/job-listings/{id} - Published listing with its organization
#[utoipa::path(
    get,
    path = "/api/v1/job-listings/{id}",
    tag = "Job Listings",
    params(
        ("id" = String, Path, description = "Job listing ID (UUID)")
    ),
    responses(
        (status = 200, description = "Job listing details", body = PublishedJobListing),
        (status = 404, description = "Listing not found or not published", body = ApiError),
    ),
)]
pub async fn get_published(
    State(db): State<CachedDb>,
    Path(id): Path<JobListingId>,
) -> ApiResult<Json<PublishedJobListing>> {
    let listing = db
        .published_job_listing(id)
        .await?
        .ok_or_else(|| ApiError::job_listing_not_found(id))?;
    Ok(Json(listing))
}

/// GET /api/v1/job-listings/{id}/application - The caller's application
#[utoipa::path(
    get,
    path = "/api/v1/job-listings/{id}/application",
    tag = "Job Listings",
    params(
        ("id" = String, Path, description = "Job listing ID (UUID)")
    ),
    responses(
        (status = 200, description = "The caller's application", body = JobListingApplication),
        (status = 401, description = "Not signed in", body = ApiError),
        (status = 404, description = "No application for this listing", body = ApiError),
    ),
)]
pub async fn get_my_application(
    State(db): State<CachedDb>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<JobListingId>,
) -> ApiResult<Json<JobListingApplication>> {
    let key = ApplicationKey::new(id, auth.user_id);
    let application = db
        .application(&key)
        .await?
        .ok_or_else(|| ApiError::application_not_found(&key))?;
    Ok(Json(application))
}

/// POST /api/v1/job-listings/{id}/applications - Apply to a listing
///
/// Requires an uploaded resume. Organization members who opted in are
/// notified in the background.
#[utoipa::path(
    post,
    path = "/api/v1/job-listings/{id}/applications",
    tag = "Job Listings",
    params(
        ("id" = String, Path, description = "Job listing ID (UUID)")
    ),
    request_body = ApplyRequest,
    responses(
        (status = 201, description = "Application submitted", body = JobListingApplication),
        (status = 400, description = "No resume uploaded", body = ApiError),
        (status = 401, description = "Not signed in", body = ApiError),
        (status = 404, description = "Listing not found or not published", body = ApiError),
        (status = 409, description = "Already applied", body = ApiError),
    ),
)]
pub async fn apply(
    State(db): State<CachedDb>,
    State(events): State<EventDispatcher>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<JobListingId>,
    Json(req): Json<ApplyRequest>,
) -> ApiResult<impl IntoResponse> {
    let application = db
        .apply(NewApplication {
            job_listing_id: id,
            user_id: auth.user_id,
            cover_letter: normalize_optional(req.cover_letter),
        })
        .await?;

    let key = ApplicationKey::new(application.job_listing_id, application.user_id.clone());
    if let Err(e) = events
        .dispatch(JobBoardEvent::ApplicationCreated { key: key.clone() })
        .await
    {
        // The application is committed; only the notification is lost.
        tracing::error!(application = %key, error = %e, "Failed to queue application notification");
    }

    Ok((StatusCode::CREATED, Json(application)))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_published))
        .route("/:id", get(get_published))
        .route("/:id/application", get(get_my_application))
        .route("/:id/applications", post(apply))
}
