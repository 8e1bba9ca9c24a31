//! Signed-in User Routes
//!
//! Resume, notification settings and the user's own applications.

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use jobboard_core::{UserNotificationSettings, UserResume};
use jobboard_storage::{NotificationSettingsUpsert, ResumeUpsert};

use crate::{
    cached_db::CachedDb,
    error::{ApiError, ApiResult},
    events::{EventDispatcher, JobBoardEvent},
    middleware::AuthExtractor,
    state::AppState,
    types::{MyApplicationsResponse, NotificationSettingsRequest, ResumeRequest},
    validation::{validate_notification_settings, validate_resume},
};

// ============================================================================
// RESUME
// ============================================================================

/// GET /api/v1/me/resume - The caller's resume
#[utoipa::path(
    get,
    path = "/api/v1/me/resume",
    tag = "Me",
    responses(
        (status = 200, description = "Current resume", body = UserResume),
        (status = 401, description = "Not signed in", body = ApiError),
        (status = 404, description = "No resume uploaded", body = ApiError),
    ),
)]
pub async fn get_resume(
    State(db): State<CachedDb>,
    AuthExtractor(auth): AuthExtractor,
) -> ApiResult<Json<UserResume>> {
    let resume = db
        .user_resume(&auth.user_id)
        .await?
        .ok_or_else(|| ApiError::entity_not_found("user_resumes", &auth.user_id))?;
    Ok(Json(resume))
}

/// PUT /api/v1/me/resume - Record a newly uploaded resume file
///
/// The file itself lives in external storage; a summary is generated in the
/// background and written back later.
#[utoipa::path(
    put,
    path = "/api/v1/me/resume",
    tag = "Me",
    request_body = ResumeRequest,
    responses(
        (status = 200, description = "Resume saved", body = UserResume),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 401, description = "Not signed in", body = ApiError),
        (status = 404, description = "User not synced yet", body = ApiError),
    ),
)]
pub async fn put_resume(
    State(db): State<CachedDb>,
    State(events): State<EventDispatcher>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<ResumeRequest>,
) -> ApiResult<Json<UserResume>> {
    let req = validate_resume(req)?;
    let resume = db
        .upsert_resume(ResumeUpsert {
            user_id: auth.user_id.clone(),
            resume_file_url: req.resume_file_url,
            resume_file_key: req.resume_file_key,
        })
        .await?;

    if let Err(e) = events
        .dispatch(JobBoardEvent::ResumeUploaded {
            user_id: auth.user_id,
        })
        .await
    {
        tracing::error!(user_id = %resume.user_id, error = %e, "Failed to queue resume summary");
    }

    Ok(Json(resume))
}

// ============================================================================
// NOTIFICATION SETTINGS
// ============================================================================

/// GET /api/v1/me/notification-settings
#[utoipa::path(
    get,
    path = "/api/v1/me/notification-settings",
    tag = "Me",
    responses(
        (status = 200, description = "Notification settings", body = UserNotificationSettings),
        (status = 401, description = "Not signed in", body = ApiError),
        (status = 404, description = "User not synced yet", body = ApiError),
    ),
)]
pub async fn get_notification_settings(
    State(db): State<CachedDb>,
    AuthExtractor(auth): AuthExtractor,
) -> ApiResult<Json<UserNotificationSettings>> {
    let settings = db
        .notification_settings(&auth.user_id)
        .await?
        .ok_or_else(|| {
            ApiError::entity_not_found("user_notification_settings", &auth.user_id)
        })?;
    Ok(Json(settings))
}

/// PUT /api/v1/me/notification-settings
#[utoipa::path(
    put,
    path = "/api/v1/me/notification-settings",
    tag = "Me",
    request_body = NotificationSettingsRequest,
    responses(
        (status = 200, description = "Settings saved", body = UserNotificationSettings),
        (status = 401, description = "Not signed in", body = ApiError),
        (status = 404, description = "User not synced yet", body = ApiError),
    ),
)]
pub async fn put_notification_settings(
    State(db): State<CachedDb>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<NotificationSettingsRequest>,
) -> ApiResult<Json<UserNotificationSettings>> {
    let req = validate_notification_settings(req)?;
    let settings = db
        .upsert_notification_settings(NotificationSettingsUpsert {
            user_id: auth.user_id,
            new_job_email_notifications: req.new_job_email_notifications,
            ai_prompt: req.ai_prompt,
        })
        .await?;
    Ok(Json(settings))
}

// ============================================================================
// APPLICATIONS
// ============================================================================

/// GET /api/v1/me/applications - The caller's applications, newest first
#[utoipa::path(
    get,
    path = "/api/v1/me/applications",
    tag = "Me",
    responses(
        (status = 200, description = "Applications", body = MyApplicationsResponse),
        (status = 401, description = "Not signed in", body = ApiError),
    ),
)]
pub async fn list_my_applications(
    State(db): State<CachedDb>,
    AuthExtractor(auth): AuthExtractor,
) -> ApiResult<Json<MyApplicationsResponse>> {
    let applications = db.applications_for_user(&auth.user_id).await?;
    Ok(Json(MyApplicationsResponse { applications }))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/resume", get(get_resume).put(put_resume))
        .route(
            "/notification-settings",
            get(get_notification_settings).put(put_notification_settings),
        )
        .route("/applications", get(list_my_applications))
}
