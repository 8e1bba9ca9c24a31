//! Axum Extractors for Caller Identity
//!
//! Sessions are handled by the identity provider at the edge, which
//! forwards the signed-in user and active organization as headers:
//! - `x-user-id`: required for every job seeker and employer route
//!   (missing → 401)
//! - `x-org-id`: required for employer routes (missing → 403)

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
    Json,
};
use jobboard_core::{OrganizationId, UserId};

use crate::constants::{ORG_ID_HEADER, USER_ID_HEADER};
use crate::error::ApiError;

// ============================================================================
// CONTEXT TYPES
// ============================================================================

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: UserId,
}

/// The signed-in user acting for their active organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgContext {
    pub user_id: UserId,
    pub organization_id: OrganizationId,
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Rejection returned by the identity extractors.
#[derive(Debug)]
pub struct AuthMiddlewareError(pub ApiError);

impl IntoResponse for AuthMiddlewareError {
    fn into_response(self) -> Response {
        let api_error = self.0;
        (api_error.status_code(), Json(api_error)).into_response()
    }
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

// ============================================================================
// TYPED EXTRACTORS
// ============================================================================

/// Typed Axum extractor for the signed-in user.
///
/// # Example
///
/// ```rust,no_run
/// use jobboard_api::middleware::AuthExtractor;
///
/// async fn whoami(AuthExtractor(auth): AuthExtractor) -> String {
///     auth.user_id.to_string()
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthExtractor(pub AuthContext);

#[async_trait]
impl<S> FromRequestParts<S> for AuthExtractor
where
    S: Send + Sync,
{
    type Rejection = AuthMiddlewareError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header_value(parts, USER_ID_HEADER).ok_or_else(|| {
            AuthMiddlewareError(ApiError::unauthorized("Sign in to continue"))
        })?;
        Ok(AuthExtractor(AuthContext {
            user_id: UserId::new(user_id),
        }))
    }
}

impl std::ops::Deref for AuthExtractor {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Typed Axum extractor for employer routes.
///
/// Rejects with 401 when no user is signed in and with 403 when the user
/// has no active organization.
#[derive(Debug, Clone)]
pub struct OrgExtractor(pub OrgContext);

#[async_trait]
impl<S> FromRequestParts<S> for OrgExtractor
where
    S: Send + Sync,
{
    type Rejection = AuthMiddlewareError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthExtractor(auth) = AuthExtractor::from_request_parts(parts, state).await?;
        let organization_id = header_value(parts, ORG_ID_HEADER).ok_or_else(|| {
            AuthMiddlewareError(ApiError::forbidden("Select an organization to continue"))
        })?;
        Ok(OrgExtractor(OrgContext {
            user_id: auth.user_id,
            organization_id: OrganizationId::new(organization_id),
        }))
    }
}

impl std::ops::Deref for OrgExtractor {
    type Target = OrgContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    async fn whoami(AuthExtractor(auth): AuthExtractor) -> String {
        auth.user_id.to_string()
    }

    async fn org(OrgExtractor(ctx): OrgExtractor) -> String {
        format!("{}@{}", ctx.user_id, ctx.organization_id)
    }

    fn app() -> Router {
        Router::new()
            .route("/me", get(whoami))
            .route("/org", get(org))
    }

    async fn call(uri: &str, headers: &[(&str, &str)]) -> (StatusCode, String) {
        let mut builder = Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::empty()).expect("request should build");
        let response = app().oneshot(request).await.expect("router is infallible");
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should read");
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn test_user_header_is_extracted() {
        let (status, body) = call("/me", &[(USER_ID_HEADER, "user_123")]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "user_123");
    }

    #[tokio::test]
    async fn test_missing_user_is_unauthorized() {
        let (status, body) = call("/me", &[]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("UNAUTHORIZED"));

        let (status, _) = call("/me", &[(USER_ID_HEADER, "   ")]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_org_routes_need_both_headers() {
        let (status, _) = call("/org", &[(ORG_ID_HEADER, "org_1")]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call("/org", &[(USER_ID_HEADER, "user_1")]).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) =
            call("/org", &[(USER_ID_HEADER, "user_1"), (ORG_ID_HEADER, "org_1")]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "user_1@org_1");
    }
}
