//! REST API Routes Module
//!
//! Route handlers grouped by audience:
//! - Job seeker routes (public board, apply)
//! - Signed-in user routes (`/me`: resume, settings, applications)
//! - Employer routes scoped to the active organization
//! - Identity-provider webhook receiver
//! - Health check endpoints (Kubernetes-compatible)
//! - CORS support for the browser front end

pub mod employer;
pub mod health;
pub mod job_listings;
pub mod me;
pub mod webhooks;

use std::time::Duration;

use axum::{
    http::{header, header::HeaderName, HeaderValue, Method},
    middleware::from_fn,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;

use crate::config::ApiConfig;
use crate::constants::{ORG_ID_HEADER, USER_ID_HEADER};
use crate::openapi::ApiDoc;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

// Re-export route creation functions for convenience
pub use employer::create_router as employer_router;
pub use health::create_router as health_router;
pub use job_listings::create_router as job_listings_router;
pub use me::create_router as me_router;
pub use webhooks::create_router as webhooks_router;

// ============================================================================
// OPENAPI ENDPOINTS
// ============================================================================

/// Handler for /openapi.json endpoint.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// In development mode (empty origins), allows all origins.
/// In production mode, only allows configured origins.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static(ORG_ID_HEADER),
        ])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        // Development mode: allow all origins
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any).allow_headers(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        if config.cors_allow_credentials {
            cors.allow_origin(origins).allow_credentials(true)
        } else {
            cors.allow_origin(origins)
        }
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Build the `/api/v1` routes.
fn build_api_routes() -> Router<AppState> {
    Router::new()
        .nest("/job-listings", job_listings::create_router())
        .nest("/me", me::create_router())
        .nest("/employer", employer::create_router())
}

/// Create the complete API router.
///
/// - Job seeker, user and employer routes under /api/v1/*
/// - Identity-provider webhooks under /api/webhooks/*
/// - Health checks at /health/*
/// - Metrics at /metrics
/// - OpenAPI spec at /openapi.json
/// - Swagger UI at /swagger-ui (when swagger-ui feature is enabled)
///
/// # Middleware Order (outer to inner)
/// 1. CORS - handles preflight requests
/// 2. Observability - tracing and metrics
pub fn create_api_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config);

    #[allow(unused_mut)]
    let mut router = Router::new()
        .nest("/api/v1", build_api_routes())
        .nest("/api/webhooks", webhooks::create_router())
        .nest("/health", health::create_router())
        .route("/metrics", get(metrics_handler))
        .route("/openapi.json", get(openapi_json));

    #[cfg(feature = "swagger-ui")]
    {
        use utoipa_swagger_ui::SwaggerUi;
        router = router.merge(SwaggerUi::new("/swagger-ui").url("/openapi.json", ApiDoc::openapi()));
    }

    router
        .with_state(state)
        .layer(from_fn(observability_middleware))
        .layer(cors)
}
