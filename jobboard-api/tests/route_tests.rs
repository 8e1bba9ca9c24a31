//! HTTP-level tests driving the full router with `oneshot`.

mod support;

use std::time::Duration;

use axum::{body::Body, http::StatusCode};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use jobboard_api::ApiConfig;
use jobboard_core::{ApplicationKey, JobListingStatus, UserId};
use serde_json::json;
use sha2::Sha256;
use support::{json_body, read_json, request, test_app};
use tower::ServiceExt;

const USER: &str = "x-user-id";
const ORG: &str = "x-org-id";

fn listing_form(title: &str) -> serde_json::Value {
    json!({
        "title": title,
        "description": "Own the services behind the board",
        "wage": 150000,
        "wage_interval": "yearly",
        "state_abbreviation": "ca",
        "city": "Oakland",
        "location_requirement": "hybrid",
        "experience_level": "senior",
        "type": "full-time"
    })
}

// ============================================================================
// IDENTITY
// ============================================================================

#[tokio::test]
async fn test_missing_user_header_is_unauthorized() {
    let app = test_app(ApiConfig::default());
    let response = app
        .router
        .oneshot(request("GET", "/api/v1/me/applications").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_employer_route_without_org_is_forbidden() {
    let app = test_app(ApiConfig::default());
    let response = app
        .router
        .oneshot(
            request("GET", "/api/v1/employer/job-listings")
                .header(USER, "user_ada")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_public_board_needs_no_identity() {
    let app = test_app(ApiConfig::default());
    let org = app.harness.org("org_acme").await;
    app.harness.published(&org, "Engineer").await;
    app.harness.draft(&org, "Hidden Draft").await;

    let response = app
        .router
        .oneshot(request("GET", "/api/v1/job-listings").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["job_listings"][0]["title"], "Engineer");
    assert_eq!(body["job_listings"][0]["organization"]["name"], "Org org_acme");
}

// ============================================================================
// EMPLOYER FLOW
// ============================================================================

#[tokio::test]
async fn test_employer_creates_and_publishes_listing() {
    let app = test_app(ApiConfig::default());
    app.harness.org("org_acme").await;
    app.harness.user("user_owner").await;

    let response = app
        .router
        .clone()
        .oneshot(
            request("POST", "/api/v1/employer/job-listings")
                .header(USER, "user_owner")
                .header(ORG, "org_acme")
                .header("content-type", "application/json")
                .body(json_body(listing_form("  Staff Engineer ")))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json(response).await;
    assert_eq!(created["title"], "Staff Engineer");
    assert_eq!(created["state_abbreviation"], "CA");
    assert_eq!(created["status"], "draft");
    let id = created["id"].as_str().expect("id is a string").to_string();

    let response = app
        .router
        .clone()
        .oneshot(
            request("PUT", &format!("/api/v1/employer/job-listings/{}/status", id))
                .header(USER, "user_owner")
                .header(ORG, "org_acme")
                .header("content-type", "application/json")
                .body(json_body(json!({ "status": "published" })))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .oneshot(
            request("GET", &format!("/api/v1/job-listings/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let published = read_json(response).await;
    assert_eq!(published["job_listing"]["status"], "published");
}

#[tokio::test]
async fn test_in_office_listing_requires_city() {
    let app = test_app(ApiConfig::default());
    app.harness.org("org_acme").await;

    let mut form = listing_form("Engineer");
    form["location_requirement"] = json!("in-office");
    form["city"] = json!("   ");

    let response = app
        .router
        .oneshot(
            request("POST", "/api/v1/employer/job-listings")
                .header(USER, "user_owner")
                .header(ORG, "org_acme")
                .header("content-type", "application/json")
                .body(json_body(form))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_other_organization_cannot_see_listing() {
    let app = test_app(ApiConfig::default());
    let acme = app.harness.org("org_acme").await;
    app.harness.org("org_globex").await;
    let listing = app.harness.draft(&acme, "Engineer").await;

    let response = app
        .router
        .oneshot(
            request("GET", &format!("/api/v1/employer/job-listings/{}", listing.id))
                .header(USER, "user_spy")
                .header(ORG, "org_globex")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rating_out_of_range_is_rejected() {
    let app = test_app(ApiConfig::default());
    let org = app.harness.org("org_acme").await;
    let listing = app.harness.published(&org, "Engineer").await;
    let applicant = app.harness.applicant("user_ada").await;
    app.harness
        .db
        .apply(jobboard_test_utils::fixtures::application(listing.id, &applicant))
        .await
        .expect("apply");

    let response = app
        .router
        .oneshot(
            request(
                "PUT",
                &format!(
                    "/api/v1/employer/job-listings/{}/applications/{}",
                    listing.id,
                    applicant.as_str()
                ),
            )
            .header(USER, "user_owner")
            .header(ORG, "org_acme")
            .header("content-type", "application/json")
            .body(json_body(json!({ "rating": 9 })))
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// APPLY FLOW
// ============================================================================

#[tokio::test]
async fn test_apply_flow() {
    let app = test_app(ApiConfig::default());
    let org = app.harness.org("org_acme").await;
    let listing = app.harness.published(&org, "Engineer").await;
    app.harness.user("user_ada").await;
    let apply_uri = format!("/api/v1/job-listings/{}/applications", listing.id);

    // No resume yet.
    let response = app
        .router
        .clone()
        .oneshot(
            request("POST", &apply_uri)
                .header(USER, "user_ada")
                .header("content-type", "application/json")
                .body(json_body(json!({ "cover_letter": "Hi" })))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .router
        .clone()
        .oneshot(
            request("PUT", "/api/v1/me/resume")
                .header(USER, "user_ada")
                .header("content-type", "application/json")
                .body(json_body(json!({
                    "resume_file_url": "https://files.example/ada.pdf",
                    "resume_file_key": "ada.pdf"
                })))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(
            request("POST", &apply_uri)
                .header(USER, "user_ada")
                .header("content-type", "application/json")
                .body(json_body(json!({ "cover_letter": "  Hi  " })))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json(response).await;
    assert_eq!(created["cover_letter"], "Hi");
    assert_eq!(created["stage"], "applied");

    let response = app
        .router
        .clone()
        .oneshot(
            request("POST", &apply_uri)
                .header(USER, "user_ada")
                .header("content-type", "application/json")
                .body(json_body(json!({})))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .router
        .clone()
        .oneshot(
            request("GET", &format!("/api/v1/job-listings/{}/application", listing.id))
                .header(USER, "user_ada")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .oneshot(
            request(
                "GET",
                &format!("/api/v1/employer/job-listings/{}/applications", listing.id),
            )
            .header(USER, "user_owner")
            .header(ORG, "org_acme")
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["applications"][0]["applicant"]["email"], "user_ada@example.com");
}

#[tokio::test]
async fn test_apply_to_draft_is_not_found() {
    let app = test_app(ApiConfig::default());
    let org = app.harness.org("org_acme").await;
    let listing = app.harness.draft(&org, "Engineer").await;
    app.harness.applicant("user_ada").await;

    let response = app
        .router
        .oneshot(
            request("POST", &format!("/api/v1/job-listings/{}/applications", listing.id))
                .header(USER, "user_ada")
                .header("content-type", "application/json")
                .body(json_body(json!({})))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_move_application_updates_both_menus() {
    let app = test_app(ApiConfig::default());
    let org = app.harness.org("org_acme").await;
    let from = app.harness.published(&org, "Backend").await;
    let to = app.harness.published(&org, "Platform").await;
    let applicant = app.harness.applicant("user_ada").await;
    app.harness
        .db
        .apply(jobboard_test_utils::fixtures::application(from.id, &applicant))
        .await
        .expect("apply");
    app.harness.db.listing_menu(&org).await.expect("warm");

    let response = app
        .router
        .clone()
        .oneshot(
            request(
                "POST",
                &format!(
                    "/api/v1/employer/job-listings/{}/applications/{}/move",
                    from.id,
                    applicant.as_str()
                ),
            )
            .header(USER, "user_owner")
            .header(ORG, "org_acme")
            .header("content-type", "application/json")
            .body(json_body(json!({ "job_listing_id": to.id.to_string() })))
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let menu = app.harness.db.listing_menu(&org).await.expect("menu");
    let count = |id| {
        menu.iter()
            .find(|item| item.id == id)
            .map(|item| item.application_count)
    };
    assert_eq!(count(from.id), Some(0));
    assert_eq!(count(to.id), Some(1));
    assert!(app
        .harness
        .db
        .application(&ApplicationKey::new(to.id, applicant))
        .await
        .expect("read")
        .is_some());
}

// ============================================================================
// WEBHOOKS
// ============================================================================

const SECRET_KEY: &[u8] = b"job-board-test-signing-key";

fn webhook_config() -> ApiConfig {
    ApiConfig {
        webhook_secret: Some(format!("whsec_{}", STANDARD.encode(SECRET_KEY))),
        ..ApiConfig::default()
    }
}

fn signed_delivery(payload: &serde_json::Value, timestamp: i64) -> axum::http::Request<Body> {
    let body = payload.to_string();
    let msg_id = "msg_2c3f";
    let mut mac = Hmac::<Sha256>::new_from_slice(SECRET_KEY).expect("any key length works");
    mac.update(format!("{}.{}.{}", msg_id, timestamp, body).as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    request("POST", "/api/webhooks/identity")
        .header("content-type", "application/json")
        .header("svix-id", msg_id)
        .header("svix-timestamp", timestamp.to_string())
        .header("svix-signature", format!("v1,bm90LXRoaXMtb25l v1,{}", signature))
        .body(Body::from(body))
        .unwrap()
}

fn user_created(id: &str) -> serde_json::Value {
    json!({
        "type": "user.created",
        "data": {
            "id": id,
            "first_name": "Ada",
            "last_name": "Lovelace",
            "image_url": "https://img.example/ada.png",
            "primary_email_address_id": "idn_1",
            "email_addresses": [
                { "id": "idn_0", "email_address": "old@example.com" },
                { "id": "idn_1", "email_address": "ada@example.com" }
            ]
        }
    })
}

#[tokio::test]
async fn test_signed_user_webhook_syncs_user() {
    let app = test_app(webhook_config());
    let now = chrono::Utc::now().timestamp();

    let response = app
        .router
        .oneshot(signed_delivery(&user_created("user_ada"), now))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let ack = read_json(response).await;
    assert_eq!(ack["status"], "queued");

    let id = UserId::new("user_ada");
    let mut synced = None;
    for _ in 0..50 {
        synced = app.harness.db.user(&id).await.expect("read");
        if synced.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let user = synced.expect("dispatcher should sync the user");
    assert_eq!(user.name, "Ada Lovelace");
    assert_eq!(user.email, "ada@example.com");
}

#[tokio::test]
async fn test_tampered_webhook_is_rejected() {
    let app = test_app(webhook_config());
    let now = chrono::Utc::now().timestamp();
    let mut delivery = signed_delivery(&user_created("user_ada"), now);
    *delivery.body_mut() = Body::from(user_created("user_mallory").to_string());

    let response = app.router.oneshot(delivery).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app
        .harness
        .db
        .user(&UserId::new("user_mallory"))
        .await
        .expect("read")
        .is_none());
}

#[tokio::test]
async fn test_stale_webhook_is_rejected() {
    let app = test_app(webhook_config());
    let stale = chrono::Utc::now().timestamp() - 3_600;
    let response = app
        .router
        .oneshot(signed_delivery(&user_created("user_ada"), stale))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unmirrored_event_is_ignored() {
    let app = test_app(webhook_config());
    let now = chrono::Utc::now().timestamp();
    let payload = json!({ "type": "session.created", "data": { "id": "sess_1" } });
    let response = app
        .router
        .oneshot(signed_delivery(&payload, now))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["status"], "ignored");
}

#[tokio::test]
async fn test_webhook_without_secret_is_unavailable() {
    let app = test_app(ApiConfig::default());
    let now = chrono::Utc::now().timestamp();
    let response = app
        .router
        .oneshot(signed_delivery(&user_created("user_ada"), now))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// ============================================================================
// HEALTH
// ============================================================================

#[tokio::test]
async fn test_readiness_reports_healthy() {
    let app = test_app(ApiConfig::default());
    let response = app
        .router
        .oneshot(request("GET", "/health/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_delisted_listing_is_hidden_from_job_seekers() {
    let app = test_app(ApiConfig::default());
    let org = app.harness.org("org_acme").await;
    let listing = app.harness.published(&org, "Engineer").await;
    app.harness
        .db
        .set_job_listing_status(&org, listing.id, JobListingStatus::Delisted)
        .await
        .expect("delist");

    let response = app
        .router
        .oneshot(
            request("GET", &format!("/api/v1/job-listings/{}", listing.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
