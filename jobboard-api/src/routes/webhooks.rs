//! Identity-Provider Webhook Receiver
//!
//! Users and organizations are owned by the identity provider and mirrored
//! here. Deliveries are signed with the Svix scheme:
//!
//! - `svix-id`: unique message id
//! - `svix-timestamp`: unix seconds
//! - `svix-signature`: space-separated `v1,<base64>` entries, each an
//!   HMAC-SHA256 over `"{id}.{timestamp}.{body}"`
//!
//! The signing secret is configured as `whsec_<base64 key>`. Verified
//! events are queued for the background dispatcher; the response does not
//! wait for the sync.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use jobboard_core::{OrganizationId, UserId};
use jobboard_storage::{OrganizationUpsert, UserUpsert};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{
    config::ApiConfig,
    constants::WEBHOOK_SECRET_PREFIX,
    error::{ApiError, ApiResult},
    events::{EventDispatcher, JobBoardEvent},
    state::AppState,
    telemetry::with_metrics,
};

type HmacSha256 = Hmac<Sha256>;

const ID_HEADER: &str = "svix-id";
const TIMESTAMP_HEADER: &str = "svix-timestamp";
const SIGNATURE_HEADER: &str = "svix-signature";

// ============================================================================
// TYPES
// ============================================================================

/// Acknowledgement returned to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct WebhookAck {
    pub event_type: String,
    /// `queued` or `ignored`
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct ProviderEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: String,
    first_name: Option<String>,
    last_name: Option<String>,
    image_url: Option<String>,
    #[serde(default)]
    email_addresses: Vec<ProviderEmail>,
    primary_email_address_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderEmail {
    id: String,
    email_address: String,
}

#[derive(Debug, Deserialize)]
struct ProviderOrganization {
    id: String,
    name: String,
    image_url: Option<String>,
    #[serde(default)]
    has_image: bool,
}

#[derive(Debug, Deserialize)]
struct ProviderDeleted {
    id: Option<String>,
}

// ============================================================================
// SIGNATURE VERIFICATION
// ============================================================================

/// Decode a `whsec_` secret into the raw HMAC key.
pub fn decode_secret(secret: &str) -> ApiResult<Vec<u8>> {
    let encoded = secret.strip_prefix(WEBHOOK_SECRET_PREFIX).unwrap_or(secret);
    STANDARD.decode(encoded).map_err(|_| {
        tracing::error!("Webhook secret is not valid base64");
        ApiError::internal_error("Webhook secret is misconfigured")
    })
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> ApiResult<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::invalid_signature(format!("Missing {} header", name)))
}

/// Verify a delivery against the signing key.
///
/// `now` is unix seconds; deliveries further than `tolerance_secs` from it
/// in either direction are rejected.
pub fn verify_signature(
    headers: &HeaderMap,
    body: &[u8],
    key: &[u8],
    tolerance_secs: i64,
    now: i64,
) -> ApiResult<()> {
    let msg_id = header(headers, ID_HEADER)?;
    let timestamp_raw = header(headers, TIMESTAMP_HEADER)?;
    let signatures = header(headers, SIGNATURE_HEADER)?;

    let timestamp: i64 = timestamp_raw
        .trim()
        .parse()
        .map_err(|_| ApiError::invalid_signature("Malformed webhook timestamp"))?;
    if (now - timestamp).abs() > tolerance_secs {
        return Err(ApiError::invalid_signature("Stale webhook timestamp"));
    }

    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|_| ApiError::internal_error("Failed to initialize HMAC"))?;
    mac.update(msg_id.as_bytes());
    mac.update(b".");
    mac.update(timestamp_raw.as_bytes());
    mac.update(b".");
    mac.update(body);

    let matched = signatures
        .split_whitespace()
        .filter_map(|entry| entry.strip_prefix("v1,"))
        .filter_map(|encoded| STANDARD.decode(encoded).ok())
        .any(|candidate| mac.clone().verify_slice(&candidate).is_ok());

    if matched {
        Ok(())
    } else {
        Err(ApiError::invalid_signature("Webhook signature does not match"))
    }
}

// ============================================================================
// PAYLOAD MAPPING
// ============================================================================

fn parse_data<T: serde::de::DeserializeOwned>(data: serde_json::Value) -> ApiResult<T> {
    serde_json::from_value(data)
        .map_err(|e| ApiError::invalid_input(format!("Invalid webhook payload: {}", e)))
}

fn user_upsert(user: ProviderUser) -> ApiResult<UserUpsert> {
    let primary = user.primary_email_address_id.as_deref();
    let email = user
        .email_addresses
        .iter()
        .find(|e| Some(e.id.as_str()) == primary)
        .map(|e| e.email_address.clone())
        .ok_or_else(|| ApiError::missing_field("primary_email_address_id"))?;

    let name = [user.first_name, user.last_name]
        .into_iter()
        .flatten()
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if name.is_empty() {
        return Err(ApiError::missing_field("first_name"));
    }

    Ok(UserUpsert {
        id: UserId::new(user.id),
        name,
        image_url: user.image_url.unwrap_or_default(),
        email,
    })
}

fn organization_upsert(org: ProviderOrganization) -> OrganizationUpsert {
    OrganizationUpsert {
        id: OrganizationId::new(org.id),
        name: org.name,
        image_url: if org.has_image { org.image_url } else { None },
    }
}

fn deleted_id(data: serde_json::Value) -> ApiResult<String> {
    parse_data::<ProviderDeleted>(data)?
        .id
        .ok_or_else(|| ApiError::missing_field("id"))
}

/// Map a provider payload to an event. `Ok(None)` means the event type is
/// not one we mirror.
pub fn parse_event(body: &[u8]) -> ApiResult<(String, Option<JobBoardEvent>)> {
    let event: ProviderEvent = serde_json::from_slice(body)?;
    let mapped = match event.event_type.as_str() {
        "user.created" => Some(JobBoardEvent::UserCreated(user_upsert(parse_data(event.data)?)?)),
        "user.updated" => Some(JobBoardEvent::UserUpdated(user_upsert(parse_data(event.data)?)?)),
        "user.deleted" => Some(JobBoardEvent::UserDeleted {
            user_id: UserId::new(deleted_id(event.data)?),
        }),
        "organization.created" => Some(JobBoardEvent::OrganizationCreated(organization_upsert(
            parse_data(event.data)?,
        ))),
        "organization.updated" => Some(JobBoardEvent::OrganizationUpdated(organization_upsert(
            parse_data(event.data)?,
        ))),
        "organization.deleted" => Some(JobBoardEvent::OrganizationDeleted {
            organization_id: OrganizationId::new(deleted_id(event.data)?),
        }),
        _ => None,
    };
    Ok((event.event_type, mapped))
}

// ============================================================================
// HANDLER
// ============================================================================

/// POST /api/webhooks/identity - Identity-provider deliveries
#[utoipa::path(
    post,
    path = "/api/webhooks/identity",
    tag = "Webhooks",
    request_body(content = String, description = "Signed provider event", content_type = "application/json"),
    responses(
        (status = 202, description = "Event queued", body = WebhookAck),
        (status = 200, description = "Event type not mirrored", body = WebhookAck),
        (status = 400, description = "Malformed payload", body = ApiError),
        (status = 401, description = "Signature missing, stale or invalid", body = ApiError),
        (status = 503, description = "Webhook secret not configured", body = ApiError),
    ),
)]
pub async fn receive_identity_webhook(
    State(config): State<Arc<ApiConfig>>,
    State(events): State<EventDispatcher>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<WebhookAck>)> {
    let result = handle_delivery(&config, &events, &headers, &body).await;
    with_metrics(|m| m.record_webhook(result.is_ok()));
    result
}

async fn handle_delivery(
    config: &ApiConfig,
    events: &EventDispatcher,
    headers: &HeaderMap,
    body: &[u8],
) -> ApiResult<(StatusCode, Json<WebhookAck>)> {
    let secret = config.webhook_secret.as_deref().ok_or_else(|| {
        tracing::warn!("Webhook received but JOBBOARD_WEBHOOK_SECRET is unset");
        ApiError::service_unavailable("Webhook receiver is not configured")
    })?;
    let key = decode_secret(secret)?;

    if let Err(e) = verify_signature(
        headers,
        body,
        &key,
        config.webhook_tolerance_secs,
        chrono::Utc::now().timestamp(),
    ) {
        tracing::warn!(error = %e, "Rejected webhook delivery");
        return Err(e);
    }

    let (event_type, event) = parse_event(body)?;
    let msg_id = headers
        .get(ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    match event {
        Some(event) => {
            events.dispatch(event).await?;
            tracing::info!(webhook_id = msg_id, event_type = %event_type, "Webhook queued");
            Ok((
                StatusCode::ACCEPTED,
                Json(WebhookAck {
                    event_type,
                    status: "queued".to_string(),
                }),
            ))
        }
        None => {
            tracing::debug!(webhook_id = msg_id, event_type = %event_type, "Webhook ignored");
            Ok((
                StatusCode::OK,
                Json(WebhookAck {
                    event_type,
                    status: "ignored".to_string(),
                }),
            ))
        }
    }
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new().route("/identity", post(receive_identity_webhook))
}
