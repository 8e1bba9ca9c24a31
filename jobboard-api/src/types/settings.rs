//! Resume and notification settings API types

use serde::{Deserialize, Serialize};

/// Metadata of a resume already stored by the upload provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ResumeRequest {
    pub resume_file_url: String,
    pub resume_file_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NotificationSettingsRequest {
    pub new_job_email_notifications: bool,
    /// Free-text description of the jobs the user wants to hear about
    pub ai_prompt: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OrganizationUserSettingsRequest {
    pub new_application_email_notifications: bool,
    /// Only notify about applications rated at least this high (1 to 5)
    pub minimum_rating: Option<i16>,
}
