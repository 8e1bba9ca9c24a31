//! Validation
//!
//! Reusable field checks and the job board's form rules. Validators that
//! also normalise input take the request by value and hand it back cleaned.

use jobboard_core::LocationRequirement;

use crate::error::{ApiError, ApiResult};
use crate::types::{
    JobListingRequest, NotificationSettingsRequest, OrganizationUserSettingsRequest, ResumeRequest,
};

/// Lowest and highest application rating.
pub const RATING_RANGE: (i16, i16) = (1, 5);

/// Trait for validating non-empty strings.
///
/// # Example
/// ```ignore
/// use jobboard_api::validation::ValidateNonEmpty;
///
/// fn rename(title: &str) -> ApiResult<()> {
///     title.validate_non_empty("title")?;
///     // ... rest of logic
/// }
/// ```
pub trait ValidateNonEmpty {
    /// Validate that the value is non-empty.
    ///
    /// # Arguments
    /// - `field_name`: Name of the field for error messages
    ///
    /// # Errors
    /// Returns `ApiError::missing_field` if the value is empty or whitespace-only.
    fn validate_non_empty(&self, field_name: &str) -> ApiResult<()>;
}

impl ValidateNonEmpty for str {
    fn validate_non_empty(&self, field_name: &str) -> ApiResult<()> {
        if self.trim().is_empty() {
            return Err(ApiError::missing_field(field_name));
        }
        Ok(())
    }
}

impl ValidateNonEmpty for &str {
    fn validate_non_empty(&self, field_name: &str) -> ApiResult<()> {
        (*self).validate_non_empty(field_name)
    }
}

impl ValidateNonEmpty for String {
    fn validate_non_empty(&self, field_name: &str) -> ApiResult<()> {
        self.as_str().validate_non_empty(field_name)
    }
}

impl<T: ValidateNonEmpty> ValidateNonEmpty for Option<T> {
    fn validate_non_empty(&self, field_name: &str) -> ApiResult<()> {
        match self {
            Some(value) => value.validate_non_empty(field_name),
            None => Err(ApiError::missing_field(field_name)),
        }
    }
}

/// Trait for validating numeric ranges.
///
/// # Example
/// ```ignore
/// use jobboard_api::validation::ValidateRange;
///
/// fn rate(rating: i16) -> ApiResult<()> {
///     rating.validate_range("rating", 1, 5)?;
///     // ... rest of logic
/// }
/// ```
pub trait ValidateRange {
    /// Validate that the value is positive (> 0).
    fn validate_positive(&self, field_name: &str) -> ApiResult<()>;

    /// Validate that the value is within an inclusive range.
    fn validate_range(&self, field_name: &str, min: Self, max: Self) -> ApiResult<()>
    where
        Self: Sized;
}

macro_rules! impl_validate_range {
    ($($t:ty),*) => {
        $(
            impl ValidateRange for $t {
                fn validate_positive(&self, field_name: &str) -> ApiResult<()> {
                    if *self <= 0 as $t {
                        return Err(ApiError::invalid_range(field_name, 1, <$t>::MAX as i64));
                    }
                    Ok(())
                }

                fn validate_range(&self, field_name: &str, min: Self, max: Self) -> ApiResult<()> {
                    if *self < min || *self > max {
                        return Err(ApiError::invalid_range(field_name, min as i64, max as i64));
                    }
                    Ok(())
                }
            }
        )*
    };
}

impl_validate_range!(i8, i16, i32, i64, isize);
impl_validate_range!(u8, u16, u32, u64, usize);

/// Trait for checking if an update request has any fields set.
///
/// Implement this on partial update request types to provide a unified
/// "has any updates" check.
pub trait HasUpdates {
    /// Check if any update fields are set.
    fn has_any_updates(&self) -> bool;

    /// Validate that at least one update field is set.
    fn validate_has_updates(&self) -> ApiResult<()> {
        if !self.has_any_updates() {
            return Err(ApiError::invalid_input(
                "At least one field must be provided for update",
            ));
        }
        Ok(())
    }
}

/// Trim `value`; blank strings become `None`.
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Check and normalise a job listing form.
///
/// Blank city and state become null, the state is upper-cased, and both are
/// required unless the listing is remote.
pub fn validate_job_listing(mut req: JobListingRequest) -> ApiResult<JobListingRequest> {
    req.title = req.title.trim().to_string();
    req.title.validate_non_empty("title")?;
    req.description.validate_non_empty("description")?;

    if let Some(wage) = req.wage {
        wage.validate_positive("wage")?;
    }

    req.city = normalize_optional(req.city);
    req.state_abbreviation = normalize_optional(req.state_abbreviation).map(|s| s.to_uppercase());

    if let Some(state) = &req.state_abbreviation {
        if state.len() != 2 || !state.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ApiError::invalid_format(
                "state_abbreviation",
                "two-letter state code",
            ));
        }
    }

    if req.location_requirement != LocationRequirement::Remote {
        if req.city.is_none() {
            return Err(ApiError::missing_field("city"));
        }
        if req.state_abbreviation.is_none() {
            return Err(ApiError::missing_field("state_abbreviation"));
        }
    }

    Ok(req)
}

pub fn validate_rating(rating: Option<i16>, field_name: &str) -> ApiResult<()> {
    match rating {
        Some(r) => r.validate_range(field_name, RATING_RANGE.0, RATING_RANGE.1),
        None => Ok(()),
    }
}

pub fn validate_resume(req: ResumeRequest) -> ApiResult<ResumeRequest> {
    req.resume_file_url.validate_non_empty("resume_file_url")?;
    req.resume_file_key.validate_non_empty("resume_file_key")?;
    Ok(req)
}

pub fn validate_notification_settings(
    mut req: NotificationSettingsRequest,
) -> ApiResult<NotificationSettingsRequest> {
    req.ai_prompt = normalize_optional(req.ai_prompt);
    Ok(req)
}

pub fn validate_organization_user_settings(
    req: OrganizationUserSettingsRequest,
) -> ApiResult<OrganizationUserSettingsRequest> {
    validate_rating(req.minimum_rating, "minimum_rating")?;
    Ok(req)
}
