//! Enum types for job board entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// ENTITY DISCRIMINATORS
// ============================================================================

/// Entity type discriminator. The canonical name is what appears in cache
/// tags and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub enum EntityType {
    Users,
    Organizations,
    JobListings,
    JobListingApplications,
    UserResumes,
    UserNotificationSettings,
    OrganizationUserSettings,
}

impl EntityType {
    pub const ALL: [EntityType; 7] = [
        EntityType::Users,
        EntityType::Organizations,
        EntityType::JobListings,
        EntityType::JobListingApplications,
        EntityType::UserResumes,
        EntityType::UserNotificationSettings,
        EntityType::OrganizationUserSettings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Users => "users",
            EntityType::Organizations => "organizations",
            EntityType::JobListings => "jobListings",
            EntityType::JobListingApplications => "jobListingApplications",
            EntityType::UserResumes => "userResumes",
            EntityType::UserNotificationSettings => "userNotificationSettings",
            EntityType::OrganizationUserSettings => "organizationUserSettings",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The entity on the other side of a foreign key, named in the singular.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelatedEntity {
    User,
    Organization,
    JobListing,
}

impl RelatedEntity {
    pub const ALL: [RelatedEntity; 3] = [
        RelatedEntity::User,
        RelatedEntity::Organization,
        RelatedEntity::JobListing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelatedEntity::User => "user",
            RelatedEntity::Organization => "organization",
            RelatedEntity::JobListing => "jobListing",
        }
    }
}

impl fmt::Display for RelatedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// DOMAIN ENUMS
// ============================================================================

/// Error when parsing an enum from its database representation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid {kind}: {value}")]
pub struct EnumParseError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! db_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident => $db:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $db)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Convert to database string representation.
            pub fn as_db_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $db),+
                }
            }

            /// Parse from database string representation.
            pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
                match s {
                    $($db => Ok($name::$variant),)+
                    _ => Err(EnumParseError {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_db_str())
            }
        }

        impl FromStr for $name {
            type Err = EnumParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_db_str(s)
            }
        }
    };
}

db_enum!(
    /// Unit a wage is quoted in.
    WageInterval, "wage interval" {
        Hourly => "hourly",
        Yearly => "yearly",
    }
);

db_enum!(
    /// Where the work happens.
    LocationRequirement, "location requirement" {
        InOffice => "in-office",
        Hybrid => "hybrid",
        Remote => "remote",
    }
);

db_enum!(
    ExperienceLevel, "experience level" {
        Junior => "junior",
        MidLevel => "mid-level",
        Senior => "senior",
    }
);

db_enum!(
    /// Publication status of a job listing. Only published listings are
    /// visible to job seekers.
    JobListingStatus, "job listing status" {
        Draft => "draft",
        Published => "published",
        Delisted => "delisted",
    }
);

db_enum!(
    JobListingType, "job listing type" {
        Internship => "internship",
        PartTime => "part-time",
        FullTime => "full-time",
    }
);

db_enum!(
    /// Hiring pipeline stage of an application.
    ApplicationStage, "application stage" {
        Denied => "denied",
        Applied => "applied",
        Interested => "interested",
        Interviewed => "interviewed",
        Hired => "hired",
    }
);

impl Default for ApplicationStage {
    fn default() -> Self {
        ApplicationStage::Applied
    }
}

impl JobListingStatus {
    pub fn is_public(&self) -> bool {
        matches!(self, JobListingStatus::Published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_strings_roundtrip() {
        for status in JobListingStatus::ALL {
            assert_eq!(JobListingStatus::from_db_str(status.as_db_str()), Ok(*status));
        }
        for stage in ApplicationStage::ALL {
            assert_eq!(stage.as_db_str().parse::<ApplicationStage>(), Ok(*stage));
        }
    }

    #[test]
    fn test_serde_uses_db_strings() {
        let json = serde_json::to_string(&LocationRequirement::InOffice)
            .expect("serialize should succeed");
        assert_eq!(json, "\"in-office\"");
        let level: ExperienceLevel =
            serde_json::from_str("\"mid-level\"").expect("deserialize should succeed");
        assert_eq!(level, ExperienceLevel::MidLevel);
    }

    #[test]
    fn test_parse_error_names_kind() {
        let err = JobListingType::from_db_str("contract").expect_err("should reject");
        let msg = err.to_string();
        assert!(msg.contains("job listing type"));
        assert!(msg.contains("contract"));
    }

    #[test]
    fn test_entity_names_are_distinct() {
        let mut names: Vec<_> = EntityType::ALL.iter().map(|t| t.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), EntityType::ALL.len());
    }
}
