//! Error types for job board operations

use crate::{EntityType, EnumParseError};
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: EntityType, id: String },

    #[error("Entity already exists: {entity_type} with id {id}")]
    AlreadyExists { entity_type: EntityType, id: String },

    #[error("Insert failed for {entity_type}: {reason}")]
    InsertFailed { entity_type: EntityType, reason: String },

    #[error("Update failed for {entity_type} with id {id}: {reason}")]
    UpdateFailed {
        entity_type: EntityType,
        id: String,
        reason: String,
    },

    #[error("Invalid stored value for {entity_type}: {reason}")]
    Corrupt { entity_type: EntityType, reason: String },

    #[error("Storage backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    pub fn not_found(entity_type: EntityType, id: impl ToString) -> Self {
        StorageError::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    pub fn already_exists(entity_type: EntityType, id: impl ToString) -> Self {
        StorageError::AlreadyExists {
            entity_type,
            id: id.to_string(),
        }
    }
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Constraint violation on {constraint}: {reason}")]
    ConstraintViolation { constraint: String, reason: String },

    #[error(transparent)]
    InvalidEnum(#[from] EnumParseError),
}

/// Cache layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache store unavailable: {reason}")]
    Unavailable { reason: String },

    /// The row mutation committed but stale entries could not be evicted.
    #[error("Invalidation of tag {tag} failed: {reason}")]
    InvalidationFailed { tag: String, reason: String },

    #[error("Cache serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("LMDB error during {operation}: {reason}")]
    Lmdb { operation: String, reason: String },

    #[error("Background task failed: {reason}")]
    TaskFailed { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all job board errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobBoardError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for job board operations.
pub type JobBoardResult<T> = Result<T, JobBoardError>;

// =============================================================================
// TESTS
// =============================================================================
