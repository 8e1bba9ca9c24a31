//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling with deadpool-postgres and the Postgres
//! implementation of [`JobBoardStore`].
//!
//! Every multi-statement operation runs in one transaction. Cascading
//! deletes remove children explicitly with `RETURNING` before the parent so
//! the caller learns exactly which rows went away.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolError, RecyclingMethod, Runtime};
use jobboard_core::{
    Applicant, ApplicationKey, ApplicationWithApplicant, EntityType, EnumParseError,
    JobBoardError, JobBoardResult, JobListing, JobListingApplication, JobListingCascade,
    JobListingId, JobListingMenuItem, Organization, OrganizationCascade, OrganizationId,
    OrganizationSummary, OrganizationUserKey, OrganizationUserSettings, PublishedJobListing,
    StorageError, User, UserCascade, UserId, UserNotificationSettings, UserResume,
};
use jobboard_storage::{
    now, ApplicationMove, ApplicationUpdate, JobBoardStore, JobListingUpdate, NewApplication,
    NewJobListing, NotificationSettingsUpsert, OrganizationUpsert, OrganizationUserSettingsUpsert,
    ResumeUpdate, ResumeUpsert, UserUpsert,
};
use tokio_postgres::error::SqlState;
use tokio_postgres::types::{FromSql, ToSql};
use tokio_postgres::{NoTls, Row, Transaction};
use uuid::Uuid;

use crate::constants::{DEFAULT_DB_POOL_SIZE, DEFAULT_DB_TIMEOUT_SECS};
use crate::error::{ApiError, ApiResult};

const MIGRATIONS: &[(&str, &str)] = &[("0001_init", include_str!("../migrations/0001_init.sql"))];

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// How long to wait for a pooled connection
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "jobboard".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: DEFAULT_DB_POOL_SIZE,
            timeout: Duration::from_secs(DEFAULT_DB_TIMEOUT_SECS),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("JOBBOARD_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("JOBBOARD_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("JOBBOARD_DB_NAME").unwrap_or_else(|_| "jobboard".to_string()),
            user: std::env::var("JOBBOARD_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("JOBBOARD_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("JOBBOARD_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DB_POOL_SIZE),
            timeout: Duration::from_secs(
                std::env::var("JOBBOARD_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DB_TIMEOUT_SECS),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = deadpool_postgres::PoolConfig::new(self.max_size);
        pool_cfg.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

fn pool_err(err: PoolError) -> JobBoardError {
    tracing::error!("Connection pool error: {:?}", err);
    let reason = match err {
        PoolError::Timeout(_) => "connection pool exhausted".to_string(),
        PoolError::Closed => "connection pool is closed".to_string(),
        other => other.to_string(),
    };
    StorageError::Unavailable { reason }.into()
}

fn query_err(err: tokio_postgres::Error) -> JobBoardError {
    tracing::error!("Database error: {:?}", err);
    StorageError::Unavailable {
        reason: err.to_string(),
    }
    .into()
}

fn write_err(entity_type: EntityType, id: String) -> impl FnOnce(tokio_postgres::Error) -> JobBoardError {
    move |err| {
        if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
            return StorageError::already_exists(entity_type, id).into();
        }
        if err.is_closed() {
            return query_err(err);
        }
        tracing::error!(entity_type = %entity_type, id = %id, "Database write failed: {:?}", err);
        StorageError::UpdateFailed {
            entity_type,
            id,
            reason: err.to_string(),
        }
        .into()
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn col<'a, T: FromSql<'a>>(row: &'a Row, entity_type: EntityType, name: &str) -> JobBoardResult<T> {
    row.try_get(name).map_err(|e| {
        StorageError::Corrupt {
            entity_type,
            reason: format!("column {}: {}", name, e),
        }
        .into()
    })
}

fn enum_col<E>(row: &Row, entity_type: EntityType, name: &str) -> JobBoardResult<E>
where
    E: FromStr<Err = EnumParseError>,
{
    let raw: String = col(row, entity_type, name)?;
    parse_enum(&raw, entity_type)
}

fn opt_enum_col<E>(row: &Row, entity_type: EntityType, name: &str) -> JobBoardResult<Option<E>>
where
    E: FromStr<Err = EnumParseError>,
{
    let raw: Option<String> = col(row, entity_type, name)?;
    raw.map(|s| parse_enum(&s, entity_type)).transpose()
}

fn parse_enum<E>(raw: &str, entity_type: EntityType) -> JobBoardResult<E>
where
    E: FromStr<Err = EnumParseError>,
{
    raw.parse().map_err(|e: EnumParseError| {
        StorageError::Corrupt {
            entity_type,
            reason: e.to_string(),
        }
        .into()
    })
}

macro_rules! user_columns {
    () => {
        "u.id, u.name, u.image_url, u.email, u.created_at, u.updated_at"
    };
}

macro_rules! organization_columns {
    () => {
        "o.id, o.name, o.image_url, o.created_at, o.updated_at"
    };
}

macro_rules! listing_columns {
    () => {
        "jl.id, jl.organization_id, jl.title, jl.description, jl.wage, jl.wage_interval, \
         jl.state_abbreviation, jl.city, jl.is_featured, jl.location_requirement, \
         jl.experience_level, jl.status, jl.type, jl.posted_at, jl.created_at, jl.updated_at"
    };
}

macro_rules! application_columns {
    () => {
        "a.job_listing_id, a.user_id, a.cover_letter, a.rating, a.stage, a.created_at, a.updated_at"
    };
}

macro_rules! resume_columns {
    () => {
        "r.user_id, r.resume_file_url, r.resume_file_key, r.ai_summary, r.created_at, r.updated_at"
    };
}

macro_rules! notification_columns {
    () => {
        "n.user_id, n.new_job_email_notifications, n.ai_prompt, n.created_at, n.updated_at"
    };
}

macro_rules! org_user_columns {
    () => {
        "s.user_id, s.organization_id, s.new_application_email_notifications, s.minimum_rating, \
         s.created_at, s.updated_at"
    };
}

fn user_from_row(row: &Row) -> JobBoardResult<User> {
    let et = EntityType::Users;
    Ok(User {
        id: UserId::new(col::<String>(row, et, "id")?),
        name: col(row, et, "name")?,
        image_url: col(row, et, "image_url")?,
        email: col(row, et, "email")?,
        created_at: col(row, et, "created_at")?,
        updated_at: col(row, et, "updated_at")?,
    })
}

fn organization_from_row(row: &Row) -> JobBoardResult<Organization> {
    let et = EntityType::Organizations;
    Ok(Organization {
        id: OrganizationId::new(col::<String>(row, et, "id")?),
        name: col(row, et, "name")?,
        image_url: col(row, et, "image_url")?,
        created_at: col(row, et, "created_at")?,
        updated_at: col(row, et, "updated_at")?,
    })
}

fn listing_from_row(row: &Row) -> JobBoardResult<JobListing> {
    let et = EntityType::JobListings;
    Ok(JobListing {
        id: JobListingId::from_uuid(col::<Uuid>(row, et, "id")?),
        organization_id: OrganizationId::new(col::<String>(row, et, "organization_id")?),
        title: col(row, et, "title")?,
        description: col(row, et, "description")?,
        wage: col(row, et, "wage")?,
        wage_interval: opt_enum_col(row, et, "wage_interval")?,
        state_abbreviation: col(row, et, "state_abbreviation")?,
        city: col(row, et, "city")?,
        is_featured: col(row, et, "is_featured")?,
        location_requirement: enum_col(row, et, "location_requirement")?,
        experience_level: enum_col(row, et, "experience_level")?,
        status: enum_col(row, et, "status")?,
        listing_type: enum_col(row, et, "type")?,
        posted_at: col(row, et, "posted_at")?,
        created_at: col(row, et, "created_at")?,
        updated_at: col(row, et, "updated_at")?,
    })
}

fn published_from_row(row: &Row) -> JobBoardResult<PublishedJobListing> {
    let job_listing = listing_from_row(row)?;
    let et = EntityType::Organizations;
    Ok(PublishedJobListing {
        organization: OrganizationSummary {
            id: job_listing.organization_id.clone(),
            name: col(row, et, "organization_name")?,
            image_url: col(row, et, "organization_image_url")?,
        },
        job_listing,
    })
}

fn application_from_row(row: &Row) -> JobBoardResult<JobListingApplication> {
    let et = EntityType::JobListingApplications;
    Ok(JobListingApplication {
        job_listing_id: JobListingId::from_uuid(col::<Uuid>(row, et, "job_listing_id")?),
        user_id: UserId::new(col::<String>(row, et, "user_id")?),
        cover_letter: col(row, et, "cover_letter")?,
        rating: col(row, et, "rating")?,
        stage: enum_col(row, et, "stage")?,
        created_at: col(row, et, "created_at")?,
        updated_at: col(row, et, "updated_at")?,
    })
}

fn resume_from_row(row: &Row) -> JobBoardResult<UserResume> {
    let et = EntityType::UserResumes;
    Ok(UserResume {
        user_id: UserId::new(col::<String>(row, et, "user_id")?),
        resume_file_url: col(row, et, "resume_file_url")?,
        resume_file_key: col(row, et, "resume_file_key")?,
        ai_summary: col(row, et, "ai_summary")?,
        created_at: col(row, et, "created_at")?,
        updated_at: col(row, et, "updated_at")?,
    })
}

fn notification_settings_from_row(row: &Row) -> JobBoardResult<UserNotificationSettings> {
    let et = EntityType::UserNotificationSettings;
    Ok(UserNotificationSettings {
        user_id: UserId::new(col::<String>(row, et, "user_id")?),
        new_job_email_notifications: col(row, et, "new_job_email_notifications")?,
        ai_prompt: col(row, et, "ai_prompt")?,
        created_at: col(row, et, "created_at")?,
        updated_at: col(row, et, "updated_at")?,
    })
}

fn org_user_settings_from_row(row: &Row) -> JobBoardResult<OrganizationUserSettings> {
    let et = EntityType::OrganizationUserSettings;
    Ok(OrganizationUserSettings {
        user_id: UserId::new(col::<String>(row, et, "user_id")?),
        organization_id: OrganizationId::new(col::<String>(row, et, "organization_id")?),
        new_application_email_notifications: col(row, et, "new_application_email_notifications")?,
        minimum_rating: col(row, et, "minimum_rating")?,
        created_at: col(row, et, "created_at")?,
        updated_at: col(row, et, "updated_at")?,
    })
}

fn rows_to<T>(rows: &[Row], map: fn(&Row) -> JobBoardResult<T>) -> JobBoardResult<Vec<T>> {
    rows.iter().map(map).collect()
}

async fn exists(
    tx: &Transaction<'_>,
    sql: &str,
    params: &[&(dyn ToSql + Sync)],
) -> JobBoardResult<bool> {
    Ok(tx.query_opt(sql, params).await.map_err(query_err)?.is_some())
}

async fn require_user(tx: &Transaction<'_>, id: &UserId) -> JobBoardResult<()> {
    if exists(tx, "SELECT 1 FROM users WHERE id = $1", &[&id.as_str()]).await? {
        Ok(())
    } else {
        Err(StorageError::not_found(EntityType::Users, id).into())
    }
}

async fn require_organization(tx: &Transaction<'_>, id: &OrganizationId) -> JobBoardResult<()> {
    if exists(tx, "SELECT 1 FROM organizations WHERE id = $1", &[&id.as_str()]).await? {
        Ok(())
    } else {
        Err(StorageError::not_found(EntityType::Organizations, id).into())
    }
}

async fn require_listing(tx: &Transaction<'_>, id: &JobListingId) -> JobBoardResult<()> {
    if exists(tx, "SELECT 1 FROM job_listings WHERE id = $1", &[&id.as_uuid()]).await? {
        Ok(())
    } else {
        Err(StorageError::not_found(EntityType::JobListings, id).into())
    }
}

// ============================================================================
// DATABASE CLIENT WRAPPER
// ============================================================================

/// Postgres-backed [`JobBoardStore`] over a connection pool.
#[derive(Clone)]
pub struct DbClient {
    pool: Pool,
}

impl DbClient {
    /// Create a new database client with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new database client from configuration.
    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    /// Get a connection from the pool.
    async fn get_conn(&self) -> JobBoardResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(pool_err)
    }

    /// Apply the bundled schema. Statements are idempotent.
    pub async fn migrate(&self) -> JobBoardResult<()> {
        let conn = self.get_conn().await?;
        for (name, sql) in MIGRATIONS {
            conn.batch_execute(sql).await.map_err(query_err)?;
            tracing::info!(migration = name, "Applied migration");
        }
        Ok(())
    }
}

#[async_trait]
impl JobBoardStore for DbClient {
    // ========================================================================
    // USERS
    // ========================================================================

    async fn user_upsert(&self, user: UserUpsert) -> JobBoardResult<User> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                concat!(
                    "INSERT INTO users AS u (id, name, image_url, email, created_at, updated_at) ",
                    "VALUES ($1, $2, $3, $4, $5, $5) ",
                    "ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, ",
                    "image_url = EXCLUDED.image_url, email = EXCLUDED.email, ",
                    "updated_at = EXCLUDED.updated_at ",
                    "RETURNING ",
                    user_columns!()
                ),
                &[&user.id.as_str(), &user.name, &user.image_url, &user.email, &now()],
            )
            .await
            .map_err(write_err(EntityType::Users, user.email.clone()))?;
        user_from_row(&row)
    }

    async fn user_get(&self, id: &UserId) -> JobBoardResult<Option<User>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                concat!("SELECT ", user_columns!(), " FROM users u WHERE u.id = $1"),
                &[&id.as_str()],
            )
            .await
            .map_err(query_err)?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn user_delete(&self, id: &UserId) -> JobBoardResult<Option<UserCascade>> {
        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(query_err)?;
        let key = id.as_str();

        let applications = tx
            .query(
                concat!(
                    "DELETE FROM job_listing_applications a WHERE a.user_id = $1 RETURNING ",
                    application_columns!()
                ),
                &[&key],
            )
            .await
            .map_err(query_err)?;
        let resume = tx
            .query_opt(
                concat!("DELETE FROM user_resumes r WHERE r.user_id = $1 RETURNING ", resume_columns!()),
                &[&key],
            )
            .await
            .map_err(query_err)?;
        let notification_settings = tx
            .query_opt(
                concat!(
                    "DELETE FROM user_notification_settings n WHERE n.user_id = $1 RETURNING ",
                    notification_columns!()
                ),
                &[&key],
            )
            .await
            .map_err(query_err)?;
        let organization_settings = tx
            .query(
                concat!(
                    "DELETE FROM organization_user_settings s WHERE s.user_id = $1 RETURNING ",
                    org_user_columns!()
                ),
                &[&key],
            )
            .await
            .map_err(query_err)?;
        let Some(user) = tx
            .query_opt(
                concat!("DELETE FROM users u WHERE u.id = $1 RETURNING ", user_columns!()),
                &[&key],
            )
            .await
            .map_err(query_err)?
        else {
            return Ok(None);
        };

        let cascade = UserCascade {
            user: user_from_row(&user)?,
            applications: rows_to(&applications, application_from_row)?,
            resume: resume.as_ref().map(resume_from_row).transpose()?,
            notification_settings: notification_settings
                .as_ref()
                .map(notification_settings_from_row)
                .transpose()?,
            organization_settings: rows_to(&organization_settings, org_user_settings_from_row)?,
        };
        tx.commit().await.map_err(query_err)?;
        Ok(Some(cascade))
    }

    // ========================================================================
    // ORGANIZATIONS
    // ========================================================================

    async fn organization_upsert(&self, org: OrganizationUpsert) -> JobBoardResult<Organization> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                concat!(
                    "INSERT INTO organizations AS o (id, name, image_url, created_at, updated_at) ",
                    "VALUES ($1, $2, $3, $4, $4) ",
                    "ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, ",
                    "image_url = EXCLUDED.image_url, updated_at = EXCLUDED.updated_at ",
                    "RETURNING ",
                    organization_columns!()
                ),
                &[&org.id.as_str(), &org.name, &org.image_url, &now()],
            )
            .await
            .map_err(write_err(EntityType::Organizations, org.id.to_string()))?;
        organization_from_row(&row)
    }

    async fn organization_get(&self, id: &OrganizationId) -> JobBoardResult<Option<Organization>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                concat!("SELECT ", organization_columns!(), " FROM organizations o WHERE o.id = $1"),
                &[&id.as_str()],
            )
            .await
            .map_err(query_err)?;
        row.as_ref().map(organization_from_row).transpose()
    }

    async fn organization_delete(
        &self,
        id: &OrganizationId,
    ) -> JobBoardResult<Option<OrganizationCascade>> {
        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(query_err)?;
        let key = id.as_str();

        let application_rows = tx
            .query(
                concat!(
                    "DELETE FROM job_listing_applications a USING job_listings jl ",
                    "WHERE a.job_listing_id = jl.id AND jl.organization_id = $1 RETURNING ",
                    application_columns!()
                ),
                &[&key],
            )
            .await
            .map_err(query_err)?;
        let listing_rows = tx
            .query(
                concat!(
                    "DELETE FROM job_listings jl WHERE jl.organization_id = $1 RETURNING ",
                    listing_columns!()
                ),
                &[&key],
            )
            .await
            .map_err(query_err)?;
        let member_rows = tx
            .query(
                concat!(
                    "DELETE FROM organization_user_settings s WHERE s.organization_id = $1 RETURNING ",
                    org_user_columns!()
                ),
                &[&key],
            )
            .await
            .map_err(query_err)?;
        let Some(organization) = tx
            .query_opt(
                concat!("DELETE FROM organizations o WHERE o.id = $1 RETURNING ", organization_columns!()),
                &[&key],
            )
            .await
            .map_err(query_err)?
        else {
            return Ok(None);
        };

        let mut by_listing: HashMap<JobListingId, Vec<JobListingApplication>> = HashMap::new();
        for application in rows_to(&application_rows, application_from_row)? {
            by_listing
                .entry(application.job_listing_id)
                .or_default()
                .push(application);
        }
        let job_listings = rows_to(&listing_rows, listing_from_row)?
            .into_iter()
            .map(|job_listing| JobListingCascade {
                applications: by_listing.remove(&job_listing.id).unwrap_or_default(),
                job_listing,
            })
            .collect();

        let cascade = OrganizationCascade {
            organization: organization_from_row(&organization)?,
            job_listings,
            member_settings: rows_to(&member_rows, org_user_settings_from_row)?,
        };
        tx.commit().await.map_err(query_err)?;
        Ok(Some(cascade))
    }

    // ========================================================================
    // JOB LISTINGS
    // ========================================================================

    async fn job_listing_insert(&self, listing: NewJobListing) -> JobBoardResult<JobListing> {
        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(query_err)?;
        require_organization(&tx, &listing.organization_id).await?;

        let row = listing.into_listing(JobListingId::new(), now());
        tx.execute(
            concat!(
                "INSERT INTO job_listings (id, organization_id, title, description, wage, ",
                "wage_interval, state_abbreviation, city, is_featured, location_requirement, ",
                "experience_level, status, type, posted_at, created_at, updated_at) ",
                "VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)"
            ),
            &[
                &row.id.as_uuid(),
                &row.organization_id.as_str(),
                &row.title,
                &row.description,
                &row.wage,
                &row.wage_interval.map(|w| w.as_db_str()),
                &row.state_abbreviation,
                &row.city,
                &row.is_featured,
                &row.location_requirement.as_db_str(),
                &row.experience_level.as_db_str(),
                &row.status.as_db_str(),
                &row.listing_type.as_db_str(),
                &row.posted_at,
                &row.created_at,
                &row.updated_at,
            ],
        )
        .await
        .map_err(write_err(EntityType::JobListings, row.id.to_string()))?;
        tx.commit().await.map_err(query_err)?;
        Ok(row)
    }

    async fn job_listing_get(&self, id: &JobListingId) -> JobBoardResult<Option<JobListing>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                concat!("SELECT ", listing_columns!(), " FROM job_listings jl WHERE jl.id = $1"),
                &[&id.as_uuid()],
            )
            .await
            .map_err(query_err)?;
        row.as_ref().map(listing_from_row).transpose()
    }

    async fn job_listing_get_published(
        &self,
        id: &JobListingId,
    ) -> JobBoardResult<Option<PublishedJobListing>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                concat!(
                    "SELECT ",
                    listing_columns!(),
                    ", o.name AS organization_name, o.image_url AS organization_image_url ",
                    "FROM job_listings jl JOIN organizations o ON o.id = jl.organization_id ",
                    "WHERE jl.id = $1 AND jl.status = 'published'"
                ),
                &[&id.as_uuid()],
            )
            .await
            .map_err(query_err)?;
        row.as_ref().map(published_from_row).transpose()
    }

    async fn job_listing_update(
        &self,
        id: &JobListingId,
        update: JobListingUpdate,
    ) -> JobBoardResult<JobListing> {
        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(query_err)?;
        let current = tx
            .query_opt(
                concat!(
                    "SELECT ",
                    listing_columns!(),
                    " FROM job_listings jl WHERE jl.id = $1 FOR UPDATE"
                ),
                &[&id.as_uuid()],
            )
            .await
            .map_err(query_err)?
            .ok_or_else(|| StorageError::not_found(EntityType::JobListings, id))?;

        let mut listing = listing_from_row(&current)?;
        update.apply_to(&mut listing, now());

        tx.execute(
            concat!(
                "UPDATE job_listings SET title = $2, description = $3, wage = $4, ",
                "wage_interval = $5, state_abbreviation = $6, city = $7, is_featured = $8, ",
                "location_requirement = $9, experience_level = $10, status = $11, type = $12, ",
                "posted_at = $13, updated_at = $14 WHERE id = $1"
            ),
            &[
                &listing.id.as_uuid(),
                &listing.title,
                &listing.description,
                &listing.wage,
                &listing.wage_interval.map(|w| w.as_db_str()),
                &listing.state_abbreviation,
                &listing.city,
                &listing.is_featured,
                &listing.location_requirement.as_db_str(),
                &listing.experience_level.as_db_str(),
                &listing.status.as_db_str(),
                &listing.listing_type.as_db_str(),
                &listing.posted_at,
                &listing.updated_at,
            ],
        )
        .await
        .map_err(write_err(EntityType::JobListings, id.to_string()))?;
        tx.commit().await.map_err(query_err)?;
        Ok(listing)
    }

    async fn job_listing_delete(
        &self,
        id: &JobListingId,
    ) -> JobBoardResult<Option<JobListingCascade>> {
        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(query_err)?;
        let key = id.as_uuid();

        let applications = tx
            .query(
                concat!(
                    "DELETE FROM job_listing_applications a WHERE a.job_listing_id = $1 RETURNING ",
                    application_columns!()
                ),
                &[&key],
            )
            .await
            .map_err(query_err)?;
        let Some(listing) = tx
            .query_opt(
                concat!("DELETE FROM job_listings jl WHERE jl.id = $1 RETURNING ", listing_columns!()),
                &[&key],
            )
            .await
            .map_err(query_err)?
        else {
            return Ok(None);
        };

        let cascade = JobListingCascade {
            job_listing: listing_from_row(&listing)?,
            applications: rows_to(&applications, application_from_row)?,
        };
        tx.commit().await.map_err(query_err)?;
        Ok(Some(cascade))
    }

    async fn job_listing_list_published(&self) -> JobBoardResult<Vec<PublishedJobListing>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                concat!(
                    "SELECT ",
                    listing_columns!(),
                    ", o.name AS organization_name, o.image_url AS organization_image_url ",
                    "FROM job_listings jl JOIN organizations o ON o.id = jl.organization_id ",
                    "WHERE jl.status = 'published' ",
                    "ORDER BY jl.is_featured DESC, jl.posted_at DESC NULLS LAST, jl.id DESC"
                ),
                &[],
            )
            .await
            .map_err(query_err)?;
        rows_to(&rows, published_from_row)
    }

    async fn job_listing_menu_for_org(
        &self,
        organization_id: &OrganizationId,
    ) -> JobBoardResult<Vec<JobListingMenuItem>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                concat!(
                    "SELECT jl.id, jl.title, jl.status, jl.is_featured, jl.created_at, ",
                    "COUNT(a.user_id) AS application_count ",
                    "FROM job_listings jl ",
                    "LEFT JOIN job_listing_applications a ON a.job_listing_id = jl.id ",
                    "WHERE jl.organization_id = $1 ",
                    "GROUP BY jl.id ORDER BY jl.created_at DESC, jl.id DESC"
                ),
                &[&organization_id.as_str()],
            )
            .await
            .map_err(query_err)?;

        let et = EntityType::JobListings;
        rows.iter()
            .map(|row| {
                let count: i64 = col(row, et, "application_count")?;
                Ok(JobListingMenuItem {
                    id: JobListingId::from_uuid(col::<Uuid>(row, et, "id")?),
                    title: col(row, et, "title")?,
                    status: enum_col(row, et, "status")?,
                    is_featured: col(row, et, "is_featured")?,
                    application_count: u64::try_from(count).unwrap_or(0),
                    created_at: col(row, et, "created_at")?,
                })
            })
            .collect()
    }

    // ========================================================================
    // APPLICATIONS
    // ========================================================================

    async fn application_insert(
        &self,
        application: NewApplication,
    ) -> JobBoardResult<JobListingApplication> {
        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(query_err)?;
        require_listing(&tx, &application.job_listing_id).await?;
        require_user(&tx, &application.user_id).await?;

        let row = application.into_application(now());
        let key = row.key();
        let inserted = tx
            .execute(
                concat!(
                    "INSERT INTO job_listing_applications (job_listing_id, user_id, cover_letter, ",
                    "rating, stage, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7) ",
                    "ON CONFLICT (job_listing_id, user_id) DO NOTHING"
                ),
                &[
                    &row.job_listing_id.as_uuid(),
                    &row.user_id.as_str(),
                    &row.cover_letter,
                    &row.rating,
                    &row.stage.as_db_str(),
                    &row.created_at,
                    &row.updated_at,
                ],
            )
            .await
            .map_err(write_err(EntityType::JobListingApplications, key.to_string()))?;
        if inserted == 0 {
            return Err(StorageError::already_exists(EntityType::JobListingApplications, key).into());
        }
        tx.commit().await.map_err(query_err)?;
        Ok(row)
    }

    async fn application_get(
        &self,
        key: &ApplicationKey,
    ) -> JobBoardResult<Option<JobListingApplication>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                concat!(
                    "SELECT ",
                    application_columns!(),
                    " FROM job_listing_applications a WHERE a.job_listing_id = $1 AND a.user_id = $2"
                ),
                &[&key.job_listing_id.as_uuid(), &key.user_id.as_str()],
            )
            .await
            .map_err(query_err)?;
        row.as_ref().map(application_from_row).transpose()
    }

    async fn application_update(
        &self,
        key: &ApplicationKey,
        update: ApplicationUpdate,
    ) -> JobBoardResult<JobListingApplication> {
        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(query_err)?;
        let current = tx
            .query_opt(
                concat!(
                    "SELECT ",
                    application_columns!(),
                    " FROM job_listing_applications a ",
                    "WHERE a.job_listing_id = $1 AND a.user_id = $2 FOR UPDATE"
                ),
                &[&key.job_listing_id.as_uuid(), &key.user_id.as_str()],
            )
            .await
            .map_err(query_err)?
            .ok_or_else(|| StorageError::not_found(EntityType::JobListingApplications, key))?;

        let mut application = application_from_row(&current)?;
        update.apply_to(&mut application, now());

        tx.execute(
            concat!(
                "UPDATE job_listing_applications SET stage = $3, rating = $4, updated_at = $5 ",
                "WHERE job_listing_id = $1 AND user_id = $2"
            ),
            &[
                &key.job_listing_id.as_uuid(),
                &key.user_id.as_str(),
                &application.stage.as_db_str(),
                &application.rating,
                &application.updated_at,
            ],
        )
        .await
        .map_err(write_err(EntityType::JobListingApplications, key.to_string()))?;
        tx.commit().await.map_err(query_err)?;
        Ok(application)
    }

    async fn application_move(
        &self,
        key: &ApplicationKey,
        to: &JobListingId,
    ) -> JobBoardResult<ApplicationMove> {
        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(query_err)?;
        require_listing(&tx, to).await?;

        let target = ApplicationKey::new(*to, key.user_id.clone());
        let taken = exists(
            &tx,
            "SELECT 1 FROM job_listing_applications WHERE job_listing_id = $1 AND user_id = $2",
            &[&to.as_uuid(), &key.user_id.as_str()],
        )
        .await?;
        if taken {
            return Err(StorageError::already_exists(EntityType::JobListingApplications, target).into());
        }

        let current = tx
            .query_opt(
                concat!(
                    "SELECT ",
                    application_columns!(),
                    " FROM job_listing_applications a ",
                    "WHERE a.job_listing_id = $1 AND a.user_id = $2 FOR UPDATE"
                ),
                &[&key.job_listing_id.as_uuid(), &key.user_id.as_str()],
            )
            .await
            .map_err(query_err)?
            .ok_or_else(|| StorageError::not_found(EntityType::JobListingApplications, key))?;
        let before = application_from_row(&current)?;
        let after = JobListingApplication {
            job_listing_id: *to,
            updated_at: now(),
            ..before.clone()
        };

        tx.execute(
            concat!(
                "UPDATE job_listing_applications SET job_listing_id = $3, updated_at = $4 ",
                "WHERE job_listing_id = $1 AND user_id = $2"
            ),
            &[
                &key.job_listing_id.as_uuid(),
                &key.user_id.as_str(),
                &to.as_uuid(),
                &after.updated_at,
            ],
        )
        .await
        .map_err(write_err(EntityType::JobListingApplications, target.to_string()))?;
        tx.commit().await.map_err(query_err)?;
        Ok(ApplicationMove { before, after })
    }

    async fn application_list_for_listing(
        &self,
        job_listing_id: &JobListingId,
    ) -> JobBoardResult<Vec<ApplicationWithApplicant>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                concat!(
                    "SELECT ",
                    application_columns!(),
                    ", u.name AS applicant_name, u.image_url AS applicant_image_url, ",
                    "u.email AS applicant_email, r.resume_file_url, r.ai_summary ",
                    "FROM job_listing_applications a ",
                    "JOIN users u ON u.id = a.user_id ",
                    "LEFT JOIN user_resumes r ON r.user_id = a.user_id ",
                    "WHERE a.job_listing_id = $1 ORDER BY a.created_at ASC"
                ),
                &[&job_listing_id.as_uuid()],
            )
            .await
            .map_err(query_err)?;

        let et = EntityType::Users;
        rows.iter()
            .map(|row| {
                let application = application_from_row(row)?;
                Ok(ApplicationWithApplicant {
                    applicant: Applicant {
                        user_id: application.user_id.clone(),
                        name: col(row, et, "applicant_name")?,
                        image_url: col(row, et, "applicant_image_url")?,
                        email: col(row, et, "applicant_email")?,
                        resume_file_url: col(row, EntityType::UserResumes, "resume_file_url")?,
                        ai_summary: col(row, EntityType::UserResumes, "ai_summary")?,
                    },
                    application,
                })
            })
            .collect()
    }

    async fn application_count_for_listing(
        &self,
        job_listing_id: &JobListingId,
    ) -> JobBoardResult<u64> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                "SELECT COUNT(*) AS n FROM job_listing_applications WHERE job_listing_id = $1",
                &[&job_listing_id.as_uuid()],
            )
            .await
            .map_err(query_err)?;
        let count: i64 = col(&row, EntityType::JobListingApplications, "n")?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn application_list_for_user(
        &self,
        user_id: &UserId,
    ) -> JobBoardResult<Vec<JobListingApplication>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                concat!(
                    "SELECT ",
                    application_columns!(),
                    " FROM job_listing_applications a WHERE a.user_id = $1 ORDER BY a.created_at DESC"
                ),
                &[&user_id.as_str()],
            )
            .await
            .map_err(query_err)?;
        rows_to(&rows, application_from_row)
    }

    // ========================================================================
    // RESUMES
    // ========================================================================

    async fn resume_upsert(&self, resume: ResumeUpsert) -> JobBoardResult<UserResume> {
        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(query_err)?;
        require_user(&tx, &resume.user_id).await?;

        let row = tx
            .query_one(
                concat!(
                    "INSERT INTO user_resumes AS r (user_id, resume_file_url, resume_file_key, ",
                    "created_at, updated_at) VALUES ($1, $2, $3, $4, $4) ",
                    "ON CONFLICT (user_id) DO UPDATE SET resume_file_url = EXCLUDED.resume_file_url, ",
                    "resume_file_key = EXCLUDED.resume_file_key, updated_at = EXCLUDED.updated_at ",
                    "RETURNING ",
                    resume_columns!()
                ),
                &[
                    &resume.user_id.as_str(),
                    &resume.resume_file_url,
                    &resume.resume_file_key,
                    &now(),
                ],
            )
            .await
            .map_err(write_err(EntityType::UserResumes, resume.user_id.to_string()))?;
        let saved = resume_from_row(&row)?;
        tx.commit().await.map_err(query_err)?;
        Ok(saved)
    }

    async fn resume_update(
        &self,
        user_id: &UserId,
        update: ResumeUpdate,
    ) -> JobBoardResult<UserResume> {
        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(query_err)?;
        let current = tx
            .query_opt(
                concat!(
                    "SELECT ",
                    resume_columns!(),
                    " FROM user_resumes r WHERE r.user_id = $1 FOR UPDATE"
                ),
                &[&user_id.as_str()],
            )
            .await
            .map_err(query_err)?
            .ok_or_else(|| StorageError::not_found(EntityType::UserResumes, user_id))?;

        let mut resume = resume_from_row(&current)?;
        update.apply_to(&mut resume, now());

        tx.execute(
            concat!(
                "UPDATE user_resumes SET resume_file_url = $2, resume_file_key = $3, ",
                "ai_summary = $4, updated_at = $5 WHERE user_id = $1"
            ),
            &[
                &user_id.as_str(),
                &resume.resume_file_url,
                &resume.resume_file_key,
                &resume.ai_summary,
                &resume.updated_at,
            ],
        )
        .await
        .map_err(write_err(EntityType::UserResumes, user_id.to_string()))?;
        tx.commit().await.map_err(query_err)?;
        Ok(resume)
    }

    async fn resume_get(&self, user_id: &UserId) -> JobBoardResult<Option<UserResume>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                concat!("SELECT ", resume_columns!(), " FROM user_resumes r WHERE r.user_id = $1"),
                &[&user_id.as_str()],
            )
            .await
            .map_err(query_err)?;
        row.as_ref().map(resume_from_row).transpose()
    }

    // ========================================================================
    // NOTIFICATION SETTINGS
    // ========================================================================

    async fn notification_settings_insert_default(
        &self,
        user_id: &UserId,
    ) -> JobBoardResult<Option<UserNotificationSettings>> {
        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(query_err)?;
        require_user(&tx, user_id).await?;

        let row = tx
            .query_opt(
                concat!(
                    "INSERT INTO user_notification_settings AS n (user_id, created_at, updated_at) ",
                    "VALUES ($1, $2, $2) ON CONFLICT (user_id) DO NOTHING RETURNING ",
                    notification_columns!()
                ),
                &[&user_id.as_str(), &now()],
            )
            .await
            .map_err(write_err(EntityType::UserNotificationSettings, user_id.to_string()))?;
        let inserted = row.as_ref().map(notification_settings_from_row).transpose()?;
        tx.commit().await.map_err(query_err)?;
        Ok(inserted)
    }

    async fn notification_settings_upsert(
        &self,
        settings: NotificationSettingsUpsert,
    ) -> JobBoardResult<UserNotificationSettings> {
        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(query_err)?;
        require_user(&tx, &settings.user_id).await?;

        let row = tx
            .query_one(
                concat!(
                    "INSERT INTO user_notification_settings AS n (user_id, ",
                    "new_job_email_notifications, ai_prompt, created_at, updated_at) ",
                    "VALUES ($1, $2, $3, $4, $4) ON CONFLICT (user_id) DO UPDATE SET ",
                    "new_job_email_notifications = EXCLUDED.new_job_email_notifications, ",
                    "ai_prompt = EXCLUDED.ai_prompt, updated_at = EXCLUDED.updated_at ",
                    "RETURNING ",
                    notification_columns!()
                ),
                &[
                    &settings.user_id.as_str(),
                    &settings.new_job_email_notifications,
                    &settings.ai_prompt,
                    &now(),
                ],
            )
            .await
            .map_err(write_err(
                EntityType::UserNotificationSettings,
                settings.user_id.to_string(),
            ))?;
        let saved = notification_settings_from_row(&row)?;
        tx.commit().await.map_err(query_err)?;
        Ok(saved)
    }

    async fn notification_settings_get(
        &self,
        user_id: &UserId,
    ) -> JobBoardResult<Option<UserNotificationSettings>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                concat!(
                    "SELECT ",
                    notification_columns!(),
                    " FROM user_notification_settings n WHERE n.user_id = $1"
                ),
                &[&user_id.as_str()],
            )
            .await
            .map_err(query_err)?;
        row.as_ref().map(notification_settings_from_row).transpose()
    }

    // ========================================================================
    // ORGANIZATION USER SETTINGS
    // ========================================================================

    async fn org_user_settings_upsert(
        &self,
        settings: OrganizationUserSettingsUpsert,
    ) -> JobBoardResult<OrganizationUserSettings> {
        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(query_err)?;
        require_user(&tx, &settings.user_id).await?;
        require_organization(&tx, &settings.organization_id).await?;

        let key = OrganizationUserKey::new(settings.user_id.clone(), settings.organization_id.clone());
        let row = tx
            .query_one(
                concat!(
                    "INSERT INTO organization_user_settings AS s (user_id, organization_id, ",
                    "new_application_email_notifications, minimum_rating, created_at, updated_at) ",
                    "VALUES ($1, $2, $3, $4, $5, $5) ",
                    "ON CONFLICT (user_id, organization_id) DO UPDATE SET ",
                    "new_application_email_notifications = EXCLUDED.new_application_email_notifications, ",
                    "minimum_rating = EXCLUDED.minimum_rating, updated_at = EXCLUDED.updated_at ",
                    "RETURNING ",
                    org_user_columns!()
                ),
                &[
                    &settings.user_id.as_str(),
                    &settings.organization_id.as_str(),
                    &settings.new_application_email_notifications,
                    &settings.minimum_rating,
                    &now(),
                ],
            )
            .await
            .map_err(write_err(EntityType::OrganizationUserSettings, key.to_string()))?;
        let saved = org_user_settings_from_row(&row)?;
        tx.commit().await.map_err(query_err)?;
        Ok(saved)
    }

    async fn org_user_settings_get(
        &self,
        key: &OrganizationUserKey,
    ) -> JobBoardResult<Option<OrganizationUserSettings>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                concat!(
                    "SELECT ",
                    org_user_columns!(),
                    " FROM organization_user_settings s ",
                    "WHERE s.user_id = $1 AND s.organization_id = $2"
                ),
                &[&key.user_id.as_str(), &key.organization_id.as_str()],
            )
            .await
            .map_err(query_err)?;
        row.as_ref().map(org_user_settings_from_row).transpose()
    }

    async fn org_user_settings_list_notifiable(
        &self,
        organization_id: &OrganizationId,
    ) -> JobBoardResult<Vec<OrganizationUserSettings>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                concat!(
                    "SELECT ",
                    org_user_columns!(),
                    " FROM organization_user_settings s ",
                    "WHERE s.organization_id = $1 AND s.new_application_email_notifications"
                ),
                &[&organization_id.as_str()],
            )
            .await
            .map_err(query_err)?;
        rows_to(&rows, org_user_settings_from_row)
    }

    // ========================================================================
    // HEALTH
    // ========================================================================

    async fn ping(&self) -> JobBoardResult<()> {
        let conn = self.get_conn().await?;
        conn.execute("SELECT 1", &[]).await.map_err(query_err)?;
        Ok(())
    }
}
