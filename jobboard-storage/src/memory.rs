//! In-memory [`JobBoardStore`] for tests and local development.
//!
//! All tables sit behind one lock so cascading deletes and moves are atomic,
//! the way a single Postgres transaction would make them.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use jobboard_core::{
    Applicant, ApplicationKey, ApplicationWithApplicant, EntityType, JobBoardResult, JobListing,
    JobListingApplication, JobListingCascade, JobListingId, JobListingMenuItem,
    JobListingStatus, Organization, OrganizationCascade, OrganizationId, OrganizationSummary,
    OrganizationUserKey, OrganizationUserSettings, PublishedJobListing, StorageError, User,
    UserCascade, UserId, UserNotificationSettings, UserResume,
};

use crate::store::{ApplicationMove, JobBoardStore};
use crate::{
    now, ApplicationUpdate, JobListingUpdate, NewApplication, NewJobListing,
    NotificationSettingsUpsert, OrganizationUpsert, OrganizationUserSettingsUpsert, ResumeUpdate,
    ResumeUpsert, UserUpsert,
};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    organizations: HashMap<OrganizationId, Organization>,
    job_listings: HashMap<JobListingId, JobListing>,
    applications: BTreeMap<ApplicationKey, JobListingApplication>,
    resumes: HashMap<UserId, UserResume>,
    notification_settings: HashMap<UserId, UserNotificationSettings>,
    org_user_settings: BTreeMap<OrganizationUserKey, OrganizationUserSettings>,
}

impl Tables {
    fn published(&self, listing: &JobListing) -> Option<PublishedJobListing> {
        if listing.status != JobListingStatus::Published {
            return None;
        }
        let organization = self.organizations.get(&listing.organization_id)?;
        Some(PublishedJobListing {
            job_listing: listing.clone(),
            organization: OrganizationSummary::from(organization),
        })
    }

    fn remove_applications_where(
        &mut self,
        pred: impl Fn(&ApplicationKey) -> bool,
    ) -> Vec<JobListingApplication> {
        let keys: Vec<ApplicationKey> = self
            .applications
            .keys()
            .filter(|key| pred(key))
            .cloned()
            .collect();
        keys.iter()
            .filter_map(|key| self.applications.remove(key))
            .collect()
    }

    fn remove_listing(&mut self, id: &JobListingId) -> Option<JobListingCascade> {
        let job_listing = self.job_listings.remove(id)?;
        let applications = self.remove_applications_where(|key| key.job_listing_id == *id);
        Some(JobListingCascade {
            job_listing,
            applications,
        })
    }

    fn count_applications(&self, id: &JobListingId) -> u64 {
        self.applications
            .keys()
            .filter(|key| key.job_listing_id == *id)
            .count() as u64
    }
}

/// In-memory job board store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> JobBoardResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StorageError::LockPoisoned.into())
    }

    fn write(&self) -> JobBoardResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StorageError::LockPoisoned.into())
    }

    pub fn job_listing_count(&self) -> usize {
        self.read().map(|t| t.job_listings.len()).unwrap_or(0)
    }

    pub fn application_count(&self) -> usize {
        self.read().map(|t| t.applications.len()).unwrap_or(0)
    }
}

#[async_trait]
impl JobBoardStore for InMemoryStore {
    // === Users ===

    async fn user_upsert(&self, user: UserUpsert) -> JobBoardResult<User> {
        let mut tables = self.write()?;
        let now = now();
        let row = match tables.users.get(&user.id) {
            Some(existing) => User {
                name: user.name,
                image_url: user.image_url,
                email: user.email,
                updated_at: now,
                ..existing.clone()
            },
            None => User {
                id: user.id,
                name: user.name,
                image_url: user.image_url,
                email: user.email,
                created_at: now,
                updated_at: now,
            },
        };
        let duplicate_email = tables
            .users
            .values()
            .any(|other| other.id != row.id && other.email == row.email);
        if duplicate_email {
            return Err(StorageError::already_exists(EntityType::Users, &row.email).into());
        }
        tables.users.insert(row.id.clone(), row.clone());
        Ok(row)
    }

    async fn user_get(&self, id: &UserId) -> JobBoardResult<Option<User>> {
        Ok(self.read()?.users.get(id).cloned())
    }

    async fn user_delete(&self, id: &UserId) -> JobBoardResult<Option<UserCascade>> {
        let mut tables = self.write()?;
        let Some(user) = tables.users.remove(id) else {
            return Ok(None);
        };
        let applications = tables.remove_applications_where(|key| key.user_id == *id);
        let resume = tables.resumes.remove(id);
        let notification_settings = tables.notification_settings.remove(id);
        let org_keys: Vec<OrganizationUserKey> = tables
            .org_user_settings
            .keys()
            .filter(|key| key.user_id == *id)
            .cloned()
            .collect();
        let organization_settings = org_keys
            .iter()
            .filter_map(|key| tables.org_user_settings.remove(key))
            .collect();
        Ok(Some(UserCascade {
            user,
            applications,
            resume,
            notification_settings,
            organization_settings,
        }))
    }

    // === Organizations ===

    async fn organization_upsert(&self, org: OrganizationUpsert) -> JobBoardResult<Organization> {
        let mut tables = self.write()?;
        let now = now();
        let row = match tables.organizations.get(&org.id) {
            Some(existing) => Organization {
                name: org.name,
                image_url: org.image_url,
                updated_at: now,
                ..existing.clone()
            },
            None => Organization {
                id: org.id,
                name: org.name,
                image_url: org.image_url,
                created_at: now,
                updated_at: now,
            },
        };
        tables.organizations.insert(row.id.clone(), row.clone());
        Ok(row)
    }

    async fn organization_get(&self, id: &OrganizationId) -> JobBoardResult<Option<Organization>> {
        Ok(self.read()?.organizations.get(id).cloned())
    }

    async fn organization_delete(
        &self,
        id: &OrganizationId,
    ) -> JobBoardResult<Option<OrganizationCascade>> {
        let mut tables = self.write()?;
        let Some(organization) = tables.organizations.remove(id) else {
            return Ok(None);
        };
        let listing_ids: Vec<JobListingId> = tables
            .job_listings
            .values()
            .filter(|listing| listing.organization_id == *id)
            .map(|listing| listing.id)
            .collect();
        let job_listings = listing_ids
            .iter()
            .filter_map(|listing_id| tables.remove_listing(listing_id))
            .collect();
        let member_keys: Vec<OrganizationUserKey> = tables
            .org_user_settings
            .keys()
            .filter(|key| key.organization_id == *id)
            .cloned()
            .collect();
        let member_settings = member_keys
            .iter()
            .filter_map(|key| tables.org_user_settings.remove(key))
            .collect();
        Ok(Some(OrganizationCascade {
            organization,
            job_listings,
            member_settings,
        }))
    }

    // === Job listings ===

    async fn job_listing_insert(&self, listing: NewJobListing) -> JobBoardResult<JobListing> {
        let mut tables = self.write()?;
        if !tables.organizations.contains_key(&listing.organization_id) {
            return Err(
                StorageError::not_found(EntityType::Organizations, &listing.organization_id)
                    .into(),
            );
        }
        let row = listing.into_listing(JobListingId::new(), now());
        tables.job_listings.insert(row.id, row.clone());
        Ok(row)
    }

    async fn job_listing_get(&self, id: &JobListingId) -> JobBoardResult<Option<JobListing>> {
        Ok(self.read()?.job_listings.get(id).cloned())
    }

    async fn job_listing_get_published(
        &self,
        id: &JobListingId,
    ) -> JobBoardResult<Option<PublishedJobListing>> {
        let tables = self.read()?;
        Ok(tables
            .job_listings
            .get(id)
            .and_then(|listing| tables.published(listing)))
    }

    async fn job_listing_update(
        &self,
        id: &JobListingId,
        update: JobListingUpdate,
    ) -> JobBoardResult<JobListing> {
        let mut tables = self.write()?;
        let listing = tables
            .job_listings
            .get_mut(id)
            .ok_or_else(|| StorageError::not_found(EntityType::JobListings, id))?;
        update.apply_to(listing, now());
        Ok(listing.clone())
    }

    async fn job_listing_delete(
        &self,
        id: &JobListingId,
    ) -> JobBoardResult<Option<JobListingCascade>> {
        Ok(self.write()?.remove_listing(id))
    }

    async fn job_listing_list_published(&self) -> JobBoardResult<Vec<PublishedJobListing>> {
        let tables = self.read()?;
        let mut rows: Vec<PublishedJobListing> = tables
            .job_listings
            .values()
            .filter_map(|listing| tables.published(listing))
            .collect();
        rows.sort_by(|a, b| {
            let (a, b) = (&a.job_listing, &b.job_listing);
            b.is_featured
                .cmp(&a.is_featured)
                .then_with(|| b.posted_at.cmp(&a.posted_at))
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(rows)
    }

    async fn job_listing_menu_for_org(
        &self,
        organization_id: &OrganizationId,
    ) -> JobBoardResult<Vec<JobListingMenuItem>> {
        let tables = self.read()?;
        let mut rows: Vec<JobListingMenuItem> = tables
            .job_listings
            .values()
            .filter(|listing| listing.organization_id == *organization_id)
            .map(|listing| JobListingMenuItem {
                id: listing.id,
                title: listing.title.clone(),
                status: listing.status,
                is_featured: listing.is_featured,
                application_count: tables.count_applications(&listing.id),
                created_at: listing.created_at,
            })
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(rows)
    }

    // === Applications ===

    async fn application_insert(
        &self,
        application: NewApplication,
    ) -> JobBoardResult<JobListingApplication> {
        let mut tables = self.write()?;
        if !tables.job_listings.contains_key(&application.job_listing_id) {
            return Err(StorageError::not_found(
                EntityType::JobListings,
                application.job_listing_id,
            )
            .into());
        }
        if !tables.users.contains_key(&application.user_id) {
            return Err(StorageError::not_found(EntityType::Users, &application.user_id).into());
        }
        let row = application.into_application(now());
        let key = row.key();
        if tables.applications.contains_key(&key) {
            return Err(
                StorageError::already_exists(EntityType::JobListingApplications, key).into(),
            );
        }
        tables.applications.insert(key, row.clone());
        Ok(row)
    }

    async fn application_get(
        &self,
        key: &ApplicationKey,
    ) -> JobBoardResult<Option<JobListingApplication>> {
        Ok(self.read()?.applications.get(key).cloned())
    }

    async fn application_update(
        &self,
        key: &ApplicationKey,
        update: ApplicationUpdate,
    ) -> JobBoardResult<JobListingApplication> {
        let mut tables = self.write()?;
        let application = tables
            .applications
            .get_mut(key)
            .ok_or_else(|| StorageError::not_found(EntityType::JobListingApplications, key))?;
        update.apply_to(application, now());
        Ok(application.clone())
    }

    async fn application_move(
        &self,
        key: &ApplicationKey,
        to: &JobListingId,
    ) -> JobBoardResult<ApplicationMove> {
        let mut tables = self.write()?;
        if !tables.job_listings.contains_key(to) {
            return Err(StorageError::not_found(EntityType::JobListings, to).into());
        }
        let target = ApplicationKey::new(*to, key.user_id.clone());
        if tables.applications.contains_key(&target) {
            return Err(
                StorageError::already_exists(EntityType::JobListingApplications, target).into(),
            );
        }
        let before = tables
            .applications
            .remove(key)
            .ok_or_else(|| StorageError::not_found(EntityType::JobListingApplications, key))?;
        let after = JobListingApplication {
            job_listing_id: *to,
            updated_at: now(),
            ..before.clone()
        };
        tables.applications.insert(target, after.clone());
        Ok(ApplicationMove { before, after })
    }

    async fn application_list_for_listing(
        &self,
        job_listing_id: &JobListingId,
    ) -> JobBoardResult<Vec<ApplicationWithApplicant>> {
        let tables = self.read()?;
        let mut rows: Vec<ApplicationWithApplicant> = tables
            .applications
            .values()
            .filter(|app| app.job_listing_id == *job_listing_id)
            .filter_map(|app| {
                let user = tables.users.get(&app.user_id)?;
                let resume = tables.resumes.get(&app.user_id);
                Some(ApplicationWithApplicant {
                    application: app.clone(),
                    applicant: Applicant {
                        user_id: user.id.clone(),
                        name: user.name.clone(),
                        image_url: user.image_url.clone(),
                        email: user.email.clone(),
                        resume_file_url: resume.map(|r| r.resume_file_url.clone()),
                        ai_summary: resume.and_then(|r| r.ai_summary.clone()),
                    },
                })
            })
            .collect();
        rows.sort_by(|a, b| a.application.created_at.cmp(&b.application.created_at));
        Ok(rows)
    }

    async fn application_count_for_listing(
        &self,
        job_listing_id: &JobListingId,
    ) -> JobBoardResult<u64> {
        Ok(self.read()?.count_applications(job_listing_id))
    }

    async fn application_list_for_user(
        &self,
        user_id: &UserId,
    ) -> JobBoardResult<Vec<JobListingApplication>> {
        let tables = self.read()?;
        let mut rows: Vec<JobListingApplication> = tables
            .applications
            .values()
            .filter(|app| app.user_id == *user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    // === Resumes ===

    async fn resume_upsert(&self, resume: ResumeUpsert) -> JobBoardResult<UserResume> {
        let mut tables = self.write()?;
        if !tables.users.contains_key(&resume.user_id) {
            return Err(StorageError::not_found(EntityType::Users, &resume.user_id).into());
        }
        let now = now();
        let row = match tables.resumes.get(&resume.user_id) {
            Some(existing) => UserResume {
                resume_file_url: resume.resume_file_url,
                resume_file_key: resume.resume_file_key,
                updated_at: now,
                ..existing.clone()
            },
            None => UserResume {
                user_id: resume.user_id,
                resume_file_url: resume.resume_file_url,
                resume_file_key: resume.resume_file_key,
                ai_summary: None,
                created_at: now,
                updated_at: now,
            },
        };
        tables.resumes.insert(row.user_id.clone(), row.clone());
        Ok(row)
    }

    async fn resume_update(
        &self,
        user_id: &UserId,
        update: ResumeUpdate,
    ) -> JobBoardResult<UserResume> {
        let mut tables = self.write()?;
        let resume = tables
            .resumes
            .get_mut(user_id)
            .ok_or_else(|| StorageError::not_found(EntityType::UserResumes, user_id))?;
        update.apply_to(resume, now());
        Ok(resume.clone())
    }

    async fn resume_get(&self, user_id: &UserId) -> JobBoardResult<Option<UserResume>> {
        Ok(self.read()?.resumes.get(user_id).cloned())
    }

    // === Notification settings ===

    async fn notification_settings_insert_default(
        &self,
        user_id: &UserId,
    ) -> JobBoardResult<Option<UserNotificationSettings>> {
        let mut tables = self.write()?;
        if tables.notification_settings.contains_key(user_id) {
            return Ok(None);
        }
        if !tables.users.contains_key(user_id) {
            return Err(StorageError::not_found(EntityType::Users, user_id).into());
        }
        let now = now();
        let row = UserNotificationSettings {
            user_id: user_id.clone(),
            new_job_email_notifications: false,
            ai_prompt: None,
            created_at: now,
            updated_at: now,
        };
        tables.notification_settings.insert(user_id.clone(), row.clone());
        Ok(Some(row))
    }

    async fn notification_settings_upsert(
        &self,
        settings: NotificationSettingsUpsert,
    ) -> JobBoardResult<UserNotificationSettings> {
        let mut tables = self.write()?;
        if !tables.users.contains_key(&settings.user_id) {
            return Err(StorageError::not_found(EntityType::Users, &settings.user_id).into());
        }
        let now = now();
        let created_at = tables
            .notification_settings
            .get(&settings.user_id)
            .map_or(now, |existing| existing.created_at);
        let row = UserNotificationSettings {
            user_id: settings.user_id,
            new_job_email_notifications: settings.new_job_email_notifications,
            ai_prompt: settings.ai_prompt,
            created_at,
            updated_at: now,
        };
        tables
            .notification_settings
            .insert(row.user_id.clone(), row.clone());
        Ok(row)
    }

    async fn notification_settings_get(
        &self,
        user_id: &UserId,
    ) -> JobBoardResult<Option<UserNotificationSettings>> {
        Ok(self.read()?.notification_settings.get(user_id).cloned())
    }

    // === Organization user settings ===

    async fn org_user_settings_upsert(
        &self,
        settings: OrganizationUserSettingsUpsert,
    ) -> JobBoardResult<OrganizationUserSettings> {
        let mut tables = self.write()?;
        if !tables.users.contains_key(&settings.user_id) {
            return Err(StorageError::not_found(EntityType::Users, &settings.user_id).into());
        }
        if !tables.organizations.contains_key(&settings.organization_id) {
            return Err(StorageError::not_found(
                EntityType::Organizations,
                &settings.organization_id,
            )
            .into());
        }
        let key = OrganizationUserKey::new(settings.user_id, settings.organization_id);
        let now = now();
        let created_at = tables
            .org_user_settings
            .get(&key)
            .map_or(now, |existing| existing.created_at);
        let row = OrganizationUserSettings {
            user_id: key.user_id.clone(),
            organization_id: key.organization_id.clone(),
            new_application_email_notifications: settings.new_application_email_notifications,
            minimum_rating: settings.minimum_rating,
            created_at,
            updated_at: now,
        };
        tables.org_user_settings.insert(key, row.clone());
        Ok(row)
    }

    async fn org_user_settings_get(
        &self,
        key: &OrganizationUserKey,
    ) -> JobBoardResult<Option<OrganizationUserSettings>> {
        Ok(self.read()?.org_user_settings.get(key).cloned())
    }

    async fn org_user_settings_list_notifiable(
        &self,
        organization_id: &OrganizationId,
    ) -> JobBoardResult<Vec<OrganizationUserSettings>> {
        Ok(self
            .read()?
            .org_user_settings
            .values()
            .filter(|s| s.organization_id == *organization_id)
            .filter(|s| s.new_application_email_notifications)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> JobBoardResult<()> {
        self.read().map(|_| ())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use jobboard_core::{
        ApplicationStage, ExperienceLevel, JobBoardError, JobListingType, LocationRequirement,
    };
    use proptest::prelude::*;

    async fn seeded() -> (InMemoryStore, OrganizationId, UserId) {
        let store = InMemoryStore::new();
        let org = store
            .organization_upsert(OrganizationUpsert {
                id: OrganizationId::new("org_1"),
                name: "Acme".to_string(),
                image_url: None,
            })
            .await
            .expect("organization upsert should succeed");
        let user = store
            .user_upsert(UserUpsert {
                id: UserId::new("user_1"),
                name: "Ada".to_string(),
                image_url: "https://img/ada".to_string(),
                email: "ada@example.com".to_string(),
            })
            .await
            .expect("user upsert should succeed");
        (store, org.id, user.id)
    }

    fn new_listing(org: &OrganizationId, title: &str) -> NewJobListing {
        NewJobListing {
            organization_id: org.clone(),
            title: title.to_string(),
            description: "desc".to_string(),
            wage: None,
            wage_interval: None,
            state_abbreviation: None,
            city: None,
            location_requirement: LocationRequirement::Remote,
            experience_level: ExperienceLevel::Junior,
            listing_type: JobListingType::Internship,
        }
    }

    async fn published(store: &InMemoryStore, org: &OrganizationId, title: &str) -> JobListing {
        let listing = store
            .job_listing_insert(new_listing(org, title))
            .await
            .expect("insert should succeed");
        store
            .job_listing_update(&listing.id, JobListingUpdate::status(JobListingStatus::Published))
            .await
            .expect("publish should succeed")
    }

    #[tokio::test]
    async fn test_listing_insert_requires_organization() {
        let store = InMemoryStore::new();
        let err = store
            .job_listing_insert(new_listing(&OrganizationId::new("org_missing"), "x"))
            .await
            .expect_err("insert should fail");
        assert!(matches!(
            err,
            JobBoardError::Storage(StorageError::NotFound {
                entity_type: EntityType::Organizations,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_published_lookup_hides_drafts() {
        let (store, org, _) = seeded().await;
        let draft = store
            .job_listing_insert(new_listing(&org, "Draft"))
            .await
            .expect("insert should succeed");
        assert!(store
            .job_listing_get_published(&draft.id)
            .await
            .expect("lookup should succeed")
            .is_none());

        let listing = published(&store, &org, "Live").await;
        let row = store
            .job_listing_get_published(&listing.id)
            .await
            .expect("lookup should succeed")
            .expect("published listing should be visible");
        assert_eq!(row.organization.name, "Acme");
    }

    #[tokio::test]
    async fn test_board_orders_featured_first() {
        let (store, org, _) = seeded().await;
        let plain = published(&store, &org, "Plain").await;
        std::thread::sleep(std::time::Duration::from_millis(2));
        let featured = published(&store, &org, "Featured").await;
        store
            .job_listing_update(&featured.id, JobListingUpdate::featured(true))
            .await
            .expect("feature should succeed");
        std::thread::sleep(std::time::Duration::from_millis(2));
        let newest = published(&store, &org, "Newest").await;

        let board = store
            .job_listing_list_published()
            .await
            .expect("board should load");
        let ids: Vec<JobListingId> = board.iter().map(|r| r.job_listing.id).collect();
        assert_eq!(ids, vec![featured.id, newest.id, plain.id]);
    }

    #[tokio::test]
    async fn test_duplicate_application_is_rejected() {
        let (store, org, user) = seeded().await;
        let listing = published(&store, &org, "Live").await;
        let app = NewApplication {
            job_listing_id: listing.id,
            user_id: user.clone(),
            cover_letter: None,
        };
        store
            .application_insert(app.clone())
            .await
            .expect("first application should succeed");
        let err = store
            .application_insert(app)
            .await
            .expect_err("second application should fail");
        assert!(matches!(
            err,
            JobBoardError::Storage(StorageError::AlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_application_move_changes_counts() {
        let (store, org, user) = seeded().await;
        let from = published(&store, &org, "From").await;
        let to = published(&store, &org, "To").await;
        let app = store
            .application_insert(NewApplication {
                job_listing_id: from.id,
                user_id: user,
                cover_letter: Some("hi".to_string()),
            })
            .await
            .expect("apply should succeed");

        let moved = store
            .application_move(&app.key(), &to.id)
            .await
            .expect("move should succeed");
        assert_eq!(moved.before.job_listing_id, from.id);
        assert_eq!(moved.after.job_listing_id, to.id);
        assert_eq!(moved.after.cover_letter.as_deref(), Some("hi"));
        assert_eq!(
            store.application_count_for_listing(&from.id).await.expect("count"),
            0
        );
        assert_eq!(
            store.application_count_for_listing(&to.id).await.expect("count"),
            1
        );
    }

    #[tokio::test]
    async fn test_applicant_join_includes_resume() {
        let (store, org, user) = seeded().await;
        let listing = published(&store, &org, "Live").await;
        store
            .resume_upsert(ResumeUpsert {
                user_id: user.clone(),
                resume_file_url: "https://files/r.pdf".to_string(),
                resume_file_key: "r.pdf".to_string(),
            })
            .await
            .expect("resume upsert should succeed");
        store
            .resume_update(
                &user,
                ResumeUpdate {
                    ai_summary: Some(Some("Strong Rust".to_string())),
                    ..ResumeUpdate::default()
                },
            )
            .await
            .expect("resume update should succeed");
        store
            .application_insert(NewApplication {
                job_listing_id: listing.id,
                user_id: user,
                cover_letter: None,
            })
            .await
            .expect("apply should succeed");

        let rows = store
            .application_list_for_listing(&listing.id)
            .await
            .expect("list should succeed");
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].applicant.resume_file_url.as_deref(),
            Some("https://files/r.pdf")
        );
        assert_eq!(rows[0].applicant.ai_summary.as_deref(), Some("Strong Rust"));
        assert_eq!(rows[0].application.stage, ApplicationStage::Applied);
    }

    #[tokio::test]
    async fn test_organization_delete_cascades() {
        let (store, org, user) = seeded().await;
        let listing = published(&store, &org, "Live").await;
        store
            .application_insert(NewApplication {
                job_listing_id: listing.id,
                user_id: user.clone(),
                cover_letter: None,
            })
            .await
            .expect("apply should succeed");
        store
            .org_user_settings_upsert(OrganizationUserSettingsUpsert {
                user_id: user,
                organization_id: org.clone(),
                new_application_email_notifications: true,
                minimum_rating: None,
            })
            .await
            .expect("settings upsert should succeed");

        let cascade = store
            .organization_delete(&org)
            .await
            .expect("delete should succeed")
            .expect("organization should exist");
        assert_eq!(cascade.job_listings.len(), 1);
        assert_eq!(cascade.job_listings[0].applications.len(), 1);
        assert_eq!(cascade.member_settings.len(), 1);
        assert_eq!(store.job_listing_count(), 0);
        assert_eq!(store.application_count(), 0);
        assert!(store
            .organization_delete(&org)
            .await
            .expect("second delete should succeed")
            .is_none());
    }

    #[tokio::test]
    async fn test_user_delete_cascades() {
        let (store, org, user) = seeded().await;
        let listing = published(&store, &org, "Live").await;
        store
            .application_insert(NewApplication {
                job_listing_id: listing.id,
                user_id: user.clone(),
                cover_letter: None,
            })
            .await
            .expect("apply should succeed");
        store
            .notification_settings_insert_default(&user)
            .await
            .expect("default settings should insert");

        let cascade = store
            .user_delete(&user)
            .await
            .expect("delete should succeed")
            .expect("user should exist");
        assert_eq!(cascade.applications.len(), 1);
        assert!(cascade.notification_settings.is_some());
        assert!(cascade.resume.is_none());
        assert_eq!(store.application_count(), 0);
    }

    #[tokio::test]
    async fn test_default_notification_settings_do_not_overwrite() {
        let (store, _, user) = seeded().await;
        store
            .notification_settings_upsert(NotificationSettingsUpsert {
                user_id: user.clone(),
                new_job_email_notifications: true,
                ai_prompt: Some("remote rust".to_string()),
            })
            .await
            .expect("upsert should succeed");

        let inserted = store
            .notification_settings_insert_default(&user)
            .await
            .expect("insert default should succeed");
        assert!(inserted.is_none());
        let settings = store
            .notification_settings_get(&user)
            .await
            .expect("get should succeed")
            .expect("settings should exist");
        assert!(settings.new_job_email_notifications);
    }

    #[tokio::test]
    async fn test_notifiable_members_filter_opt_in() {
        let (store, org, user) = seeded().await;
        let other = store
            .user_upsert(UserUpsert {
                id: UserId::new("user_2"),
                name: "Grace".to_string(),
                image_url: "https://img/grace".to_string(),
                email: "grace@example.com".to_string(),
            })
            .await
            .expect("user upsert should succeed");
        for (member, opted_in) in [(user.clone(), true), (other.id, false)] {
            store
                .org_user_settings_upsert(OrganizationUserSettingsUpsert {
                    user_id: member,
                    organization_id: org.clone(),
                    new_application_email_notifications: opted_in,
                    minimum_rating: Some(3),
                })
                .await
                .expect("settings upsert should succeed");
        }

        let members = store
            .org_user_settings_list_notifiable(&org)
            .await
            .expect("list should succeed");
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, user);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let (store, _, _) = seeded().await;
        let err = store
            .user_upsert(UserUpsert {
                id: UserId::new("user_2"),
                name: "Impostor".to_string(),
                image_url: String::new(),
                email: "ada@example.com".to_string(),
            })
            .await
            .expect_err("duplicate email should fail");
        assert!(matches!(
            err,
            JobBoardError::Storage(StorageError::AlreadyExists { .. })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Lookups of rows that were never written return `None`.
        #[test]
        fn prop_missing_rows_return_none(raw_user in "user_[a-z0-9]{1,12}") {
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .expect("runtime should build");
            rt.block_on(async {
                let store = InMemoryStore::new();
                let user = UserId::new(raw_user);
                prop_assert!(store.user_get(&user).await.expect("get").is_none());
                prop_assert!(store.resume_get(&user).await.expect("get").is_none());
                prop_assert!(store
                    .job_listing_get(&JobListingId::new())
                    .await
                    .expect("get")
                    .is_none());
                prop_assert!(store.user_delete(&user).await.expect("delete").is_none());
                Ok(())
            })?;
        }

        /// The menu count always matches the number of applications.
        #[test]
        fn prop_menu_count_matches_applications(applicants in 0usize..6) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .expect("runtime should build");
            rt.block_on(async {
                let (store, org, _) = seeded().await;
                let listing = published(&store, &org, "Live").await;
                for i in 0..applicants {
                    let user = store
                        .user_upsert(UserUpsert {
                            id: UserId::new(format!("applicant_{i}")),
                            name: format!("Applicant {i}"),
                            image_url: String::new(),
                            email: format!("applicant{i}@example.com"),
                        })
                        .await
                        .expect("user upsert should succeed");
                    store
                        .application_insert(NewApplication {
                            job_listing_id: listing.id,
                            user_id: user.id,
                            cover_letter: None,
                        })
                        .await
                        .expect("apply should succeed");
                }
                let menu = store.job_listing_menu_for_org(&org).await.expect("menu");
                prop_assert_eq!(menu.len(), 1);
                prop_assert_eq!(menu[0].application_count, applicants as u64);
                Ok(())
            })?;
        }
    }
}
