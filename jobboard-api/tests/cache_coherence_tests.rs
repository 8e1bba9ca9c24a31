//! Read-after-write coherence of the tag-invalidated cache, exercised
//! through `CachedDb` over in-memory stores.

mod support;

use std::sync::Arc;

use jobboard_core::{
    tags::reads, ApplicationKey, ApplicationStage, EntityType, JobListingStatus,
};
use jobboard_storage::{ApplicationUpdate, JobBoardStore, JobListingUpdate};
use jobboard_test_utils::{assertions, fixtures, generators, FailingTagStore};
use proptest::prelude::*;
use support::Harness;

// ============================================================================
// WRITE THEN READ
// ============================================================================

#[tokio::test]
async fn test_published_listing_appears_on_cached_board() {
    let h = Harness::new();
    let org = h.org("org_acme").await;
    let listing = h.draft(&org, "Platform Engineer").await;

    // Cache the empty board and the miss for the draft.
    assert!(h.db.published_board().await.expect("board").is_empty());
    assert!(h
        .db
        .published_job_listing(listing.id)
        .await
        .expect("read")
        .is_none());

    h.db.set_job_listing_status(&org, listing.id, JobListingStatus::Published)
        .await
        .expect("publish");

    let board = h.db.published_board().await.expect("board");
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].job_listing.id, listing.id);
    assert_eq!(board[0].organization.id, org);

    let published = h
        .db
        .published_job_listing(listing.id)
        .await
        .expect("read")
        .expect("listing should be visible once published");
    assert!(published.job_listing.posted_at.is_some());
}

#[tokio::test]
async fn test_delisting_removes_listing_from_board() {
    let h = Harness::new();
    let org = h.org("org_acme").await;
    let listing = h.published(&org, "Designer").await;
    assert_eq!(h.db.published_board().await.expect("board").len(), 1);

    h.db.set_job_listing_status(&org, listing.id, JobListingStatus::Delisted)
        .await
        .expect("delist");

    assert!(h.db.published_board().await.expect("board").is_empty());
    assert!(!h
        .db
        .published_job_listing_exists(listing.id)
        .await
        .expect("read"));
}

#[tokio::test]
async fn test_organization_rename_reaches_published_listing() {
    let h = Harness::new();
    let org = h.org("org_acme").await;
    let listing = h.published(&org, "Analyst").await;
    h.db.published_job_listing(listing.id).await.expect("warm");

    let mut renamed = fixtures::organization("org_acme");
    renamed.name = "Acme Holdings".to_string();
    h.db.sync_organization(renamed).await.expect("rename");

    let published = h
        .db
        .published_job_listing(listing.id)
        .await
        .expect("read")
        .expect("still published");
    assert_eq!(published.organization.name, "Acme Holdings");
}

// ============================================================================
// RELATION SCOPE
// ============================================================================

#[tokio::test]
async fn test_new_listing_refreshes_only_its_organization_menu() {
    let h = Harness::new();
    let acme = h.org("org_acme").await;
    let globex = h.org("org_globex").await;
    h.draft(&acme, "Engineer I").await;
    h.draft(&acme, "Engineer II").await;
    h.draft(&globex, "Buyer").await;

    assert_eq!(h.db.listing_menu(&acme).await.expect("menu").len(), 2);
    assert_eq!(h.db.listing_menu(&globex).await.expect("menu").len(), 1);

    h.draft(&acme, "Engineer III").await;

    let hits_before = h.db.cache_stats().await.expect("stats").hits;
    assert_eq!(h.db.listing_menu(&globex).await.expect("menu").len(), 1);
    let hits_after = h.db.cache_stats().await.expect("stats").hits;
    assert_eq!(hits_after, hits_before + 1, "other organization's menu stays cached");

    let menu = h.db.listing_menu(&acme).await.expect("menu");
    assert_eq!(menu.len(), 3);
    assert!(menu.iter().any(|item| item.title == "Engineer III"));
}

#[tokio::test]
async fn test_new_application_refreshes_menu_count() {
    let h = Harness::new();
    let org = h.org("org_acme").await;
    let listing = h.published(&org, "Engineer").await;
    let applicant = h.applicant("user_ada").await;

    let menu = h.db.listing_menu(&org).await.expect("menu");
    assert_eq!(menu[0].application_count, 0);

    h.db.apply(fixtures::application(listing.id, &applicant))
        .await
        .expect("apply");

    let menu = h.db.listing_menu(&org).await.expect("menu");
    assert_eq!(menu[0].application_count, 1);
}

// ============================================================================
// MOVING APPLICATIONS
// ============================================================================

#[tokio::test]
async fn test_move_application_refreshes_both_listings() {
    let h = Harness::new();
    let org = h.org("org_acme").await;
    let from = h.published(&org, "Backend Engineer").await;
    let to = h.published(&org, "Platform Engineer").await;
    let applicant = h.applicant("user_ada").await;
    h.db.apply(fixtures::application(from.id, &applicant))
        .await
        .expect("apply");

    // Warm every read scoped to either listing.
    assert_eq!(h.db.application_count(from.id).await.expect("count"), 1);
    assert_eq!(h.db.application_count(to.id).await.expect("count"), 0);
    assert_eq!(h.db.applications_for_listing(from.id).await.expect("list").len(), 1);
    assert!(h.db.applications_for_listing(to.id).await.expect("list").is_empty());

    let moved = h
        .db
        .move_application(&org, ApplicationKey::new(from.id, applicant.clone()), to.id)
        .await
        .expect("move");
    assert_eq!(moved.job_listing_id, to.id);

    assert_eq!(h.db.application_count(from.id).await.expect("count"), 0);
    assert_eq!(h.db.application_count(to.id).await.expect("count"), 1);
    assert!(h.db.applications_for_listing(from.id).await.expect("list").is_empty());
    assert_eq!(h.db.applications_for_listing(to.id).await.expect("list").len(), 1);

    let mine = h.db.applications_for_user(&applicant).await.expect("mine");
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].job_listing_id, to.id);
}

#[tokio::test]
async fn test_move_to_foreign_listing_is_not_found() {
    let h = Harness::new();
    let acme = h.org("org_acme").await;
    let globex = h.org("org_globex").await;
    let from = h.published(&acme, "Engineer").await;
    let foreign = h.published(&globex, "Engineer").await;
    let applicant = h.applicant("user_ada").await;
    h.db.apply(fixtures::application(from.id, &applicant))
        .await
        .expect("apply");

    let result = h
        .db
        .move_application(&acme, ApplicationKey::new(from.id, applicant), foreign.id)
        .await;
    assertions::assert_not_found(&result, EntityType::JobListings);
    assert_eq!(h.db.application_count(from.id).await.expect("count"), 1);
}

// ============================================================================
// INVALIDATION FAILURE
// ============================================================================

#[tokio::test]
async fn test_invalidation_failure_surfaces_after_commit() {
    let tags = Arc::new(FailingTagStore::new());
    let h = Harness::with_tag_store(tags.clone());
    let org = h.org("org_acme").await;
    let listing = h.draft(&org, "Engineer").await;
    h.db.job_listing_for_organization(&org, listing.id)
        .await
        .expect("warm");

    tags.arm();
    let result = h
        .db
        .update_job_listing(
            &org,
            listing.id,
            JobListingUpdate {
                title: Some("Senior Engineer".to_string()),
                ..JobListingUpdate::default()
            },
        )
        .await;
    assertions::assert_invalidation_failed(&result);
    assert!(tags.failed_invalidations() > 0);

    // The row mutation itself committed.
    let stored = h
        .store
        .job_listing_get(&listing.id)
        .await
        .expect("store read")
        .expect("listing exists");
    assert_eq!(stored.title, "Senior Engineer");
}

#[tokio::test]
async fn test_failed_application_update_still_commits() {
    let tags = Arc::new(FailingTagStore::new());
    let h = Harness::with_tag_store(tags.clone());
    let org = h.org("org_acme").await;
    let listing = h.published(&org, "Engineer").await;
    let applicant = h.applicant("user_ada").await;
    h.db.apply(fixtures::application(listing.id, &applicant))
        .await
        .expect("apply");

    tags.arm();
    let key = ApplicationKey::new(listing.id, applicant);
    let result = h
        .db
        .update_application(
            &org,
            key.clone(),
            ApplicationUpdate {
                stage: Some(ApplicationStage::Interested),
                rating: Some(Some(4)),
            },
        )
        .await;
    assertions::assert_invalidation_failed(&result);

    let stored = h
        .store
        .application_get(&key)
        .await
        .expect("store read")
        .expect("application exists");
    assert_eq!(stored.stage, ApplicationStage::Interested);
    assert_eq!(stored.rating, Some(4));
}

// ============================================================================
// IDEMPOTENT INVALIDATION
// ============================================================================

#[tokio::test]
async fn test_invalidating_twice_is_harmless() {
    let h = Harness::new();
    let user = h.user("user_ada").await;
    h.db.user(&user).await.expect("warm");

    let tags = reads::user(&user);
    let first = h.db.cache().invalidate(&tags).await.expect("first");
    assert!(first >= 1);
    let second = h.db.cache().invalidate(&tags).await.expect("second");
    assert_eq!(second, 0);

    // Re-syncing an unchanged user is a plain write.
    h.user("user_ada").await;
    h.user("user_ada").await;
    let fetched = h.db.user(&user).await.expect("read").expect("user exists");
    assert_eq!(fetched.email, "user_ada@example.com");
}

#[tokio::test]
async fn test_unused_tag_invalidation_is_not_an_error() {
    let h = Harness::new();
    let listing = jobboard_core::JobListingId::new();
    let evicted = h
        .db
        .cache()
        .invalidate(&reads::published_job_listing(&listing))
        .await
        .expect("invalidate");
    assert_eq!(evicted, 0);
}

// ============================================================================
// PROPERTIES
// ============================================================================

fn test_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime should build")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Whatever form a listing has, the owner sees the latest write.
    #[test]
    fn prop_owner_reads_latest_listing(
        org in generators::arb_organization_upsert(),
        status in generators::arb_job_listing_status(),
        featured in any::<bool>(),
    ) {
        let rt = test_runtime();
        rt.block_on(async {
            let h = Harness::new();
            let org_id = h.db.sync_organization(org).await.expect("org").id;
            let listing = h.draft(&org_id, "Engineer").await;
            h.db.job_listing_for_organization(&org_id, listing.id).await.expect("warm");

            h.db.set_job_listing_status(&org_id, listing.id, status).await.expect("status");
            h.db.set_job_listing_featured(&org_id, listing.id, featured).await.expect("featured");

            let read = h
                .db
                .job_listing_for_organization(&org_id, listing.id)
                .await
                .expect("read")
                .expect("owner sees listing");
            prop_assert_eq!(read.status, status);
            prop_assert_eq!(read.is_featured, featured);

            let board = h.db.published_board().await.expect("board");
            prop_assert_eq!(board.len(), usize::from(status.is_public()));
            Ok(())
        })?;
    }

    /// Ratings set through the employer path are visible on the next read.
    #[test]
    fn prop_rating_write_is_visible(rating in generators::arb_rating()) {
        let rt = test_runtime();
        rt.block_on(async {
            let h = Harness::new();
            let org = h.org("org_acme").await;
            let listing = h.published(&org, "Engineer").await;
            let applicant = h.applicant("user_ada").await;
            h.db.apply(fixtures::application(listing.id, &applicant)).await.expect("apply");
            h.db.applications_for_listing(listing.id).await.expect("warm");

            h.db.update_application(
                &org,
                ApplicationKey::new(listing.id, applicant),
                ApplicationUpdate { stage: None, rating: Some(rating) },
            )
            .await
            .expect("rate");

            let rows = h.db.applications_for_listing(listing.id).await.expect("read");
            prop_assert_eq!(rows[0].application.rating, rating);
            Ok(())
        })?;
    }
}
