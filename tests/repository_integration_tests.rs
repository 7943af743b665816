//! Postgres repository tests. They need a disposable database:
//! `DATABASE_URL=postgres://... cargo test -- --ignored`

use chrono::{Days, Utc};
use rental_marketplace::{
    error::ErrorCode,
    lifecycle::BookingActor,
    models::{
        BookingStatus, CreateBookingRequest, ReferenceFilter, ReferenceInput, ReferenceKind,
        ReviewDecision, ReviewRequest, Role, User, Vehicle, VehicleFilter, VehicleInput,
        VehicleStatus,
    },
    pagination::PageRequest,
    repository::{DeletePolicy, PostgresRepository, Repository, like_pattern},
};
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

async fn create_test_user(repo: &PostgresRepository, role: Role) -> User {
    let id = Uuid::new_v4();
    repo.create_user(User {
        id,
        email: format!("{}@test.com", id.simple()),
        name: "Integration".to_string(),
        phone: None,
        role,
        is_active: true,
        created_at: Utc::now(),
    })
    .await
    .expect("Failed to create test user")
}

async fn reference(repo: &PostgresRepository, kind: ReferenceKind, make_id: Option<Uuid>) -> Uuid {
    repo.create_reference(
        kind,
        ReferenceInput {
            name: format!("ref-{}", Uuid::new_v4().simple()),
            make_id,
        },
    )
    .await
    .expect("Failed to create reference item")
    .id
}

/// Creates a complete listing and drives it through submission and approval.
async fn approved_vehicle(repo: &PostgresRepository, seller: &User, admin: &User) -> Vehicle {
    let make_id = reference(repo, ReferenceKind::Makes, None).await;
    let input = VehicleInput {
        title: "Integration Hatchback".to_string(),
        model_name: Some("Golf".to_string()),
        make_id: Some(make_id),
        type_id: Some(reference(repo, ReferenceKind::VehicleTypes, None).await),
        fuel_type_id: Some(reference(repo, ReferenceKind::FuelTypes, None).await),
        daily_rate_cents: 5_000,
        images: vec!["https://cdn.example.com/golf.jpg".to_string()],
        ..Default::default()
    };
    let vehicle = repo.create_vehicle(seller.id, input).await.unwrap();
    repo.submit_vehicle(vehicle.id, seller.id).await.unwrap();
    repo.review_vehicle(
        vehicle.id,
        admin.id,
        ReviewRequest {
            status: ReviewDecision::Approved,
            comments: None,
        },
    )
    .await
    .unwrap()
    .vehicle
}

// --- Tests ---

#[test]
fn test_like_pattern_escapes_wildcards() {
    assert_eq!(like_pattern("golf"), "%golf%");
    assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
}

#[tokio::test]
#[ignore]
async fn test_search_treats_wildcards_literally() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let unique = Uuid::new_v4().simple().to_string();
    let name = format!("ref_{}", unique);
    repo.create_reference(ReferenceKind::FuelTypes, ReferenceInput { name: name.clone(), make_id: None })
        .await
        .unwrap();
    repo.create_reference(
        ReferenceKind::FuelTypes,
        ReferenceInput { name: format!("refX{}", unique), make_id: None },
    )
    .await
    .unwrap();

    let filter = ReferenceFilter {
        search: Some(format!("_{}", unique)),
        ..Default::default()
    };
    let page = repo
        .list_reference(ReferenceKind::FuelTypes, &filter, false, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.pagination.total, 1);
    assert_eq!(page.items[0].name, name);
}

#[tokio::test]
#[ignore]
async fn test_duplicate_email_maps_to_email_taken() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let user = create_test_user(&repo, Role::Buyer).await;

    let err = repo
        .create_user(User {
            id: Uuid::new_v4(),
            ..user
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::EmailTaken);
}

#[tokio::test]
#[ignore]
async fn test_vehicle_lifecycle_round_trip() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let seller = create_test_user(&repo, Role::Seller).await;
    let admin = create_test_user(&repo, Role::Admin).await;

    let vehicle = approved_vehicle(&repo, &seller, &admin).await;
    assert_eq!(vehicle.status, VehicleStatus::Approved);
    assert!(vehicle.is_published);
    assert!(vehicle.submitted_at.is_some());

    let approvals = repo.list_approvals(vehicle.id).await.unwrap();
    assert_eq!(approvals.len(), 1);
    assert_eq!(approvals[0].reviewer_id, admin.id);

    assert!(repo.get_public_vehicle(vehicle.id).await.unwrap().is_some());

    // Approved listings are frozen for edits.
    let edit = repo
        .update_vehicle(
            vehicle.id,
            seller.id,
            VehicleInput {
                title: "Changed".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(edit.code(), ErrorCode::InvalidState);

    repo.deactivate_vehicle(vehicle.id, Some(seller.id)).await.unwrap();
    assert!(repo.get_public_vehicle(vehicle.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
async fn test_incomplete_submission_changes_nothing() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let seller = create_test_user(&repo, Role::Seller).await;

    let draft = repo
        .create_vehicle(
            seller.id,
            VehicleInput {
                title: "Bare draft".to_string(),
                daily_rate_cents: 1_000,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = repo.submit_vehicle(draft.id, seller.id).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ValidationFailed);

    let stored = repo.get_vehicle(draft.id).await.unwrap().unwrap();
    assert_eq!(stored.status, VehicleStatus::Draft);
    assert!(stored.submitted_at.is_none());

    let foreign = repo.submit_vehicle(draft.id, Uuid::new_v4()).await.unwrap_err();
    assert_eq!(foreign.code(), ErrorCode::NotFound);
}

#[tokio::test]
#[ignore]
async fn test_public_listing_scope() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let seller = create_test_user(&repo, Role::Seller).await;
    let admin = create_test_user(&repo, Role::Admin).await;
    let vehicle = approved_vehicle(&repo, &seller, &admin).await;

    let filter = VehicleFilter {
        make_id: vehicle.make_id,
        status: Some(VehicleStatus::Draft),
        ..Default::default()
    };
    let page = repo.list_public_vehicles(&filter, PageRequest::default()).await.unwrap();
    assert_eq!(page.pagination.total, 1);
    assert_eq!(page.items[0].id, vehicle.id);
}

#[tokio::test]
#[ignore]
async fn test_reference_delete_guard_and_policies() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let seller = create_test_user(&repo, Role::Seller).await;
    let admin = create_test_user(&repo, Role::Admin).await;
    let vehicle = approved_vehicle(&repo, &seller, &admin).await;
    let fuel = vehicle.fuel_type_id.unwrap();

    for policy in [DeletePolicy::Soft, DeletePolicy::Hard] {
        let err = repo
            .delete_reference(ReferenceKind::FuelTypes, fuel, policy)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InUse);
    }

    let make = reference(&repo, ReferenceKind::Makes, None).await;
    reference(&repo, ReferenceKind::Models, Some(make)).await;
    let err = repo
        .delete_reference(ReferenceKind::Makes, make, DeletePolicy::Soft)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InUse);

    let unused = reference(&repo, ReferenceKind::VehicleTypes, None).await;
    let soft = repo
        .delete_reference(ReferenceKind::VehicleTypes, unused, DeletePolicy::Soft)
        .await
        .unwrap();
    assert!(!soft.is_active);
    let filter = ReferenceFilter::default();
    let active = repo
        .list_reference(ReferenceKind::VehicleTypes, &filter, true, PageRequest::new(Some(1), Some(100)))
        .await
        .unwrap();
    assert!(active.items.iter().all(|i| i.id != unused));

    repo.delete_reference(ReferenceKind::VehicleTypes, unused, DeletePolicy::Hard)
        .await
        .unwrap();
    assert!(repo.get_reference(ReferenceKind::VehicleTypes, unused).await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
async fn test_concurrent_bookings_for_same_dates() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let seller = create_test_user(&repo, Role::Seller).await;
    let admin = create_test_user(&repo, Role::Admin).await;
    let first = create_test_user(&repo, Role::Buyer).await;
    let second = create_test_user(&repo, Role::Buyer).await;
    let vehicle = approved_vehicle(&repo, &seller, &admin).await;

    let today = Utc::now().date_naive();
    let request = || CreateBookingRequest {
        vehicle_id: vehicle.id,
        start_date: today.checked_add_days(Days::new(20)).unwrap(),
        end_date: today.checked_add_days(Days::new(22)).unwrap(),
    };

    let (a, b) = tokio::join!(
        repo.create_booking(first.id, request(), today),
        repo.create_booking(second.id, request(), today),
    );

    // The vehicle row lock serializes the two; exactly one wins.
    assert!(a.is_ok() ^ b.is_ok());
    let loser = a.as_ref().err().or(b.as_ref().err()).unwrap();
    assert_eq!(loser.code(), ErrorCode::Conflict);

    let winner = a.or(b).unwrap();
    assert_eq!(winner.total_cents, 3 * 5_000);

    let confirmed = repo
        .transition_booking(winner.id, seller.id, BookingActor::Seller, BookingStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);

    let err = repo
        .transition_booking(winner.id, winner.buyer_id, BookingActor::Buyer, BookingStatus::Completed)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidState);
}
