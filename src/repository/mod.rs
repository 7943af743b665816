use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::AppResult,
    lifecycle::BookingActor,
    models::{
        AdminDashboardStats, AdminUserUpdate, Approval, Booking, BookingFilter, BookingStatus,
        CreateBookingRequest, PaymentAccount, ReferenceFilter, ReferenceInput, ReferenceItem,
        ReferenceKind, ReviewRequest, ReviewOutcome, UpdateProfileRequest, User, UserFilter,
        Vehicle, VehicleFilter, VehicleInput,
    },
    pagination::{PageRequest, Paginated},
};

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// Builds a substring pattern for `ILIKE ... ESCAPE '\'`, so `%`, `_` and `\` in
/// the search text match literally.
pub fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// DeletePolicy
///
/// How a reference-data row is removed. Both policies refuse to delete a row
/// that vehicles (or, for makes, models) still reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Flip `is_active` to false; the row stays queryable.
    Soft,
    /// Remove the row. Reserved for admin cleanup.
    Hard,
}

impl DeletePolicy {
    /// The policy applied when the caller does not ask for one explicitly.
    pub fn default_for(_kind: ReferenceKind) -> Self {
        DeletePolicy::Soft
    }

    pub fn resolve(kind: ReferenceKind, hard: Option<bool>) -> Self {
        match hard {
            Some(true) => DeletePolicy::Hard,
            Some(false) => DeletePolicy::Soft,
            None => Self::default_for(kind),
        }
    }
}

/// Repository Trait
///
/// The persistence contract used by every handler. Multi-step
/// read-validate-write operations (submit, edit, review, publish, reference
/// delete, booking create and transition) are single trait calls so each
/// implementation can run them atomically.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn create_user(&self, user: User) -> AppResult<User>;
    async fn update_profile(&self, id: Uuid, req: UpdateProfileRequest) -> AppResult<Option<User>>;
    async fn list_users(&self, filter: &UserFilter, page: PageRequest) -> AppResult<Paginated<User>>;
    async fn update_user_admin(&self, id: Uuid, req: AdminUserUpdate) -> AppResult<Option<User>>;

    // --- Vehicles (seller) ---
    async fn create_vehicle(&self, seller_id: Uuid, input: VehicleInput) -> AppResult<Vehicle>;
    async fn get_vehicle(&self, id: Uuid) -> AppResult<Option<Vehicle>>;
    // Owner-only, DRAFT or REJECTED only.
    async fn update_vehicle(&self, id: Uuid, seller_id: Uuid, input: VehicleInput) -> AppResult<Vehicle>;
    // Owner-only; enforces the submission preconditions and stamps `submitted_at`.
    async fn submit_vehicle(&self, id: Uuid, seller_id: Uuid) -> AppResult<Vehicle>;
    async fn set_vehicle_published(&self, id: Uuid, seller_id: Uuid, published: bool) -> AppResult<Vehicle>;
    /// Soft delete. `seller_id = None` is the admin override (no ownership check).
    async fn deactivate_vehicle(&self, id: Uuid, seller_id: Option<Uuid>) -> AppResult<Vehicle>;
    async fn list_seller_vehicles(
        &self,
        seller_id: Uuid,
        filter: &VehicleFilter,
        page: PageRequest,
    ) -> AppResult<Paginated<Vehicle>>;

    // --- Vehicles (public) ---
    async fn list_public_vehicles(&self, filter: &VehicleFilter, page: PageRequest) -> AppResult<Paginated<Vehicle>>;
    async fn get_public_vehicle(&self, id: Uuid) -> AppResult<Option<Vehicle>>;

    // --- Vehicles (admin) ---
    async fn list_all_vehicles(&self, filter: &VehicleFilter, page: PageRequest) -> AppResult<Paginated<Vehicle>>;
    /// Appends the approval and moves the vehicle in one atomic step.
    async fn review_vehicle(&self, id: Uuid, reviewer_id: Uuid, req: ReviewRequest) -> AppResult<ReviewOutcome>;
    /// Newest first.
    async fn list_approvals(&self, vehicle_id: Uuid) -> AppResult<Vec<Approval>>;

    // --- Reference data ---
    async fn list_reference(
        &self,
        kind: ReferenceKind,
        filter: &ReferenceFilter,
        active_only: bool,
        page: PageRequest,
    ) -> AppResult<Paginated<ReferenceItem>>;
    async fn get_reference(&self, kind: ReferenceKind, id: Uuid) -> AppResult<Option<ReferenceItem>>;
    async fn create_reference(&self, kind: ReferenceKind, input: ReferenceInput) -> AppResult<ReferenceItem>;
    async fn update_reference(
        &self,
        kind: ReferenceKind,
        id: Uuid,
        input: ReferenceInput,
    ) -> AppResult<Option<ReferenceItem>>;
    async fn delete_reference(
        &self,
        kind: ReferenceKind,
        id: Uuid,
        policy: DeletePolicy,
    ) -> AppResult<ReferenceItem>;

    // --- Bookings ---
    async fn create_booking(&self, buyer_id: Uuid, req: CreateBookingRequest, today: NaiveDate) -> AppResult<Booking>;
    async fn list_buyer_bookings(
        &self,
        buyer_id: Uuid,
        filter: &BookingFilter,
        page: PageRequest,
    ) -> AppResult<Paginated<Booking>>;
    async fn list_seller_bookings(
        &self,
        seller_id: Uuid,
        filter: &BookingFilter,
        page: PageRequest,
    ) -> AppResult<Paginated<Booking>>;
    /// `actor_id` must be the booking's buyer or seller, matching `actor`.
    async fn transition_booking(
        &self,
        id: Uuid,
        actor_id: Uuid,
        actor: BookingActor,
        to: BookingStatus,
    ) -> AppResult<Booking>;

    // --- Payment accounts ---
    async fn get_payment_account(&self, user_id: Uuid) -> AppResult<Option<PaymentAccount>>;
    async fn save_payment_account(&self, account: PaymentAccount) -> AppResult<PaymentAccount>;

    // --- Admin dashboard ---
    async fn get_stats(&self) -> AppResult<AdminDashboardStats>;
}

/// RepositoryState
///
/// The shared handle to the persistence layer held in `AppState`.
pub type RepositoryState = Arc<dyn Repository>;

/// Number of recent users/vehicles on the admin dashboard.
pub const RECENT_LIMIT: usize = 5;
