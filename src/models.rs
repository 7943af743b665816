use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

// --- Enumerations (Mapped to Postgres enum types) ---

/// Role
///
/// The RBAC field of a profile. Maps to the `user_role` Postgres enum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum Role {
    #[default]
    Buyer,
    Seller,
    Admin,
}

/// VehicleStatus
///
/// Listing lifecycle: DRAFT -> PENDING -> APPROVED | REJECTED, REJECTED -> PENDING.
/// The transition rules live in `crate::lifecycle`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[sqlx(type_name = "vehicle_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum VehicleStatus {
    #[default]
    Draft,
    Pending,
    Approved,
    Rejected,
}

/// ReviewDecision
///
/// The outcome an admin records on a PENDING vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type)]
#[sqlx(type_name = "review_decision", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl ReviewDecision {
    /// The vehicle status a decision moves the listing to.
    pub fn resulting_status(self) -> VehicleStatus {
        match self {
            ReviewDecision::Approved => VehicleStatus::Approved,
            ReviewDecision::Rejected => VehicleStatus::Rejected,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[sqlx(type_name = "booking_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

/// ReferenceKind
///
/// The four reference-data resources. The serde names double as the URL
/// segment under `/api/admin/{resource}` and `/api/reference/{resource}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum ReferenceKind {
    Makes,
    Models,
    VehicleTypes,
    FuelTypes,
}

impl ReferenceKind {
    pub const ALL: [ReferenceKind; 4] = [
        ReferenceKind::Makes,
        ReferenceKind::Models,
        ReferenceKind::VehicleTypes,
        ReferenceKind::FuelTypes,
    ];

    /// Backing table. Only ever interpolated from this fixed set.
    pub fn table(self) -> &'static str {
        match self {
            ReferenceKind::Makes => "vehicle_makes",
            ReferenceKind::Models => "vehicle_models",
            ReferenceKind::VehicleTypes => "vehicle_types",
            ReferenceKind::FuelTypes => "fuel_types",
        }
    }

    /// Column on `vehicles` that references this kind.
    pub fn vehicle_column(self) -> &'static str {
        match self {
            ReferenceKind::Makes => "make_id",
            ReferenceKind::Models => "model_id",
            ReferenceKind::VehicleTypes => "type_id",
            ReferenceKind::FuelTypes => "fuel_type_id",
        }
    }

    /// Human-readable singular label used in error messages.
    pub fn label(self) -> &'static str {
        match self {
            ReferenceKind::Makes => "Make",
            ReferenceKind::Models => "Model",
            ReferenceKind::VehicleTypes => "Vehicle type",
            ReferenceKind::FuelTypes => "Fuel type",
        }
    }
}

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The profile record in `profiles`. `id` mirrors the identity provider's user id.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: Role,
    // Deactivated users are rejected by the session guard.
    pub is_active: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Vehicle
///
/// A listing in `vehicles`. Visible to the public only when APPROVED, active and published.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Vehicle {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub status: VehicleStatus,
    pub title: String,
    pub description: Option<String>,
    pub model_name: Option<String>,
    pub model_id: Option<Uuid>,
    pub make_id: Option<Uuid>,
    pub type_id: Option<Uuid>,
    pub fuel_type_id: Option<Uuid>,
    pub year: Option<i32>,
    pub seats: Option<i32>,
    pub daily_rate_cents: i64,
    pub location: Option<String>,
    // Ordered; the first image is the cover.
    pub images: Vec<String>,
    pub is_active: bool,
    pub is_published: bool,
    #[ts(type = "string | null")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Vehicle {
    pub fn is_publicly_visible(&self) -> bool {
        self.status == VehicleStatus::Approved && self.is_active && self.is_published
    }
}

/// Approval
///
/// One admin review of a vehicle. Append-only; the newest row is the current one.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Approval {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub reviewer_id: Uuid,
    pub status: ReviewDecision,
    pub comments: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// ReferenceItem
///
/// A make, model, vehicle type or fuel type. `make_id` is only set for models.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReferenceItem {
    pub id: Uuid,
    pub name: String,
    pub make_id: Option<Uuid>,
    pub is_active: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Booking
///
/// A rental of a vehicle for an inclusive date range. `seller_id` is copied from
/// the vehicle at creation so seller listings need no join.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Booking {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    #[ts(type = "string")]
    pub start_date: NaiveDate,
    #[ts(type = "string")]
    pub end_date: NaiveDate,
    pub total_cents: i64,
    pub status: BookingStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// PaymentAccount
///
/// The seller's connected account at the payment processor. Links are never stored here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentAccount {
    pub user_id: Uuid,
    pub account_id: String,
    pub details_submitted: bool,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
    pub updated_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// SignupRequest
///
/// Input for POST /api/auth/signup. The password is forwarded to the identity
/// provider and never stored or logged here.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SignupRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
    #[validate(custom = "not_blank")]
    pub name: String,
    pub phone: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateProfileRequest {
    #[validate(custom = "not_blank")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// AdminUserUpdate
///
/// Moderation payload for PATCH /api/admin/users/{id}.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AdminUserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// VehicleInput
///
/// Full listing payload for create (POST /api/vehicles) and edit (PUT /api/vehicles/{id}).
/// Draft listings may leave the categorisation fields empty; they are enforced at submission.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct VehicleInput {
    #[validate(custom = "not_blank")]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub model_id: Option<Uuid>,
    #[serde(default)]
    pub make_id: Option<Uuid>,
    #[serde(default)]
    pub type_id: Option<Uuid>,
    #[serde(default)]
    pub fuel_type_id: Option<Uuid>,
    #[validate(range(min = 1900, max = 2100))]
    #[serde(default)]
    pub year: Option<i32>,
    #[validate(range(min = 1, max = 100))]
    #[serde(default)]
    pub seats: Option<i32>,
    #[validate(range(min = 0))]
    pub daily_rate_cents: i64,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl VehicleInput {
    /// Runs field validation plus the image URL check.
    pub fn check(&self) -> Result<(), crate::error::AppError> {
        self.validate()?;
        if let Some(bad) = self
            .images
            .iter()
            .find(|url| !(url.starts_with("http://") || url.starts_with("https://")))
        {
            return Err(crate::error::AppError::Validation(format!(
                "Image URL must be absolute http(s): {}",
                bad
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PublishRequest {
    pub is_published: bool,
}

/// ReviewRequest
///
/// Admin decision on a PENDING vehicle (POST /api/admin/vehicles/{id}/review).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReviewRequest {
    pub status: ReviewDecision,
    #[serde(default)]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReferenceInput {
    #[validate(custom = "not_blank")]
    pub name: String,
    // Required for models, ignored for the other kinds.
    #[serde(default)]
    pub make_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateBookingRequest {
    pub vehicle_id: Uuid,
    #[ts(type = "string")]
    pub start_date: NaiveDate,
    #[ts(type = "string")]
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BookingStatusUpdate {
    pub status: BookingStatus,
}

// --- Query Parameters ---

/// VehicleFilter
///
/// Query parameters shared by the public, seller and admin vehicle listings.
/// Each listing ignores the fields that do not apply to it.
#[derive(Debug, Clone, Deserialize, Default, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct VehicleFilter {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<VehicleStatus>,
    pub search: Option<String>,
    pub make_id: Option<Uuid>,
    pub type_id: Option<Uuid>,
    pub fuel_type_id: Option<Uuid>,
    pub include_inactive: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ReferenceFilter {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub make_id: Option<Uuid>,
    pub include_inactive: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct DeleteOptions {
    /// Remove the row instead of flagging it inactive.
    pub hard: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserFilter {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Deserialize, Default, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BookingFilter {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<BookingStatus>,
}

// --- Output Schemas ---

/// VehicleDetail
///
/// A vehicle with its review history, newest approval first.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct VehicleDetail {
    pub vehicle: Vehicle,
    pub current_approval: Option<Approval>,
    pub approvals: Vec<Approval>,
}

/// ReviewOutcome
///
/// Result of an admin review: the updated vehicle and the appended approval record.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReviewOutcome {
    pub vehicle: Vehicle,
    pub approval: Approval,
}

/// AdminDashboardStats
///
/// Output schema for GET /api/admin/stats.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AdminDashboardStats {
    pub total_users: i64,
    pub total_buyers: i64,
    pub total_sellers: i64,
    pub total_vehicles: i64,
    pub pending_vehicles: i64,
    pub approved_vehicles: i64,
    pub total_bookings: i64,
    pub recent_users: Vec<User>,
    pub recent_vehicles: Vec<Vehicle>,
}

/// ConnectStatus
///
/// Connected-account state surfaced to the seller dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ConnectStatus {
    pub has_account: bool,
    pub details_submitted: bool,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
}

impl From<Option<&PaymentAccount>> for ConnectStatus {
    fn from(account: Option<&PaymentAccount>) -> Self {
        match account {
            Some(a) => ConnectStatus {
                has_account: true,
                details_submitted: a.details_submitted,
                charges_enabled: a.charges_enabled,
                payouts_enabled: a.payouts_enabled,
            },
            None => ConnectStatus::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LinkResponse {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PaymentConfigResponse {
    pub publishable_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UploadResponse {
    pub url: String,
    pub key: String,
}
