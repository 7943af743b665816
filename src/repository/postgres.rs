use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::{DeletePolicy, RECENT_LIMIT, Repository, like_pattern};
use crate::{
    error::{AppError, AppResult, not_found},
    lifecycle::{self, BookingActor},
    models::{
        AdminDashboardStats, AdminUserUpdate, Approval, Booking, BookingFilter, BookingStatus,
        CreateBookingRequest, PaymentAccount, ReferenceFilter, ReferenceInput, ReferenceItem,
        ReferenceKind, ReviewOutcome, ReviewRequest, UpdateProfileRequest, User, UserFilter,
        Vehicle, VehicleFilter, VehicleInput, VehicleStatus,
    },
    pagination::{PageRequest, Paginated},
};

const USER_COLUMNS: &str = "id, email, name, phone, role, is_active, created_at";

const VEHICLE_COLUMNS: &str = "id, seller_id, status, title, description, model_name, model_id, \
    make_id, type_id, fuel_type_id, year, seats, daily_rate_cents, location, images, \
    is_active, is_published, submitted_at, created_at, updated_at";

const BOOKING_COLUMNS: &str = "id, vehicle_id, buyer_id, seller_id, start_date, end_date, \
    total_cents, status, created_at, updated_at";

/// Only models carry a make; the other tables project a NULL so every kind
/// decodes into `ReferenceItem`.
fn reference_columns(kind: ReferenceKind) -> &'static str {
    match kind {
        ReferenceKind::Models => "id, name, make_id, is_active, created_at, updated_at",
        _ => "id, name, NULL::uuid AS make_id, is_active, created_at, updated_at",
    }
}

/// Which slice of the vehicles table a listing may see.
#[derive(Clone, Copy)]
enum VehicleScope {
    Public,
    Seller(Uuid),
    Admin,
}

fn push_vehicle_conditions(
    builder: &mut QueryBuilder<'_, Postgres>,
    scope: VehicleScope,
    filter: &VehicleFilter,
) {
    builder.push(" WHERE 1 = 1");
    match scope {
        VehicleScope::Public => {
            builder.push(" AND status = ");
            builder.push_bind(VehicleStatus::Approved);
            builder.push(" AND is_active = true AND is_published = true");
        }
        VehicleScope::Seller(seller_id) => {
            builder.push(" AND seller_id = ");
            builder.push_bind(seller_id);
            if !filter.include_inactive.unwrap_or(false) {
                builder.push(" AND is_active = true");
            }
        }
        VehicleScope::Admin => {
            if !filter.include_inactive.unwrap_or(true) {
                builder.push(" AND is_active = true");
            }
        }
    }

    if let (Some(status), false) = (filter.status, matches!(scope, VehicleScope::Public)) {
        builder.push(" AND status = ");
        builder.push_bind(status);
    }
    if let Some(make_id) = filter.make_id {
        builder.push(" AND make_id = ");
        builder.push_bind(make_id);
    }
    if let Some(type_id) = filter.type_id {
        builder.push(" AND type_id = ");
        builder.push_bind(type_id);
    }
    if let Some(fuel_type_id) = filter.fuel_type_id {
        builder.push(" AND fuel_type_id = ");
        builder.push_bind(fuel_type_id);
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = like_pattern(search);
        builder.push(" AND (title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" ESCAPE '\\' OR model_name ILIKE ");
        builder.push_bind(pattern);
        builder.push(" ESCAPE '\\')");
    }
}

fn push_page(builder: &mut QueryBuilder<'_, Postgres>, page: PageRequest) {
    builder.push(" LIMIT ");
    builder.push_bind(page.limit);
    builder.push(" OFFSET ");
    builder.push_bind(page.offset());
}

/// PostgresRepository
///
/// The production `Repository`, backed by a `PgPool`. Every read-validate-write
/// sequence runs inside one transaction holding a `FOR UPDATE` lock on the row.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn list_vehicles(
        &self,
        scope: VehicleScope,
        filter: &VehicleFilter,
        page: PageRequest,
    ) -> AppResult<Paginated<Vehicle>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM vehicles");
        push_vehicle_conditions(&mut count, scope, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM vehicles", VEHICLE_COLUMNS));
        push_vehicle_conditions(&mut select, scope, filter);
        select.push(" ORDER BY created_at DESC");
        push_page(&mut select, page);
        let items = select.build_query_as::<Vehicle>().fetch_all(&self.pool).await?;

        Ok(Paginated::new(items, page, total))
    }

    async fn list_bookings(
        &self,
        party_column: &'static str,
        party_id: Uuid,
        filter: &BookingFilter,
        page: PageRequest,
    ) -> AppResult<Paginated<Booking>> {
        let push_conditions = |builder: &mut QueryBuilder<'_, Postgres>| {
            builder.push(format!(" WHERE {} = ", party_column));
            builder.push_bind(party_id);
            if let Some(status) = filter.status {
                builder.push(" AND status = ");
                builder.push_bind(status);
            }
        };

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM bookings");
        push_conditions(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM bookings", BOOKING_COLUMNS));
        push_conditions(&mut select);
        select.push(" ORDER BY start_date DESC, created_at DESC");
        push_page(&mut select, page);
        let items = select.build_query_as::<Booking>().fetch_all(&self.pool).await?;

        Ok(Paginated::new(items, page, total))
    }
}

/// Loads a vehicle and holds its row lock until the transaction ends.
async fn lock_vehicle(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<Option<Vehicle>, sqlx::Error> {
    sqlx::query_as::<_, Vehicle>(&format!(
        "SELECT {} FROM vehicles WHERE id = $1 FOR UPDATE",
        VEHICLE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM profiles WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM profiles WHERE lower(email) = lower($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, user: User) -> AppResult<User> {
        let created = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO profiles (id, email, name, phone, role, is_active, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user.id)
        .bind(user.email)
        .bind(user.name)
        .bind(user.phone)
        .bind(user.role)
        .bind(user.is_active)
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::EmailTaken,
            other => AppError::Database(other),
        })?;
        Ok(created)
    }

    async fn update_profile(&self, id: Uuid, req: UpdateProfileRequest) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE profiles SET name = COALESCE($2, name), phone = COALESCE($3, phone) \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(req.name)
        .bind(req.phone)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_users(&self, filter: &UserFilter, page: PageRequest) -> AppResult<Paginated<User>> {
        let push_conditions = |builder: &mut QueryBuilder<'_, Postgres>| {
            builder.push(" WHERE 1 = 1");
            if let Some(role) = filter.role {
                builder.push(" AND role = ");
                builder.push_bind(role);
            }
            if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                let pattern = like_pattern(search);
                builder.push(" AND (email ILIKE ");
                builder.push_bind(pattern.clone());
                builder.push(" ESCAPE '\\' OR name ILIKE ");
                builder.push_bind(pattern);
                builder.push(" ESCAPE '\\')");
            }
        };

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM profiles");
        push_conditions(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM profiles", USER_COLUMNS));
        push_conditions(&mut select);
        select.push(" ORDER BY created_at DESC");
        push_page(&mut select, page);
        let items = select.build_query_as::<User>().fetch_all(&self.pool).await?;

        Ok(Paginated::new(items, page, total))
    }

    async fn update_user_admin(&self, id: Uuid, req: AdminUserUpdate) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE profiles SET role = COALESCE($2, role), is_active = COALESCE($3, is_active) \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(req.role)
        .bind(req.is_active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    // --- VEHICLES (SELLER) ---

    /// New listings always start as an inactive-for-public DRAFT.
    async fn create_vehicle(&self, seller_id: Uuid, input: VehicleInput) -> AppResult<Vehicle> {
        let now = Utc::now();
        let vehicle = sqlx::query_as::<_, Vehicle>(&format!(
            "INSERT INTO vehicles (id, seller_id, status, title, description, model_name, model_id, \
             make_id, type_id, fuel_type_id, year, seats, daily_rate_cents, location, images, \
             is_active, is_published, submitted_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, true, false, NULL, $16, $16) \
             RETURNING {}",
            VEHICLE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(seller_id)
        .bind(VehicleStatus::Draft)
        .bind(input.title.trim().to_string())
        .bind(input.description)
        .bind(input.model_name)
        .bind(input.model_id)
        .bind(input.make_id)
        .bind(input.type_id)
        .bind(input.fuel_type_id)
        .bind(input.year)
        .bind(input.seats)
        .bind(input.daily_rate_cents)
        .bind(input.location)
        .bind(input.images)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(vehicle)
    }

    async fn get_vehicle(&self, id: Uuid) -> AppResult<Option<Vehicle>> {
        let vehicle = sqlx::query_as::<_, Vehicle>(&format!("SELECT {} FROM vehicles WHERE id = $1", VEHICLE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(vehicle)
    }

    async fn update_vehicle(&self, id: Uuid, seller_id: Uuid, input: VehicleInput) -> AppResult<Vehicle> {
        let mut tx = self.pool.begin().await?;
        let vehicle = lifecycle::owned_by(lock_vehicle(&mut tx, id).await?, seller_id)?;
        lifecycle::check_editable(&vehicle)?;

        let updated = sqlx::query_as::<_, Vehicle>(&format!(
            "UPDATE vehicles SET title = $2, description = $3, model_name = $4, model_id = $5, \
             make_id = $6, type_id = $7, fuel_type_id = $8, year = $9, seats = $10, \
             daily_rate_cents = $11, location = $12, images = $13, updated_at = $14 \
             WHERE id = $1 RETURNING {}",
            VEHICLE_COLUMNS
        ))
        .bind(id)
        .bind(input.title.trim().to_string())
        .bind(input.description)
        .bind(input.model_name)
        .bind(input.model_id)
        .bind(input.make_id)
        .bind(input.type_id)
        .bind(input.fuel_type_id)
        .bind(input.year)
        .bind(input.seats)
        .bind(input.daily_rate_cents)
        .bind(input.location)
        .bind(input.images)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// submit_vehicle
    ///
    /// Lock, check ownership, check preconditions, then a single UPDATE. Any failed
    /// check drops the transaction without writing.
    async fn submit_vehicle(&self, id: Uuid, seller_id: Uuid) -> AppResult<Vehicle> {
        let mut tx = self.pool.begin().await?;
        let vehicle = lifecycle::owned_by(lock_vehicle(&mut tx, id).await?, seller_id)?;
        lifecycle::check_submission(&vehicle)?;

        let updated = sqlx::query_as::<_, Vehicle>(&format!(
            "UPDATE vehicles SET status = $2, submitted_at = $3, updated_at = $3 WHERE id = $1 RETURNING {}",
            VEHICLE_COLUMNS
        ))
        .bind(id)
        .bind(VehicleStatus::Pending)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(vehicle_id = %id, seller_id = %seller_id, "vehicle submitted for review");
        Ok(updated)
    }

    async fn set_vehicle_published(&self, id: Uuid, seller_id: Uuid, published: bool) -> AppResult<Vehicle> {
        let mut tx = self.pool.begin().await?;
        let vehicle = lifecycle::owned_by(lock_vehicle(&mut tx, id).await?, seller_id)?;
        lifecycle::check_publish(&vehicle)?;

        let updated = sqlx::query_as::<_, Vehicle>(&format!(
            "UPDATE vehicles SET is_published = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
            VEHICLE_COLUMNS
        ))
        .bind(id)
        .bind(published)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn deactivate_vehicle(&self, id: Uuid, seller_id: Option<Uuid>) -> AppResult<Vehicle> {
        let mut tx = self.pool.begin().await?;
        let current = lock_vehicle(&mut tx, id).await?;
        match seller_id {
            Some(owner) => {
                lifecycle::owned_by(current, owner)?;
            }
            None => {
                current.ok_or_else(|| not_found("Vehicle"))?;
            }
        }

        let updated = sqlx::query_as::<_, Vehicle>(&format!(
            "UPDATE vehicles SET is_active = false, is_published = false, updated_at = $2 \
             WHERE id = $1 RETURNING {}",
            VEHICLE_COLUMNS
        ))
        .bind(id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn list_seller_vehicles(
        &self,
        seller_id: Uuid,
        filter: &VehicleFilter,
        page: PageRequest,
    ) -> AppResult<Paginated<Vehicle>> {
        self.list_vehicles(VehicleScope::Seller(seller_id), filter, page).await
    }

    // --- VEHICLES (PUBLIC) ---

    async fn list_public_vehicles(&self, filter: &VehicleFilter, page: PageRequest) -> AppResult<Paginated<Vehicle>> {
        self.list_vehicles(VehicleScope::Public, filter, page).await
    }

    /// Enforces APPROVED + active + published in the query itself.
    async fn get_public_vehicle(&self, id: Uuid) -> AppResult<Option<Vehicle>> {
        let vehicle = sqlx::query_as::<_, Vehicle>(&format!(
            "SELECT {} FROM vehicles WHERE id = $1 AND status = $2 AND is_active = true AND is_published = true",
            VEHICLE_COLUMNS
        ))
        .bind(id)
        .bind(VehicleStatus::Approved)
        .fetch_optional(&self.pool)
        .await?;
        Ok(vehicle)
    }

    // --- VEHICLES (ADMIN) ---

    async fn list_all_vehicles(&self, filter: &VehicleFilter, page: PageRequest) -> AppResult<Paginated<Vehicle>> {
        self.list_vehicles(VehicleScope::Admin, filter, page).await
    }

    /// review_vehicle
    ///
    /// The approval insert and the status update commit together, so the vehicle's
    /// status always mirrors its newest approval.
    async fn review_vehicle(&self, id: Uuid, reviewer_id: Uuid, req: ReviewRequest) -> AppResult<ReviewOutcome> {
        let mut tx = self.pool.begin().await?;
        let vehicle = lock_vehicle(&mut tx, id).await?.ok_or_else(|| not_found("Vehicle"))?;
        lifecycle::check_review(&vehicle, req.status)?;

        let now = Utc::now();
        let approval = sqlx::query_as::<_, Approval>(
            "INSERT INTO approvals (id, vehicle_id, reviewer_id, status, comments, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, vehicle_id, reviewer_id, status, comments, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(id)
        .bind(reviewer_id)
        .bind(req.status)
        .bind(req.comments)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let mut reviewed = vehicle;
        lifecycle::apply_review(&mut reviewed, req.status, now);
        let vehicle = sqlx::query_as::<_, Vehicle>(&format!(
            "UPDATE vehicles SET status = $2, is_published = $3, updated_at = $4 WHERE id = $1 RETURNING {}",
            VEHICLE_COLUMNS
        ))
        .bind(id)
        .bind(reviewed.status)
        .bind(reviewed.is_published)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(vehicle_id = %id, reviewer_id = %reviewer_id, decision = ?req.status, "vehicle reviewed");
        Ok(ReviewOutcome { vehicle, approval })
    }

    async fn list_approvals(&self, vehicle_id: Uuid) -> AppResult<Vec<Approval>> {
        let approvals = sqlx::query_as::<_, Approval>(
            "SELECT id, vehicle_id, reviewer_id, status, comments, created_at \
             FROM approvals WHERE vehicle_id = $1 ORDER BY created_at DESC",
        )
        .bind(vehicle_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(approvals)
    }

    // --- REFERENCE DATA ---

    async fn list_reference(
        &self,
        kind: ReferenceKind,
        filter: &ReferenceFilter,
        active_only: bool,
        page: PageRequest,
    ) -> AppResult<Paginated<ReferenceItem>> {
        let push_conditions = |builder: &mut QueryBuilder<'_, Postgres>| {
            builder.push(" WHERE 1 = 1");
            if active_only {
                builder.push(" AND is_active = true");
            }
            if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                builder.push(" AND name ILIKE ");
                builder.push_bind(like_pattern(search));
                builder.push(" ESCAPE '\\'");
            }
            if let (ReferenceKind::Models, Some(make_id)) = (kind, filter.make_id) {
                builder.push(" AND make_id = ");
                builder.push_bind(make_id);
            }
        };

        let mut count = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) FROM {}", kind.table()));
        push_conditions(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM {}",
            reference_columns(kind),
            kind.table()
        ));
        push_conditions(&mut select);
        select.push(" ORDER BY name ASC, created_at ASC");
        push_page(&mut select, page);
        let items = select.build_query_as::<ReferenceItem>().fetch_all(&self.pool).await?;

        Ok(Paginated::new(items, page, total))
    }

    async fn get_reference(&self, kind: ReferenceKind, id: Uuid) -> AppResult<Option<ReferenceItem>> {
        let item = sqlx::query_as::<_, ReferenceItem>(&format!(
            "SELECT {} FROM {} WHERE id = $1",
            reference_columns(kind),
            kind.table()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    async fn create_reference(&self, kind: ReferenceKind, input: ReferenceInput) -> AppResult<ReferenceItem> {
        let now = Utc::now();
        let name = input.name.trim().to_string();
        let item = match kind {
            ReferenceKind::Models => {
                sqlx::query_as::<_, ReferenceItem>(&format!(
                    "INSERT INTO {} (id, name, make_id, is_active, created_at, updated_at) \
                     VALUES ($1, $2, $3, true, $4, $4) RETURNING {}",
                    kind.table(),
                    reference_columns(kind)
                ))
                .bind(Uuid::new_v4())
                .bind(name)
                .bind(input.make_id)
                .bind(now)
                .fetch_one(&self.pool)
                .await?
            }
            _ => {
                sqlx::query_as::<_, ReferenceItem>(&format!(
                    "INSERT INTO {} (id, name, is_active, created_at, updated_at) \
                     VALUES ($1, $2, true, $3, $3) RETURNING {}",
                    kind.table(),
                    reference_columns(kind)
                ))
                .bind(Uuid::new_v4())
                .bind(name)
                .bind(now)
                .fetch_one(&self.pool)
                .await?
            }
        };
        Ok(item)
    }

    async fn update_reference(
        &self,
        kind: ReferenceKind,
        id: Uuid,
        input: ReferenceInput,
    ) -> AppResult<Option<ReferenceItem>> {
        let now = Utc::now();
        let name = input.name.trim().to_string();
        let item = match kind {
            ReferenceKind::Models => {
                sqlx::query_as::<_, ReferenceItem>(&format!(
                    "UPDATE {} SET name = $2, make_id = COALESCE($3, make_id), updated_at = $4 \
                     WHERE id = $1 RETURNING {}",
                    kind.table(),
                    reference_columns(kind)
                ))
                .bind(id)
                .bind(name)
                .bind(input.make_id)
                .bind(now)
                .fetch_optional(&self.pool)
                .await?
            }
            _ => {
                sqlx::query_as::<_, ReferenceItem>(&format!(
                    "UPDATE {} SET name = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
                    kind.table(),
                    reference_columns(kind)
                ))
                .bind(id)
                .bind(name)
                .bind(now)
                .fetch_optional(&self.pool)
                .await?
            }
        };
        Ok(item)
    }

    /// delete_reference
    ///
    /// Locks the row, counts references, and only then applies the policy.
    async fn delete_reference(
        &self,
        kind: ReferenceKind,
        id: Uuid,
        policy: DeletePolicy,
    ) -> AppResult<ReferenceItem> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_as::<_, ReferenceItem>(&format!(
            "SELECT {} FROM {} WHERE id = $1 FOR UPDATE",
            reference_columns(kind),
            kind.table()
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| not_found(kind.label()))?;

        let mut usage: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM vehicles WHERE {} = $1",
            kind.vehicle_column()
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if kind == ReferenceKind::Makes {
            let models: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vehicle_models WHERE make_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
            usage += models;
        }
        if usage > 0 {
            return Err(AppError::InUse(format!(
                "{} is referenced by {} record(s) and cannot be deleted",
                kind.label(),
                usage
            )));
        }

        let sql = match policy {
            DeletePolicy::Soft => format!(
                "UPDATE {} SET is_active = false, updated_at = NOW() WHERE id = $1 RETURNING {}",
                kind.table(),
                reference_columns(kind)
            ),
            DeletePolicy::Hard => format!(
                "DELETE FROM {} WHERE id = $1 RETURNING {}",
                kind.table(),
                reference_columns(kind)
            ),
        };
        let item = sqlx::query_as::<_, ReferenceItem>(&sql)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(kind = ?kind, id = %id, policy = ?policy, "reference item deleted");
        Ok(item)
    }

    // --- BOOKINGS ---

    /// create_booking
    ///
    /// The vehicle row lock serialises concurrent bookings of the same vehicle, so the
    /// overlap check and the insert cannot interleave.
    async fn create_booking(&self, buyer_id: Uuid, req: CreateBookingRequest, today: NaiveDate) -> AppResult<Booking> {
        let mut tx = self.pool.begin().await?;
        let vehicle = lock_vehicle(&mut tx, req.vehicle_id)
            .await?
            .filter(Vehicle::is_publicly_visible)
            .ok_or_else(|| not_found("Vehicle"))?;
        if vehicle.seller_id == buyer_id {
            return Err(AppError::Validation("You cannot book your own vehicle".into()));
        }

        let days = lifecycle::booking_days(req.start_date, req.end_date, today)?;
        let total = lifecycle::booking_total(days, vehicle.daily_rate_cents)?;

        let overlapping: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM bookings WHERE vehicle_id = $1 \
             AND status IN ('PENDING', 'CONFIRMED') AND start_date <= $3 AND $2 <= end_date)",
        )
        .bind(vehicle.id)
        .bind(req.start_date)
        .bind(req.end_date)
        .fetch_one(&mut *tx)
        .await?;
        if overlapping {
            return Err(AppError::Conflict(
                "Vehicle is already booked for the selected dates".into(),
            ));
        }

        let now = Utc::now();
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "INSERT INTO bookings (id, vehicle_id, buyer_id, seller_id, start_date, end_date, \
             total_cents, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9) RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(vehicle.id)
        .bind(buyer_id)
        .bind(vehicle.seller_id)
        .bind(req.start_date)
        .bind(req.end_date)
        .bind(total)
        .bind(BookingStatus::Pending)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(booking)
    }

    async fn list_buyer_bookings(
        &self,
        buyer_id: Uuid,
        filter: &BookingFilter,
        page: PageRequest,
    ) -> AppResult<Paginated<Booking>> {
        self.list_bookings("buyer_id", buyer_id, filter, page).await
    }

    async fn list_seller_bookings(
        &self,
        seller_id: Uuid,
        filter: &BookingFilter,
        page: PageRequest,
    ) -> AppResult<Paginated<Booking>> {
        self.list_bookings("seller_id", seller_id, filter, page).await
    }

    async fn transition_booking(
        &self,
        id: Uuid,
        actor_id: Uuid,
        actor: BookingActor,
        to: BookingStatus,
    ) -> AppResult<Booking> {
        let mut tx = self.pool.begin().await?;
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings WHERE id = $1 FOR UPDATE",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .filter(|b| match actor {
            BookingActor::Buyer => b.buyer_id == actor_id,
            BookingActor::Seller => b.seller_id == actor_id,
        })
        .ok_or_else(|| not_found("Booking"))?;

        lifecycle::check_booking_transition(booking.status, to, actor)?;

        let updated = sqlx::query_as::<_, Booking>(&format!(
            "UPDATE bookings SET status = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .bind(to)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    // --- PAYMENT ACCOUNTS ---

    async fn get_payment_account(&self, user_id: Uuid) -> AppResult<Option<PaymentAccount>> {
        let account = sqlx::query_as::<_, PaymentAccount>(
            "SELECT user_id, account_id, details_submitted, charges_enabled, payouts_enabled, updated_at \
             FROM payment_accounts WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn save_payment_account(&self, account: PaymentAccount) -> AppResult<PaymentAccount> {
        let saved = sqlx::query_as::<_, PaymentAccount>(
            "INSERT INTO payment_accounts (user_id, account_id, details_submitted, charges_enabled, payouts_enabled, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (user_id) DO UPDATE SET account_id = EXCLUDED.account_id, \
                 details_submitted = EXCLUDED.details_submitted, \
                 charges_enabled = EXCLUDED.charges_enabled, \
                 payouts_enabled = EXCLUDED.payouts_enabled, \
                 updated_at = EXCLUDED.updated_at \
             RETURNING user_id, account_id, details_submitted, charges_enabled, payouts_enabled, updated_at",
        )
        .bind(account.user_id)
        .bind(account.account_id)
        .bind(account.details_submitted)
        .bind(account.charges_enabled)
        .bind(account.payouts_enabled)
        .bind(account.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(saved)
    }

    // --- ADMIN DASHBOARD ---

    async fn get_stats(&self) -> AppResult<AdminDashboardStats> {
        let (total_users, total_buyers, total_sellers): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE role = 'BUYER'), COUNT(*) FILTER (WHERE role = 'SELLER') \
             FROM profiles",
        )
        .fetch_one(&self.pool)
        .await?;

        let (total_vehicles, pending_vehicles, approved_vehicles): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE status = 'PENDING'), COUNT(*) FILTER (WHERE status = 'APPROVED') \
             FROM vehicles WHERE is_active = true",
        )
        .fetch_one(&self.pool)
        .await?;

        let total_bookings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings")
            .fetch_one(&self.pool)
            .await?;

        let recent_users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM profiles ORDER BY created_at DESC LIMIT $1",
            USER_COLUMNS
        ))
        .bind(RECENT_LIMIT as i64)
        .fetch_all(&self.pool)
        .await?;

        let recent_vehicles = sqlx::query_as::<_, Vehicle>(&format!(
            "SELECT {} FROM vehicles ORDER BY created_at DESC LIMIT $1",
            VEHICLE_COLUMNS
        ))
        .bind(RECENT_LIMIT as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(AdminDashboardStats {
            total_users,
            total_buyers,
            total_sellers,
            total_vehicles,
            pending_vehicles,
            approved_vehicles,
            total_bookings,
            recent_users,
            recent_vehicles,
        })
    }
}
