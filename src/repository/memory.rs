use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};
use uuid::Uuid;

use super::{DeletePolicy, RECENT_LIMIT, Repository};
use crate::{
    error::{AppError, AppResult, not_found},
    lifecycle::{self, BookingActor},
    models::{
        AdminDashboardStats, AdminUserUpdate, Approval, Booking, BookingFilter, BookingStatus,
        CreateBookingRequest, PaymentAccount, ReferenceFilter, ReferenceInput, ReferenceItem,
        ReferenceKind, ReviewOutcome, ReviewRequest, Role, UpdateProfileRequest, User, UserFilter,
        Vehicle, VehicleFilter, VehicleInput, VehicleStatus,
    },
    pagination::{PageRequest, Paginated},
};

#[derive(Default)]
struct Store {
    users: Vec<User>,
    vehicles: Vec<Vehicle>,
    approvals: Vec<Approval>,
    reference: HashMap<ReferenceKind, Vec<ReferenceItem>>,
    bookings: Vec<Booking>,
    payment_accounts: HashMap<Uuid, PaymentAccount>,
}

impl Store {
    fn vehicle_mut(&mut self, id: Uuid) -> Option<&mut Vehicle> {
        self.vehicles.iter_mut().find(|v| v.id == id)
    }

    fn owned_vehicle_mut(&mut self, id: Uuid, seller_id: Uuid) -> AppResult<&mut Vehicle> {
        match self.vehicle_mut(id) {
            Some(v) if v.seller_id == seller_id && v.is_active => Ok(v),
            _ => Err(not_found("Vehicle")),
        }
    }

    fn items(&self, kind: ReferenceKind) -> &[ReferenceItem] {
        self.reference.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// InMemoryRepository
///
/// A `Repository` held entirely in process memory. It runs the same lifecycle
/// checks as the Postgres implementation and is used by the handler and router
/// tests, and by local runs without a database.
#[derive(Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> AppResult<MutexGuard<'_, Store>> {
        self.store
            .lock()
            .map_err(|_| AppError::Internal("in-memory store lock poisoned".into()))
    }

    // --- Seeding helpers ---

    pub fn insert_user(&self, user: User) -> AppResult<()> {
        self.store()?.users.push(user);
        Ok(())
    }

    /// Inserts a vehicle row as-is, bypassing the lifecycle (fixtures only).
    pub fn insert_vehicle(&self, vehicle: Vehicle) -> AppResult<()> {
        self.store()?.vehicles.push(vehicle);
        Ok(())
    }

    pub fn insert_reference(&self, kind: ReferenceKind, item: ReferenceItem) -> AppResult<()> {
        self.store()?.reference.entry(kind).or_default().push(item);
        Ok(())
    }

    pub fn insert_booking(&self, booking: Booking) -> AppResult<()> {
        self.store()?.bookings.push(booking);
        Ok(())
    }
}

fn matches_search(haystacks: &[Option<&str>], search: Option<&str>) -> bool {
    match search.map(str::trim).filter(|s| !s.is_empty()) {
        None => true,
        Some(needle) => {
            let needle = needle.to_lowercase();
            haystacks
                .iter()
                .flatten()
                .any(|h| h.to_lowercase().contains(&needle))
        }
    }
}

fn matches_vehicle_filter(v: &Vehicle, filter: &VehicleFilter) -> bool {
    filter.make_id.is_none_or(|id| v.make_id == Some(id))
        && filter.type_id.is_none_or(|id| v.type_id == Some(id))
        && filter.fuel_type_id.is_none_or(|id| v.fuel_type_id == Some(id))
        && matches_search(
            &[Some(v.title.as_str()), v.model_name.as_deref()],
            filter.search.as_deref(),
        )
}

/// Newest first; insertion order breaks ties the same way a later `created_at` would.
fn newest_first<T: Clone>(rows: &[T], created_at: impl Fn(&T) -> chrono::DateTime<Utc>, keep: impl Fn(&T) -> bool) -> Vec<T> {
    let mut out: Vec<T> = rows.iter().rev().filter(|r| keep(*r)).cloned().collect();
    out.sort_by_key(|r| std::cmp::Reverse(created_at(r)));
    out
}

#[async_trait]
impl Repository for InMemoryRepository {
    // --- USERS ---

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.store()?.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .store()?
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create_user(&self, user: User) -> AppResult<User> {
        let mut store = self.store()?;
        if store.users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(AppError::EmailTaken);
        }
        store.users.push(user.clone());
        Ok(user)
    }

    async fn update_profile(&self, id: Uuid, req: UpdateProfileRequest) -> AppResult<Option<User>> {
        let mut store = self.store()?;
        let Some(user) = store.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(name) = req.name {
            user.name = name;
        }
        if let Some(phone) = req.phone {
            user.phone = Some(phone);
        }
        Ok(Some(user.clone()))
    }

    async fn list_users(&self, filter: &UserFilter, page: PageRequest) -> AppResult<Paginated<User>> {
        let store = self.store()?;
        let rows = newest_first(&store.users, |u| u.created_at, |u| {
            filter.role.is_none_or(|r| u.role == r)
                && matches_search(&[Some(u.email.as_str()), Some(u.name.as_str())], filter.search.as_deref())
        });
        Ok(Paginated::from_vec(rows, page))
    }

    async fn update_user_admin(&self, id: Uuid, req: AdminUserUpdate) -> AppResult<Option<User>> {
        let mut store = self.store()?;
        let Some(user) = store.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(role) = req.role {
            user.role = role;
        }
        if let Some(active) = req.is_active {
            user.is_active = active;
        }
        Ok(Some(user.clone()))
    }

    // --- VEHICLES (SELLER) ---

    async fn create_vehicle(&self, seller_id: Uuid, input: VehicleInput) -> AppResult<Vehicle> {
        let now = Utc::now();
        let vehicle = Vehicle {
            id: Uuid::new_v4(),
            seller_id,
            status: VehicleStatus::Draft,
            title: input.title.trim().to_string(),
            description: input.description,
            model_name: input.model_name,
            model_id: input.model_id,
            make_id: input.make_id,
            type_id: input.type_id,
            fuel_type_id: input.fuel_type_id,
            year: input.year,
            seats: input.seats,
            daily_rate_cents: input.daily_rate_cents,
            location: input.location,
            images: input.images,
            is_active: true,
            is_published: false,
            submitted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.store()?.vehicles.push(vehicle.clone());
        Ok(vehicle)
    }

    async fn get_vehicle(&self, id: Uuid) -> AppResult<Option<Vehicle>> {
        Ok(self.store()?.vehicles.iter().find(|v| v.id == id).cloned())
    }

    async fn update_vehicle(&self, id: Uuid, seller_id: Uuid, input: VehicleInput) -> AppResult<Vehicle> {
        let mut store = self.store()?;
        let vehicle = store.owned_vehicle_mut(id, seller_id)?;
        lifecycle::check_editable(vehicle)?;

        vehicle.title = input.title.trim().to_string();
        vehicle.description = input.description;
        vehicle.model_name = input.model_name;
        vehicle.model_id = input.model_id;
        vehicle.make_id = input.make_id;
        vehicle.type_id = input.type_id;
        vehicle.fuel_type_id = input.fuel_type_id;
        vehicle.year = input.year;
        vehicle.seats = input.seats;
        vehicle.daily_rate_cents = input.daily_rate_cents;
        vehicle.location = input.location;
        vehicle.images = input.images;
        vehicle.updated_at = Utc::now();
        Ok(vehicle.clone())
    }

    async fn submit_vehicle(&self, id: Uuid, seller_id: Uuid) -> AppResult<Vehicle> {
        let mut store = self.store()?;
        let vehicle = store.owned_vehicle_mut(id, seller_id)?;
        lifecycle::check_submission(vehicle)?;
        lifecycle::apply_submission(vehicle, Utc::now());
        Ok(vehicle.clone())
    }

    async fn set_vehicle_published(&self, id: Uuid, seller_id: Uuid, published: bool) -> AppResult<Vehicle> {
        let mut store = self.store()?;
        let vehicle = store.owned_vehicle_mut(id, seller_id)?;
        lifecycle::check_publish(vehicle)?;
        vehicle.is_published = published;
        vehicle.updated_at = Utc::now();
        Ok(vehicle.clone())
    }

    async fn deactivate_vehicle(&self, id: Uuid, seller_id: Option<Uuid>) -> AppResult<Vehicle> {
        let mut store = self.store()?;
        let vehicle = match seller_id {
            Some(owner) => store.owned_vehicle_mut(id, owner)?,
            None => store.vehicle_mut(id).ok_or_else(|| not_found("Vehicle"))?,
        };
        vehicle.is_active = false;
        vehicle.is_published = false;
        vehicle.updated_at = Utc::now();
        Ok(vehicle.clone())
    }

    async fn list_seller_vehicles(
        &self,
        seller_id: Uuid,
        filter: &VehicleFilter,
        page: PageRequest,
    ) -> AppResult<Paginated<Vehicle>> {
        let store = self.store()?;
        let include_inactive = filter.include_inactive.unwrap_or(false);
        let rows = newest_first(&store.vehicles, |v| v.created_at, |v| {
            v.seller_id == seller_id
                && (include_inactive || v.is_active)
                && filter.status.is_none_or(|s| v.status == s)
                && matches_vehicle_filter(v, filter)
        });
        Ok(Paginated::from_vec(rows, page))
    }

    // --- VEHICLES (PUBLIC) ---

    async fn list_public_vehicles(&self, filter: &VehicleFilter, page: PageRequest) -> AppResult<Paginated<Vehicle>> {
        let store = self.store()?;
        let rows = newest_first(&store.vehicles, |v| v.created_at, |v| {
            v.is_publicly_visible() && matches_vehicle_filter(v, filter)
        });
        Ok(Paginated::from_vec(rows, page))
    }

    async fn get_public_vehicle(&self, id: Uuid) -> AppResult<Option<Vehicle>> {
        Ok(self
            .store()?
            .vehicles
            .iter()
            .find(|v| v.id == id && v.is_publicly_visible())
            .cloned())
    }

    // --- VEHICLES (ADMIN) ---

    async fn list_all_vehicles(&self, filter: &VehicleFilter, page: PageRequest) -> AppResult<Paginated<Vehicle>> {
        let store = self.store()?;
        let include_inactive = filter.include_inactive.unwrap_or(true);
        let rows = newest_first(&store.vehicles, |v| v.created_at, |v| {
            (include_inactive || v.is_active)
                && filter.status.is_none_or(|s| v.status == s)
                && matches_vehicle_filter(v, filter)
        });
        Ok(Paginated::from_vec(rows, page))
    }

    async fn review_vehicle(&self, id: Uuid, reviewer_id: Uuid, req: ReviewRequest) -> AppResult<ReviewOutcome> {
        let mut store = self.store()?;
        let now = Utc::now();
        let vehicle = store.vehicle_mut(id).ok_or_else(|| not_found("Vehicle"))?;
        lifecycle::check_review(vehicle, req.status)?;
        lifecycle::apply_review(vehicle, req.status, now);
        let vehicle = vehicle.clone();

        let approval = Approval {
            id: Uuid::new_v4(),
            vehicle_id: id,
            reviewer_id,
            status: req.status,
            comments: req.comments,
            created_at: now,
        };
        store.approvals.push(approval.clone());
        Ok(ReviewOutcome { vehicle, approval })
    }

    async fn list_approvals(&self, vehicle_id: Uuid) -> AppResult<Vec<Approval>> {
        let store = self.store()?;
        Ok(newest_first(&store.approvals, |a| a.created_at, |a| a.vehicle_id == vehicle_id))
    }

    // --- REFERENCE DATA ---

    async fn list_reference(
        &self,
        kind: ReferenceKind,
        filter: &ReferenceFilter,
        active_only: bool,
        page: PageRequest,
    ) -> AppResult<Paginated<ReferenceItem>> {
        let store = self.store()?;
        let mut rows: Vec<ReferenceItem> = store
            .items(kind)
            .iter()
            .filter(|item| !active_only || item.is_active)
            .filter(|item| kind != ReferenceKind::Models || filter.make_id.is_none_or(|m| item.make_id == Some(m)))
            .filter(|item| matches_search(&[Some(item.name.as_str())], filter.search.as_deref()))
            .cloned()
            .collect();
        rows.sort_by_cached_key(|item| item.name.to_lowercase());
        Ok(Paginated::from_vec(rows, page))
    }

    async fn get_reference(&self, kind: ReferenceKind, id: Uuid) -> AppResult<Option<ReferenceItem>> {
        Ok(self.store()?.items(kind).iter().find(|i| i.id == id).cloned())
    }

    async fn create_reference(&self, kind: ReferenceKind, input: ReferenceInput) -> AppResult<ReferenceItem> {
        let now = Utc::now();
        let item = ReferenceItem {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            make_id: if kind == ReferenceKind::Models { input.make_id } else { None },
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.store()?.reference.entry(kind).or_default().push(item.clone());
        Ok(item)
    }

    async fn update_reference(
        &self,
        kind: ReferenceKind,
        id: Uuid,
        input: ReferenceInput,
    ) -> AppResult<Option<ReferenceItem>> {
        let mut store = self.store()?;
        let Some(item) = store
            .reference
            .get_mut(&kind)
            .and_then(|items| items.iter_mut().find(|i| i.id == id))
        else {
            return Ok(None);
        };
        item.name = input.name.trim().to_string();
        if kind == ReferenceKind::Models && input.make_id.is_some() {
            item.make_id = input.make_id;
        }
        item.updated_at = Utc::now();
        Ok(Some(item.clone()))
    }

    async fn delete_reference(
        &self,
        kind: ReferenceKind,
        id: Uuid,
        policy: DeletePolicy,
    ) -> AppResult<ReferenceItem> {
        let mut store = self.store()?;
        if !store.items(kind).iter().any(|i| i.id == id) {
            return Err(not_found(kind.label()));
        }

        let mut usage = store
            .vehicles
            .iter()
            .filter(|v| {
                let column = match kind {
                    ReferenceKind::Makes => v.make_id,
                    ReferenceKind::Models => v.model_id,
                    ReferenceKind::VehicleTypes => v.type_id,
                    ReferenceKind::FuelTypes => v.fuel_type_id,
                };
                column == Some(id)
            })
            .count();
        if kind == ReferenceKind::Makes {
            usage += store
                .items(ReferenceKind::Models)
                .iter()
                .filter(|m| m.make_id == Some(id))
                .count();
        }
        if usage > 0 {
            return Err(AppError::InUse(format!(
                "{} is referenced by {} record(s) and cannot be deleted",
                kind.label(),
                usage
            )));
        }

        let items = store.reference.entry(kind).or_default();
        let position = items
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| not_found(kind.label()))?;
        match policy {
            DeletePolicy::Hard => Ok(items.remove(position)),
            DeletePolicy::Soft => {
                let item = &mut items[position];
                item.is_active = false;
                item.updated_at = Utc::now();
                Ok(item.clone())
            }
        }
    }

    // --- BOOKINGS ---

    async fn create_booking(&self, buyer_id: Uuid, req: CreateBookingRequest, today: NaiveDate) -> AppResult<Booking> {
        let mut store = self.store()?;
        let vehicle = store
            .vehicles
            .iter()
            .find(|v| v.id == req.vehicle_id && v.is_publicly_visible())
            .cloned()
            .ok_or_else(|| not_found("Vehicle"))?;
        if vehicle.seller_id == buyer_id {
            return Err(AppError::Validation("You cannot book your own vehicle".into()));
        }

        let days = lifecycle::booking_days(req.start_date, req.end_date, today)?;
        let total = lifecycle::booking_total(days, vehicle.daily_rate_cents)?;

        let overlapping = store.bookings.iter().any(|b| {
            b.vehicle_id == vehicle.id
                && lifecycle::blocks_calendar(b.status)
                && lifecycle::ranges_overlap((b.start_date, b.end_date), (req.start_date, req.end_date))
        });
        if overlapping {
            return Err(AppError::Conflict(
                "Vehicle is already booked for the selected dates".into(),
            ));
        }

        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            vehicle_id: vehicle.id,
            buyer_id,
            seller_id: vehicle.seller_id,
            start_date: req.start_date,
            end_date: req.end_date,
            total_cents: total,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        store.bookings.push(booking.clone());
        Ok(booking)
    }

    async fn list_buyer_bookings(
        &self,
        buyer_id: Uuid,
        filter: &BookingFilter,
        page: PageRequest,
    ) -> AppResult<Paginated<Booking>> {
        let store = self.store()?;
        let rows = newest_first(&store.bookings, |b| b.created_at, |b| {
            b.buyer_id == buyer_id && filter.status.is_none_or(|s| b.status == s)
        });
        Ok(Paginated::from_vec(rows, page))
    }

    async fn list_seller_bookings(
        &self,
        seller_id: Uuid,
        filter: &BookingFilter,
        page: PageRequest,
    ) -> AppResult<Paginated<Booking>> {
        let store = self.store()?;
        let rows = newest_first(&store.bookings, |b| b.created_at, |b| {
            b.seller_id == seller_id && filter.status.is_none_or(|s| b.status == s)
        });
        Ok(Paginated::from_vec(rows, page))
    }

    async fn transition_booking(
        &self,
        id: Uuid,
        actor_id: Uuid,
        actor: BookingActor,
        to: BookingStatus,
    ) -> AppResult<Booking> {
        let mut store = self.store()?;
        let booking = store
            .bookings
            .iter_mut()
            .find(|b| {
                b.id == id
                    && match actor {
                        BookingActor::Buyer => b.buyer_id == actor_id,
                        BookingActor::Seller => b.seller_id == actor_id,
                    }
            })
            .ok_or_else(|| not_found("Booking"))?;
        lifecycle::check_booking_transition(booking.status, to, actor)?;
        booking.status = to;
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }

    // --- PAYMENT ACCOUNTS ---

    async fn get_payment_account(&self, user_id: Uuid) -> AppResult<Option<PaymentAccount>> {
        Ok(self.store()?.payment_accounts.get(&user_id).cloned())
    }

    async fn save_payment_account(&self, account: PaymentAccount) -> AppResult<PaymentAccount> {
        self.store()?
            .payment_accounts
            .insert(account.user_id, account.clone());
        Ok(account)
    }

    // --- ADMIN DASHBOARD ---

    async fn get_stats(&self) -> AppResult<AdminDashboardStats> {
        let store = self.store()?;
        let count_role = |role: Role| store.users.iter().filter(|u| u.role == role).count() as i64;
        let active: Vec<&Vehicle> = store.vehicles.iter().filter(|v| v.is_active).collect();
        let count_status =
            |status: VehicleStatus| active.iter().filter(|v| v.status == status).count() as i64;

        let mut recent_users = newest_first(&store.users, |u| u.created_at, |_| true);
        recent_users.truncate(RECENT_LIMIT);
        let mut recent_vehicles = newest_first(&store.vehicles, |v| v.created_at, |_| true);
        recent_vehicles.truncate(RECENT_LIMIT);

        Ok(AdminDashboardStats {
            total_users: store.users.len() as i64,
            total_buyers: count_role(Role::Buyer),
            total_sellers: count_role(Role::Seller),
            total_vehicles: active.len() as i64,
            pending_vehicles: count_status(VehicleStatus::Pending),
            approved_vehicles: count_status(VehicleStatus::Approved),
            total_bookings: store.bookings.len() as i64,
            recent_users,
            recent_vehicles,
        })
    }
}
