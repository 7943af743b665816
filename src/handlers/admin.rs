use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use uuid::Uuid;

use super::{page_of, vehicles::vehicle_detail};
use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult, not_found},
    extract::{AppJson, AppPath, AppQuery},
    models::{
        AdminDashboardStats, AdminUserUpdate, ReviewOutcome, ReviewRequest, Role, User,
        UserFilter, Vehicle, VehicleDetail, VehicleFilter,
    },
    pagination::Paginated,
};

/// get_admin_stats
///
/// [Admin Route] Dashboard counters plus the five newest users and vehicles.
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses((status = 200, description = "Stats", body = AdminDashboardStats))
)]
pub async fn get_admin_stats(State(state): State<AppState>) -> AppResult<Json<AdminDashboardStats>> {
    Ok(Json(state.repo.get_stats().await?))
}

// --- Vehicle Moderation ---

/// list_admin_vehicles
///
/// [Admin Route] Every listing, including drafts and soft-deleted ones.
/// `?status=PENDING` is the moderation queue.
#[utoipa::path(
    get,
    path = "/api/admin/vehicles",
    params(VehicleFilter),
    responses((status = 200, description = "All vehicles", body = Paginated<Vehicle>))
)]
pub async fn list_admin_vehicles(
    State(state): State<AppState>,
    AppQuery(filter): AppQuery<VehicleFilter>,
) -> AppResult<Json<Paginated<Vehicle>>> {
    let page = page_of(filter.page, filter.limit);
    Ok(Json(state.repo.list_all_vehicles(&filter, page).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/vehicles/{id}",
    params(("id" = Uuid, Path, description = "Vehicle ID")),
    responses(
        (status = 200, description = "Found", body = VehicleDetail),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_admin_vehicle(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<VehicleDetail>> {
    let vehicle = state
        .repo
        .get_vehicle(id)
        .await?
        .ok_or_else(|| not_found("Vehicle"))?;
    Ok(Json(vehicle_detail(&state.repo, vehicle).await?))
}

/// review_vehicle
///
/// [Admin Route] Approves or rejects a PENDING listing.
///
/// *Atomicity*: the approval record and the vehicle status change commit together.
/// Approval also publishes the listing; rejection unpublishes it.
#[utoipa::path(
    post,
    path = "/api/admin/vehicles/{id}/review",
    request_body = ReviewRequest,
    params(("id" = Uuid, Path, description = "Vehicle ID")),
    responses(
        (status = 200, description = "Reviewed", body = ReviewOutcome),
        (status = 400, description = "Vehicle is not PENDING", body = crate::error::ErrorResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn review_vehicle(
    AuthUser { id: reviewer_id, .. }: AuthUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<ReviewRequest>,
) -> AppResult<Json<ReviewOutcome>> {
    Ok(Json(state.repo.review_vehicle(id, reviewer_id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/api/admin/vehicles/{id}",
    params(("id" = Uuid, Path, description = "Vehicle ID")),
    responses(
        (status = 204, description = "Deactivated"),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn admin_delete_vehicle(
    AuthUser { id: admin_id, .. }: AuthUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    state.repo.deactivate_vehicle(id, None).await?;
    tracing::info!(vehicle_id = %id, admin_id = %admin_id, "vehicle deactivated by admin");
    Ok(StatusCode::NO_CONTENT)
}

// --- User Moderation ---

#[utoipa::path(
    get,
    path = "/api/admin/users",
    params(UserFilter),
    responses((status = 200, description = "Users", body = Paginated<User>))
)]
pub async fn list_users(
    State(state): State<AppState>,
    AppQuery(filter): AppQuery<UserFilter>,
) -> AppResult<Json<Paginated<User>>> {
    let page = page_of(filter.page, filter.limit);
    Ok(Json(state.repo.list_users(&filter, page).await?))
}

/// update_user
///
/// [Admin Route] Changes a user's role or active flag.
///
/// *Guard*: an admin cannot demote or deactivate their own account, so the last
/// admin can never lock everyone out.
#[utoipa::path(
    patch,
    path = "/api/admin/users/{id}",
    request_body = AdminUserUpdate,
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 400, description = "Self-demotion or self-deactivation", body = crate::error::ErrorResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_user(
    AuthUser { id: admin_id, .. }: AuthUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<AdminUserUpdate>,
) -> AppResult<Json<User>> {
    if id == admin_id {
        if payload.role.is_some_and(|role| role != Role::Admin) {
            return Err(AppError::Validation("You cannot change your own role".into()));
        }
        if payload.is_active == Some(false) {
            return Err(AppError::Validation("You cannot deactivate your own account".into()));
        }
    }

    let user = state
        .repo
        .update_user_admin(id, payload)
        .await?
        .ok_or_else(|| not_found("User"))?;
    tracing::info!(user_id = %id, admin_id = %admin_id, role = ?user.role, active = user.is_active, "user updated by admin");
    Ok(Json(user))
}
