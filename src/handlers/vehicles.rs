use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use uuid::Uuid;

use super::page_of;
use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult, not_found},
    extract::{AppJson, AppPath, AppQuery},
    lifecycle,
    models::{PublishRequest, ReferenceKind, Vehicle, VehicleDetail, VehicleFilter, VehicleInput},
    pagination::Paginated,
    repository::RepositoryState,
};

/// Loads a vehicle with its review trail, newest approval first.
pub(crate) async fn vehicle_detail(repo: &RepositoryState, vehicle: Vehicle) -> AppResult<VehicleDetail> {
    let approvals = repo.list_approvals(vehicle.id).await?;
    Ok(VehicleDetail {
        current_approval: approvals.first().cloned(),
        approvals,
        vehicle,
    })
}

/// Every reference id on the payload must name an active item, and a model must
/// belong to the chosen make.
async fn check_references(state: &AppState, input: &VehicleInput) -> AppResult<()> {
    let ids = [
        (ReferenceKind::Makes, input.make_id, "makeId"),
        (ReferenceKind::Models, input.model_id, "modelId"),
        (ReferenceKind::VehicleTypes, input.type_id, "typeId"),
        (ReferenceKind::FuelTypes, input.fuel_type_id, "fuelTypeId"),
    ];
    for (kind, id, field) in ids {
        let Some(id) = id else { continue };
        let item = state
            .repo
            .get_reference(kind, id)
            .await?
            .filter(|item| item.is_active)
            .ok_or_else(|| {
                AppError::Validation(format!("{field} does not reference an active {}", kind.label().to_lowercase()))
            })?;
        if kind == ReferenceKind::Models && input.make_id.is_some() && item.make_id != input.make_id {
            return Err(AppError::Validation("modelId does not belong to makeId".into()));
        }
    }
    Ok(())
}

// --- Seller Routes ---

/// create_vehicle
///
/// [Seller Route] Creates a listing owned by the caller. New listings start as an
/// unpublished DRAFT.
#[utoipa::path(
    post,
    path = "/api/vehicles",
    request_body = VehicleInput,
    responses(
        (status = 201, description = "Created", body = Vehicle),
        (status = 400, description = "Validation failed", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_vehicle(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<VehicleInput>,
) -> AppResult<(StatusCode, Json<Vehicle>)> {
    payload.check()?;
    check_references(&state, &payload).await?;
    let vehicle = state.repo.create_vehicle(id, payload).await?;
    tracing::info!(vehicle_id = %vehicle.id, seller_id = %id, "vehicle created");
    Ok((StatusCode::CREATED, Json(vehicle)))
}

/// list_my_vehicles
///
/// [Seller Route] The caller's own listings in any status. Soft-deleted listings are
/// hidden unless `includeInactive=true`.
#[utoipa::path(
    get,
    path = "/api/vehicles",
    params(VehicleFilter),
    responses((status = 200, description = "My vehicles", body = Paginated<Vehicle>))
)]
pub async fn list_my_vehicles(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    AppQuery(filter): AppQuery<VehicleFilter>,
) -> AppResult<Json<Paginated<Vehicle>>> {
    let page = page_of(filter.page, filter.limit);
    Ok(Json(state.repo.list_seller_vehicles(id, &filter, page).await?))
}

/// get_my_vehicle
///
/// [Seller Route] One of the caller's listings plus its approval history.
#[utoipa::path(
    get,
    path = "/api/vehicles/{id}",
    params(("id" = Uuid, Path, description = "Vehicle ID")),
    responses(
        (status = 200, description = "Found", body = VehicleDetail),
        (status = 404, description = "Not found or not owned", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_my_vehicle(
    AuthUser { id: seller_id, .. }: AuthUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<VehicleDetail>> {
    let vehicle = lifecycle::owned_by(state.repo.get_vehicle(id).await?, seller_id)?;
    Ok(Json(vehicle_detail(&state.repo, vehicle).await?))
}

/// update_vehicle
///
/// [Seller Route] Replaces the listing's editable fields. Only DRAFT and REJECTED
/// listings can be edited; the status itself is left alone.
#[utoipa::path(
    put,
    path = "/api/vehicles/{id}",
    request_body = VehicleInput,
    params(("id" = Uuid, Path, description = "Vehicle ID")),
    responses(
        (status = 200, description = "Updated", body = Vehicle),
        (status = 400, description = "Not editable in current status", body = crate::error::ErrorResponse),
        (status = 404, description = "Not found or not owned", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_vehicle(
    AuthUser { id: seller_id, .. }: AuthUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<VehicleInput>,
) -> AppResult<Json<Vehicle>> {
    payload.check()?;
    check_references(&state, &payload).await?;
    Ok(Json(state.repo.update_vehicle(id, seller_id, payload).await?))
}

/// submit_vehicle
///
/// [Seller Route] Sends a DRAFT or REJECTED listing to the moderation queue.
///
/// *Preconditions* (checked in order): owned by the caller, status DRAFT/REJECTED,
/// `modelName`/`makeId`/`typeId`/`fuelTypeId` present, at least one image.
#[utoipa::path(
    post,
    path = "/api/vehicles/{id}/submit",
    params(("id" = Uuid, Path, description = "Vehicle ID")),
    responses(
        (status = 200, description = "Submitted; status is PENDING", body = Vehicle),
        (status = 400, description = "Invalid state or incomplete listing", body = crate::error::ErrorResponse),
        (status = 404, description = "Not found or not owned", body = crate::error::ErrorResponse)
    )
)]
pub async fn submit_vehicle(
    AuthUser { id: seller_id, .. }: AuthUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<Vehicle>> {
    Ok(Json(state.repo.submit_vehicle(id, seller_id).await?))
}

/// set_vehicle_published
///
/// [Seller Route] Shows or hides an APPROVED listing in the public catalogue.
#[utoipa::path(
    patch,
    path = "/api/vehicles/{id}/publish",
    request_body = PublishRequest,
    params(("id" = Uuid, Path, description = "Vehicle ID")),
    responses(
        (status = 200, description = "Updated", body = Vehicle),
        (status = 400, description = "Vehicle is not APPROVED", body = crate::error::ErrorResponse)
    )
)]
pub async fn set_vehicle_published(
    AuthUser { id: seller_id, .. }: AuthUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<PublishRequest>,
) -> AppResult<Json<Vehicle>> {
    let vehicle = state
        .repo
        .set_vehicle_published(id, seller_id, payload.is_published)
        .await?;
    Ok(Json(vehicle))
}

/// delete_vehicle
///
/// [Seller Route] Soft-deletes the caller's listing. Bookings and approvals keep
/// pointing at the row.
#[utoipa::path(
    delete,
    path = "/api/vehicles/{id}",
    params(("id" = Uuid, Path, description = "Vehicle ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found or not owned", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_vehicle(
    AuthUser { id: seller_id, .. }: AuthUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    state.repo.deactivate_vehicle(id, Some(seller_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Public Routes ---

/// list_public_vehicles
///
/// [Public Route] The catalogue.
///
/// *Security*: the repository applies APPROVED + active + published unconditionally;
/// `status` and `includeInactive` are ignored here.
#[utoipa::path(
    get,
    path = "/api/vehicles/public",
    params(VehicleFilter),
    responses((status = 200, description = "Public vehicles", body = Paginated<Vehicle>))
)]
pub async fn list_public_vehicles(
    State(state): State<AppState>,
    AppQuery(filter): AppQuery<VehicleFilter>,
) -> AppResult<Json<Paginated<Vehicle>>> {
    let page = page_of(filter.page, filter.limit);
    Ok(Json(state.repo.list_public_vehicles(&filter, page).await?))
}

#[utoipa::path(
    get,
    path = "/api/vehicles/public/{id}",
    params(("id" = Uuid, Path, description = "Vehicle ID")),
    responses(
        (status = 200, description = "Found", body = Vehicle),
        (status = 404, description = "Not found or not public", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_public_vehicle(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<Vehicle>> {
    state
        .repo
        .get_public_vehicle(id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Vehicle"))
}
