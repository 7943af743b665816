use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use uuid::Uuid;
use validator::Validate;

use super::page_of;
use crate::{
    AppState,
    error::{AppError, AppResult, not_found},
    extract::{AppJson, AppPath, AppQuery},
    models::{DeleteOptions, ReferenceFilter, ReferenceInput, ReferenceItem, ReferenceKind},
    pagination::Paginated,
    repository::DeletePolicy,
};

/// Models must point at an existing make; the other kinds ignore `makeId`.
async fn check_parent(state: &AppState, kind: ReferenceKind, input: &ReferenceInput, required: bool) -> AppResult<()> {
    if kind != ReferenceKind::Models {
        return Ok(());
    }
    match input.make_id {
        Some(make_id) => {
            state
                .repo
                .get_reference(ReferenceKind::Makes, make_id)
                .await?
                .ok_or_else(|| AppError::Validation("makeId does not reference an existing make".into()))?;
            Ok(())
        }
        None if required => Err(AppError::Validation("makeId is required for models".into())),
        None => Ok(()),
    }
}

/// list_reference
///
/// [Admin Route] Paginated listing of one reference resource (`makes`, `models`,
/// `vehicle-types`, `fuel-types`). Inactive rows are included unless
/// `includeInactive=false`.
#[utoipa::path(
    get,
    path = "/api/admin/{resource}",
    params(
        ("resource" = ReferenceKind, Path, description = "makes | models | vehicle-types | fuel-types"),
        ReferenceFilter
    ),
    responses((status = 200, description = "Items", body = Paginated<ReferenceItem>))
)]
pub async fn list_reference(
    State(state): State<AppState>,
    AppPath(kind): AppPath<ReferenceKind>,
    AppQuery(filter): AppQuery<ReferenceFilter>,
) -> AppResult<Json<Paginated<ReferenceItem>>> {
    let page = page_of(filter.page, filter.limit);
    let active_only = !filter.include_inactive.unwrap_or(true);
    Ok(Json(state.repo.list_reference(kind, &filter, active_only, page).await?))
}

/// list_active_reference
///
/// [Public Route] Active items only, for the seller's listing form.
#[utoipa::path(
    get,
    path = "/api/reference/{resource}",
    params(
        ("resource" = ReferenceKind, Path, description = "makes | models | vehicle-types | fuel-types"),
        ReferenceFilter
    ),
    responses((status = 200, description = "Active items", body = Paginated<ReferenceItem>))
)]
pub async fn list_active_reference(
    State(state): State<AppState>,
    AppPath(kind): AppPath<ReferenceKind>,
    AppQuery(filter): AppQuery<ReferenceFilter>,
) -> AppResult<Json<Paginated<ReferenceItem>>> {
    let page = page_of(filter.page, filter.limit);
    Ok(Json(state.repo.list_reference(kind, &filter, true, page).await?))
}

/// create_reference
///
/// [Admin Route] Creates an item. Names are not deduplicated.
#[utoipa::path(
    post,
    path = "/api/admin/{resource}",
    request_body = ReferenceInput,
    params(("resource" = ReferenceKind, Path, description = "makes | models | vehicle-types | fuel-types")),
    responses(
        (status = 201, description = "Created", body = ReferenceItem),
        (status = 400, description = "Validation failed", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_reference(
    State(state): State<AppState>,
    AppPath(kind): AppPath<ReferenceKind>,
    AppJson(payload): AppJson<ReferenceInput>,
) -> AppResult<(StatusCode, Json<ReferenceItem>)> {
    payload.validate()?;
    check_parent(&state, kind, &payload, true).await?;
    let item = state.repo.create_reference(kind, payload).await?;
    tracing::info!(kind = ?kind, id = %item.id, name = %item.name, "reference item created");
    Ok((StatusCode::CREATED, Json(item)))
}

#[utoipa::path(
    put,
    path = "/api/admin/{resource}/{id}",
    request_body = ReferenceInput,
    params(
        ("resource" = ReferenceKind, Path, description = "makes | models | vehicle-types | fuel-types"),
        ("id" = Uuid, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Updated", body = ReferenceItem),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_reference(
    State(state): State<AppState>,
    AppPath((kind, id)): AppPath<(ReferenceKind, Uuid)>,
    AppJson(payload): AppJson<ReferenceInput>,
) -> AppResult<Json<ReferenceItem>> {
    payload.validate()?;
    check_parent(&state, kind, &payload, false).await?;
    state
        .repo
        .update_reference(kind, id, payload)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(kind.label()))
}

/// delete_reference
///
/// [Admin Route] Soft-deletes by default; `?hard=true` removes the row. Either way
/// an item still referenced by a vehicle (or a make still owning models) is
/// refused with `IN_USE`.
#[utoipa::path(
    delete,
    path = "/api/admin/{resource}/{id}",
    params(
        ("resource" = ReferenceKind, Path, description = "makes | models | vehicle-types | fuel-types"),
        ("id" = Uuid, Path, description = "Item ID"),
        DeleteOptions
    ),
    responses(
        (status = 200, description = "Deleted; returns the item as it was removed or deactivated", body = ReferenceItem),
        (status = 400, description = "Item is in use", body = crate::error::ErrorResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_reference(
    State(state): State<AppState>,
    AppPath((kind, id)): AppPath<(ReferenceKind, Uuid)>,
    AppQuery(options): AppQuery<DeleteOptions>,
) -> AppResult<Json<ReferenceItem>> {
    let policy = DeletePolicy::resolve(kind, options.hard);
    Ok(Json(state.repo.delete_reference(kind, id, policy).await?))
}
