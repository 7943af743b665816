use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

use super::page_of;
use crate::{
    AppState,
    auth::AuthUser,
    error::AppResult,
    extract::{AppJson, AppPath, AppQuery},
    lifecycle::BookingActor,
    models::{Booking, BookingFilter, BookingStatus, BookingStatusUpdate, CreateBookingRequest},
    pagination::Paginated,
};

/// create_booking
///
/// [Authenticated Route] Books a public vehicle for an inclusive date range.
/// `totalCents = (endDate - startDate + 1) * dailyRateCents`.
///
/// *Concurrency*: the overlap check and insert run under the vehicle's row lock,
/// so two buyers cannot both take the same dates.
#[utoipa::path(
    post,
    path = "/api/bookings",
    request_body = CreateBookingRequest,
    responses(
        (status = 201, description = "Booked", body = Booking),
        (status = 400, description = "Invalid dates or own vehicle", body = crate::error::ErrorResponse),
        (status = 404, description = "Vehicle not found or not public", body = crate::error::ErrorResponse),
        (status = 409, description = "Dates overlap an existing booking", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_booking(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateBookingRequest>,
) -> AppResult<(StatusCode, Json<Booking>)> {
    let today = Utc::now().date_naive();
    let booking = state.repo.create_booking(id, payload, today).await?;
    tracing::info!(booking_id = %booking.id, vehicle_id = %booking.vehicle_id, buyer_id = %id, "booking created");
    Ok((StatusCode::CREATED, Json(booking)))
}

#[utoipa::path(
    get,
    path = "/api/bookings",
    params(BookingFilter),
    responses((status = 200, description = "My bookings", body = Paginated<Booking>))
)]
pub async fn list_my_bookings(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    AppQuery(filter): AppQuery<BookingFilter>,
) -> AppResult<Json<Paginated<Booking>>> {
    let page = page_of(filter.page, filter.limit);
    Ok(Json(state.repo.list_buyer_bookings(id, &filter, page).await?))
}

/// cancel_booking
///
/// [Authenticated Route] The buyer withdraws a PENDING or CONFIRMED booking.
#[utoipa::path(
    patch,
    path = "/api/bookings/{id}/cancel",
    params(("id" = Uuid, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Cancelled", body = Booking),
        (status = 400, description = "Booking can no longer be cancelled", body = crate::error::ErrorResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn cancel_booking(
    AuthUser { id: buyer_id, .. }: AuthUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<Booking>> {
    let booking = state
        .repo
        .transition_booking(id, buyer_id, BookingActor::Buyer, BookingStatus::Cancelled)
        .await?;
    Ok(Json(booking))
}

// --- Seller Routes ---

#[utoipa::path(
    get,
    path = "/api/seller/bookings",
    params(BookingFilter),
    responses((status = 200, description = "Bookings on my vehicles", body = Paginated<Booking>))
)]
pub async fn list_seller_bookings(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    AppQuery(filter): AppQuery<BookingFilter>,
) -> AppResult<Json<Paginated<Booking>>> {
    let page = page_of(filter.page, filter.limit);
    Ok(Json(state.repo.list_seller_bookings(id, &filter, page).await?))
}

/// update_booking_status
///
/// [Seller Route] PENDING -> CONFIRMED | CANCELLED, CONFIRMED -> COMPLETED | CANCELLED.
#[utoipa::path(
    patch,
    path = "/api/seller/bookings/{id}/status",
    request_body = BookingStatusUpdate,
    params(("id" = Uuid, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Updated", body = Booking),
        (status = 400, description = "Transition not allowed", body = crate::error::ErrorResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_booking_status(
    AuthUser { id: seller_id, .. }: AuthUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<BookingStatusUpdate>,
) -> AppResult<Json<Booking>> {
    let booking = state
        .repo
        .transition_booking(id, seller_id, BookingActor::Seller, payload.status)
        .await?;
    tracing::info!(booking_id = %id, status = %booking.status, "booking status changed");
    Ok(Json(booking))
}
