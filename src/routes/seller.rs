use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Seller Router Module
///
/// Listing management, bookings received, and connected-account onboarding.
/// Ownership of individual vehicles and bookings is enforced by the repository;
/// a foreign id answers 404.
pub fn seller_routes() -> Router<AppState> {
    Router::new()
        // --- Vehicles ---
        .route(
            "/vehicles",
            post(handlers::vehicles::create_vehicle).get(handlers::vehicles::list_my_vehicles),
        )
        .route(
            "/vehicles/{id}",
            get(handlers::vehicles::get_my_vehicle)
                .put(handlers::vehicles::update_vehicle)
                .delete(handlers::vehicles::delete_vehicle),
        )
        // POST /api/vehicles/{id}/submit
        // DRAFT | REJECTED -> PENDING, after the completeness checks.
        .route("/vehicles/{id}/submit", post(handlers::vehicles::submit_vehicle))
        .route(
            "/vehicles/{id}/publish",
            patch(handlers::vehicles::set_vehicle_published),
        )
        // --- Bookings received ---
        .route("/seller/bookings", get(handlers::bookings::list_seller_bookings))
        .route(
            "/seller/bookings/{id}/status",
            patch(handlers::bookings::update_booking_status),
        )
        // --- Connected account ---
        .route("/stripe/connect/status", get(handlers::stripe::get_connect_status))
        .route(
            "/stripe/connect/onboarding",
            post(handlers::stripe::create_onboarding_link),
        )
        .route(
            "/stripe/connect/dashboard",
            post(handlers::stripe::create_dashboard_link),
        )
}
