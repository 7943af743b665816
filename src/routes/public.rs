use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. Vehicle reads go through the
/// repository's public queries, which only ever return APPROVED, active,
/// published listings.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // POST /api/auth/signup
        // Creates the identity-provider user and the profile. BUYER or SELLER only.
        .route("/auth/signup", post(handlers::account::signup))
        // GET /api/vehicles/public?search=&makeId=&typeId=&fuelTypeId=&page=&limit=
        .route("/vehicles/public", get(handlers::vehicles::list_public_vehicles))
        .route("/vehicles/public/{id}", get(handlers::vehicles::get_public_vehicle))
        // GET /api/reference/{makes|models|vehicle-types|fuel-types}
        // Active items only; feeds the seller's listing form.
        .route("/reference/{resource}", get(handlers::reference::list_active_reference))
        // GET /api/stripe/config
        .route("/stripe/config", get(handlers::stripe::get_payment_config))
}
