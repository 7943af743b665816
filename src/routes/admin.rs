use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// Moderation, user management, reference data and dashboard stats. Nested under
/// `/api/admin` behind the `ADMIN_ONLY` guard.
///
/// The static segments (`stats`, `vehicles`, `users`) take priority over the
/// `{resource}` parameter, so reference routes only see the four resource names.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(handlers::admin::get_admin_stats))
        // --- Vehicle moderation ---
        // GET /api/admin/vehicles?status=PENDING is the review queue.
        .route("/vehicles", get(handlers::admin::list_admin_vehicles))
        .route(
            "/vehicles/{id}",
            get(handlers::admin::get_admin_vehicle).delete(handlers::admin::admin_delete_vehicle),
        )
        .route("/vehicles/{id}/review", post(handlers::admin::review_vehicle))
        // --- Users ---
        .route("/users", get(handlers::admin::list_users))
        .route("/users/{id}", axum::routing::patch(handlers::admin::update_user))
        // --- Reference data: makes | models | vehicle-types | fuel-types ---
        .route(
            "/{resource}",
            get(handlers::reference::list_reference).post(handlers::reference::create_reference),
        )
        .route(
            "/{resource}/{id}",
            axum::routing::put(handlers::reference::update_reference)
                .delete(handlers::reference::delete_reference),
        )
}
