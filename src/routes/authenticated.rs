use crate::{AppState, handlers};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
};

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Authenticated Router Module
///
/// Routes open to any signed-in user regardless of role. The handlers receive the
/// `AuthUser` placed in the request extensions by the guard layer.
pub fn authenticated_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::<AppState>::new()
        // GET/PUT /api/me
        .route(
            "/me",
            get(handlers::account::get_me).put(handlers::account::update_me),
        )
        // POST /api/upload (multipart, field `file`)
        // The body limit sits just above MAX_FILE_SIZE_MB so the handler, not the
        // extractor, reports oversized files.
        .route(
            "/upload",
            post(handlers::upload::upload_image)
                .layer(DefaultBodyLimit::max(max_upload_bytes + MULTIPART_OVERHEAD_BYTES)),
        )
        // --- Bookings (as buyer) ---
        .route(
            "/bookings",
            post(handlers::bookings::create_booking).get(handlers::bookings::list_my_bookings),
        )
        .route("/bookings/{id}/cancel", patch(handlers::bookings::cancel_booking))
}
