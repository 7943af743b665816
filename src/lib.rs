use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
    routing::get,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// --- Module Structure ---

// Core domain and services.
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod identity;
pub mod lifecycle;
pub mod models;
pub mod pagination;
pub mod payments;
pub mod repository;
pub mod storage;

// Routing segregated by role set (public, authenticated, seller, admin).
pub mod routes;
use routes::{admin, authenticated, public, seller};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use identity::IdentityState;
pub use payments::PaymentState;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use storage::StorageState;

/// ApiDoc
///
/// The OpenAPI document served at `/api-docs/openapi.json`, aggregated from the
/// `#[utoipa::path]` handlers and `ToSchema` models.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::account::signup, handlers::account::get_me, handlers::account::update_me,
        handlers::vehicles::create_vehicle, handlers::vehicles::list_my_vehicles,
        handlers::vehicles::get_my_vehicle, handlers::vehicles::update_vehicle,
        handlers::vehicles::submit_vehicle, handlers::vehicles::set_vehicle_published,
        handlers::vehicles::delete_vehicle, handlers::vehicles::list_public_vehicles,
        handlers::vehicles::get_public_vehicle,
        handlers::admin::get_admin_stats, handlers::admin::list_admin_vehicles,
        handlers::admin::get_admin_vehicle, handlers::admin::review_vehicle,
        handlers::admin::admin_delete_vehicle, handlers::admin::list_users,
        handlers::admin::update_user,
        handlers::reference::list_reference, handlers::reference::list_active_reference,
        handlers::reference::create_reference, handlers::reference::update_reference,
        handlers::reference::delete_reference,
        handlers::bookings::create_booking, handlers::bookings::list_my_bookings,
        handlers::bookings::cancel_booking, handlers::bookings::list_seller_bookings,
        handlers::bookings::update_booking_status,
        handlers::stripe::get_connect_status, handlers::stripe::create_onboarding_link,
        handlers::stripe::create_dashboard_link, handlers::stripe::get_payment_config,
        handlers::upload::upload_image,
    ),
    components(
        schemas(
            models::Role, models::VehicleStatus, models::ReviewDecision, models::BookingStatus,
            models::ReferenceKind, models::User, models::Vehicle, models::Approval,
            models::ReferenceItem, models::Booking, models::SignupRequest,
            models::UpdateProfileRequest, models::AdminUserUpdate, models::VehicleInput,
            models::PublishRequest, models::ReviewRequest, models::ReferenceInput,
            models::CreateBookingRequest, models::BookingStatusUpdate, models::VehicleDetail,
            models::ReviewOutcome, models::AdminDashboardStats, models::ConnectStatus,
            models::LinkResponse, models::PaymentConfigResponse, models::UploadResponse,
            pagination::Pagination, error::ErrorResponse, error::ErrorCode,
        )
    ),
    tags(
        (name = "rental-marketplace", description = "Vehicle Rental Marketplace API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Implements the **Unified State Pattern**: one cheaply clonable container of
/// trait-object services plus the immutable configuration, shared by every request.
#[derive(Clone)]
pub struct AppState {
    /// Persistence (Postgres in production, in-memory in tests).
    pub repo: RepositoryState,
    /// Uploaded image storage (local disk or S3-compatible bucket).
    pub storage: StorageState,
    /// Payment processor connected accounts.
    pub payments: PaymentState,
    /// Identity provider used at signup.
    pub identity: IdentityState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for PaymentState {
    fn from_ref(app_state: &AppState) -> PaymentState {
        app_state.payments.clone()
    }
}

impl FromRef<AppState> for IdentityState {
    fn from_ref(app_state: &AppState) -> IdentityState {
        app_state.identity.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routing tree. Each protected group carries the role guard for its
/// role set as a `route_layer`, so unauthenticated calls get 401 and wrong-role
/// calls get 403 before any handler runs.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let api = Router::new()
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes(state.config.upload.max_bytes()).route_layer(
                middleware::from_fn_with_state(state.clone(), auth::role_guard(auth::ANY_ROLE)),
            ),
        )
        .merge(seller::seller_routes().route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::role_guard(auth::SELLER_ONLY),
        )))
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::role_guard(auth::ADMIN_ONLY),
            )),
        );

    let mut router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // GET /health: liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        .nest("/api", api);

    // Local storage serves its own files; S3 objects are served by the bucket.
    if state.config.storage == config::StorageBackend::Local {
        router = router.nest_service("/uploads", ServeDir::new(&state.config.upload.directory));
    }

    router
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the per-request span with method, URI and the `x-request-id` set by
/// `SetRequestIdLayer`, so every log line of a request is correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
