/// Router Module Index
///
/// Routes are split by who may call them. Each group is mounted in
/// `create_router` behind the role guard for its role set, so access control is
/// applied per group and a handler can never be exposed without it.

/// Anonymous routes: catalogue, reference data, signup, client config.
pub mod public;

/// Any signed-in user (`ANY_ROLE`).
pub mod authenticated;

/// Sellers only (`SELLER_ONLY`): listing management, incoming bookings, payouts onboarding.
pub mod seller;

/// Admins only (`ADMIN_ONLY`), nested under `/api/admin`.
pub mod admin;
