use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use validator::Validate;

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult, not_found},
    extract::AppJson,
    models::{Role, SignupRequest, UpdateProfileRequest, User},
};

/// signup
///
/// [Public Route] Registers a buyer or seller.
///
/// *Flow*:
/// 1. Reject ADMIN and malformed payloads.
/// 2. Refuse an email that already has a profile.
/// 3. Create the identity-provider user, which owns the password.
/// 4. Persist the profile under the provider's user id. If that fails the provider
///    user is deleted again.
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Registered", body = User),
        (status = 400, description = "Invalid payload or email taken", body = crate::error::ErrorResponse),
        (status = 502, description = "Identity provider unavailable", body = crate::error::ErrorResponse)
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SignupRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    payload.validate()?;
    if payload.role == Role::Admin {
        return Err(AppError::Validation(
            "Role must be BUYER or SELLER".to_string(),
        ));
    }

    let email = payload.email.trim().to_lowercase();
    if state.repo.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::EmailTaken);
    }

    let id = state.identity.signup(&email, &payload.password).await?;

    let created = state
        .repo
        .create_user(User {
            id,
            email,
            name: payload.name.trim().to_string(),
            phone: payload.phone,
            role: payload.role,
            is_active: true,
            created_at: Utc::now(),
        })
        .await;

    // The provider user exists by now; roll it back so the email is free again.
    let user = match created {
        Ok(user) => user,
        Err(err) => {
            if let Err(cleanup) = state.identity.delete_user(id).await {
                tracing::error!(
                    provider_user_id = %id,
                    error = %cleanup,
                    "failed to remove identity user after profile insert failed; provider user is orphaned"
                );
            }
            return Err(err);
        }
    };

    tracing::info!(user_id = %user.id, role = ?user.role, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// get_me
///
/// [Authenticated Route] The caller's profile.
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "No session", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<User>> {
    state
        .repo
        .get_user(id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("User"))
}

#[utoipa::path(
    put,
    path = "/api/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 400, description = "Validation failed", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<UpdateProfileRequest>,
) -> AppResult<Json<User>> {
    payload.validate()?;
    payload.name = payload.name.map(|n| n.trim().to_string());
    state
        .repo
        .update_profile(id, payload)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("User"))
}
