use axum::{Json, extract::State};
use chrono::Utc;

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult, not_found},
    models::{ConnectStatus, LinkResponse, PaymentAccount, PaymentConfigResponse},
    payments::AccountSnapshot,
};

fn account_from(user_id: uuid::Uuid, snapshot: AccountSnapshot) -> PaymentAccount {
    PaymentAccount {
        user_id,
        account_id: snapshot.id,
        details_submitted: snapshot.details_submitted,
        charges_enabled: snapshot.charges_enabled,
        payouts_enabled: snapshot.payouts_enabled,
        updated_at: Utc::now(),
    }
}

/// Pulls the processor's current view of the seller's account and stores it.
async fn refresh_account(state: &AppState, account: PaymentAccount) -> AppResult<PaymentAccount> {
    let snapshot = state.payments.retrieve_account(&account.account_id).await?;
    state
        .repo
        .save_payment_account(account_from(account.user_id, snapshot))
        .await
}

/// get_connect_status
///
/// [Seller Route] Connected-account state, refreshed from the processor when an
/// account exists.
#[utoipa::path(
    get,
    path = "/api/stripe/connect/status",
    responses(
        (status = 200, description = "Account state", body = ConnectStatus),
        (status = 502, description = "Processor unavailable", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_connect_status(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<ConnectStatus>> {
    let account = match state.repo.get_payment_account(id).await? {
        Some(existing) => Some(refresh_account(&state, existing).await?),
        None => None,
    };
    Ok(Json(ConnectStatus::from(account.as_ref())))
}

/// create_onboarding_link
///
/// [Seller Route] Creates the connected account on first use, then returns a fresh
/// hosted-onboarding link.
///
/// *Note*: links are single-use and expire quickly, so one is generated per request
/// and never stored.
#[utoipa::path(
    post,
    path = "/api/stripe/connect/onboarding",
    responses(
        (status = 200, description = "Onboarding link", body = LinkResponse),
        (status = 502, description = "Processor unavailable", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_onboarding_link(
    AuthUser { id, email, .. }: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<LinkResponse>> {
    let account = match state.repo.get_payment_account(id).await? {
        Some(existing) => existing,
        None => {
            let snapshot = state.payments.create_connected_account(&email).await?;
            let account = state.repo.save_payment_account(account_from(id, snapshot)).await?;
            tracing::info!(user_id = %id, account_id = %account.account_id, "connected account linked to seller");
            account
        }
    };

    let base = &state.config.public_url;
    let url = state
        .payments
        .create_onboarding_link(
            &account.account_id,
            &format!("{}/seller/payments?onboarding=refresh", base),
            &format!("{}/seller/payments?onboarding=complete", base),
        )
        .await?;
    Ok(Json(LinkResponse { url }))
}

/// create_dashboard_link
///
/// [Seller Route] A fresh login link to the processor's Express dashboard.
/// Requires finished onboarding.
#[utoipa::path(
    post,
    path = "/api/stripe/connect/dashboard",
    responses(
        (status = 200, description = "Dashboard link", body = LinkResponse),
        (status = 400, description = "Onboarding incomplete", body = crate::error::ErrorResponse),
        (status = 404, description = "No connected account", body = crate::error::ErrorResponse),
        (status = 502, description = "Processor unavailable", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_dashboard_link(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<LinkResponse>> {
    let existing = state
        .repo
        .get_payment_account(id)
        .await?
        .ok_or_else(|| not_found("Connected account"))?;
    let account = refresh_account(&state, existing).await?;
    if !account.details_submitted {
        return Err(AppError::InvalidState(
            "Finish payment onboarding before opening the dashboard".into(),
        ));
    }

    let url = state.payments.create_dashboard_link(&account.account_id).await?;
    Ok(Json(LinkResponse { url }))
}

/// get_payment_config
///
/// [Public Route] The publishable key for the browser SDK.
#[utoipa::path(
    get,
    path = "/api/stripe/config",
    responses((status = 200, description = "Client configuration", body = PaymentConfigResponse))
)]
pub async fn get_payment_config(State(state): State<AppState>) -> Json<PaymentConfigResponse> {
    Json(PaymentConfigResponse {
        publishable_key: state.payments.publishable_key().to_string(),
    })
}
