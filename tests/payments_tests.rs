mod common;

use axum::http::{Method, StatusCode};
use common::{TestContext, request, send};
use rental_marketplace::{
    error::ErrorCode,
    models::Role,
    payments::{MockPaymentProvider, PaymentProvider},
    repository::Repository,
};
use std::sync::Arc;

// --- Provider double ---

#[tokio::test]
async fn test_mock_provider_behaviour() {
    let provider = MockPaymentProvider::new();
    assert_eq!(provider.publishable_key(), "pk_test_mock");

    let account = provider.create_connected_account("seller@example.com").await.unwrap();
    assert!(account.id.starts_with("acct_mock_"));
    assert!(!account.details_submitted);

    provider.set_details_submitted(true);
    let refreshed = provider.retrieve_account(&account.id).await.unwrap();
    assert_eq!(refreshed.id, account.id);
    assert!(refreshed.details_submitted);
    assert!(refreshed.payouts_enabled);

    let failing = MockPaymentProvider::new_failing();
    let err = failing.retrieve_account("acct_x").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::PaymentProviderError);
}

// --- Connect endpoints ---

#[tokio::test]
async fn test_status_without_account() {
    let ctx = TestContext::new();
    let seller = ctx.seed_user(Role::Seller);

    let (status, body) = send(
        ctx.router(),
        request(Method::GET, "/api/stripe/connect/status", Some(seller.id), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hasAccount"], false);
    assert_eq!(body["detailsSubmitted"], false);
}

#[tokio::test]
async fn test_onboarding_creates_account_once_and_links_are_fresh() {
    let ctx = TestContext::new();
    let seller = ctx.seed_user(Role::Seller);
    let onboard = || request(Method::POST, "/api/stripe/connect/onboarding", Some(seller.id), None);

    let (status, first) = send(ctx.router(), onboard()).await;
    assert_eq!(status, StatusCode::OK);
    let account = ctx.repo.get_payment_account(seller.id).await.unwrap().unwrap();
    assert!(first["url"].as_str().unwrap().contains(&account.account_id));

    let (status, second) = send(ctx.router(), onboard()).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(first["url"], second["url"]);

    // Same connected account on the second call.
    let again = ctx.repo.get_payment_account(seller.id).await.unwrap().unwrap();
    assert_eq!(again.account_id, account.account_id);

    let (_, status_body) = send(
        ctx.router(),
        request(Method::GET, "/api/stripe/connect/status", Some(seller.id), None),
    )
    .await;
    assert_eq!(status_body["hasAccount"], true);
    assert_eq!(status_body["detailsSubmitted"], false);
}

#[tokio::test]
async fn test_status_refreshes_from_processor() {
    let ctx = TestContext::new();
    let seller = ctx.seed_user(Role::Seller);
    send(
        ctx.router(),
        request(Method::POST, "/api/stripe/connect/onboarding", Some(seller.id), None),
    )
    .await;

    ctx.payments.set_details_submitted(true);

    let (_, body) = send(
        ctx.router(),
        request(Method::GET, "/api/stripe/connect/status", Some(seller.id), None),
    )
    .await;
    assert_eq!(body["detailsSubmitted"], true);
    assert_eq!(body["chargesEnabled"], true);

    let stored = ctx.repo.get_payment_account(seller.id).await.unwrap().unwrap();
    assert!(stored.details_submitted);
}

#[tokio::test]
async fn test_dashboard_link_requirements() {
    let ctx = TestContext::new();
    let seller = ctx.seed_user(Role::Seller);
    let dashboard = || request(Method::POST, "/api/stripe/connect/dashboard", Some(seller.id), None);

    let (status, body) = send(ctx.router(), dashboard()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    send(
        ctx.router(),
        request(Method::POST, "/api/stripe/connect/onboarding", Some(seller.id), None),
    )
    .await;

    let (status, body) = send(ctx.router(), dashboard()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_STATE");

    ctx.payments.set_details_submitted(true);
    let (status, body) = send(ctx.router(), dashboard()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["url"].as_str().unwrap().starts_with("https://connect.mock.test/express/"));
}

#[tokio::test]
async fn test_processor_failure_is_bad_gateway() {
    let mut ctx = TestContext::new();
    ctx.state.payments = Arc::new(MockPaymentProvider::new_failing());
    let seller = ctx.seed_user(Role::Seller);

    let (status, body) = send(
        ctx.router(),
        request(Method::POST, "/api/stripe/connect/onboarding", Some(seller.id), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "PAYMENT_PROVIDER_ERROR");
    // The provider's own message is not leaked.
    assert!(!body["error"].as_str().unwrap().contains("Simulation"));

    assert!(ctx.repo.get_payment_account(seller.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_payment_config_is_public() {
    let ctx = TestContext::new();
    let (status, body) = send(ctx.router(), request(Method::GET, "/api/stripe/config", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["publishableKey"], "pk_test_mock");
}
