use async_trait::async_trait;
use serde::Deserialize;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use uuid::Uuid;

use crate::{
    config::StripeConfig,
    error::{AppError, AppResult},
};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// AccountSnapshot
///
/// The processor's current view of a connected account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AccountSnapshot {
    pub id: String,
    #[serde(default)]
    pub details_submitted: bool,
    #[serde(default)]
    pub charges_enabled: bool,
    #[serde(default)]
    pub payouts_enabled: bool,
}

/// PaymentProvider
///
/// Connected-account operations at the payment processor. Links returned by the
/// processor are single-use and short-lived, so callers must never cache them.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Key handed to the browser SDK.
    fn publishable_key(&self) -> &str;

    async fn create_connected_account(&self, email: &str) -> AppResult<AccountSnapshot>;

    async fn retrieve_account(&self, account_id: &str) -> AppResult<AccountSnapshot>;

    async fn create_onboarding_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> AppResult<String>;

    async fn create_dashboard_link(&self, account_id: &str) -> AppResult<String>;
}

pub type PaymentState = Arc<dyn PaymentProvider>;

#[derive(Deserialize)]
struct LinkObject {
    url: String,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

/// StripeClient
///
/// Talks to the Stripe REST API with form-encoded bodies and bearer auth.
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    publishable_key: String,
    base_url: String,
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: config.secret_key.clone(),
            publishable_key: config.publishable_key.clone(),
            base_url: STRIPE_API_BASE.to_string(),
        }
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> AppResult<T> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::PaymentProvider(e.to_string()))?;
        Self::decode(path, response).await
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> AppResult<T> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| AppError::PaymentProvider(e.to_string()))?;
        Self::decode(path, response).await
    }

    async fn decode<T: for<'de> Deserialize<'de>>(
        path: &str,
        response: reqwest::Response,
    ) -> AppResult<T> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| "no error message".to_string());
            return Err(AppError::PaymentProvider(format!(
                "{} returned {}: {}",
                path, status, message
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| AppError::PaymentProvider(format!("{}: {}", path, e)))
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    fn publishable_key(&self) -> &str {
        &self.publishable_key
    }

    async fn create_connected_account(&self, email: &str) -> AppResult<AccountSnapshot> {
        let account: AccountSnapshot = self
            .post(
                "/accounts",
                &[
                    ("type", "express"),
                    ("email", email),
                    ("capabilities[card_payments][requested]", "true"),
                    ("capabilities[transfers][requested]", "true"),
                ],
            )
            .await?;
        tracing::info!(account_id = %account.id, "created connected account");
        Ok(account)
    }

    async fn retrieve_account(&self, account_id: &str) -> AppResult<AccountSnapshot> {
        self.get(&format!("/accounts/{}", account_id)).await
    }

    async fn create_onboarding_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> AppResult<String> {
        let link: LinkObject = self
            .post(
                "/account_links",
                &[
                    ("account", account_id),
                    ("refresh_url", refresh_url),
                    ("return_url", return_url),
                    ("type", "account_onboarding"),
                ],
            )
            .await?;
        Ok(link.url)
    }

    async fn create_dashboard_link(&self, account_id: &str) -> AppResult<String> {
        let link: LinkObject = self
            .post(&format!("/accounts/{}/login_links", account_id), &[])
            .await?;
        Ok(link.url)
    }
}

/// MockPaymentProvider
///
/// In-process processor double. Accounts report `details_submitted` as
/// configured; every link carries a fresh nonce so tests can see links are
/// regenerated per request.
#[derive(Default)]
pub struct MockPaymentProvider {
    pub should_fail: bool,
    details_submitted: AtomicBool,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Simulates the seller finishing (or not) the hosted onboarding flow.
    pub fn set_details_submitted(&self, submitted: bool) {
        self.details_submitted.store(submitted, Ordering::SeqCst);
    }

    fn check(&self) -> AppResult<()> {
        if self.should_fail {
            return Err(AppError::PaymentProvider(
                "Mock Payment Error: Simulation requested".to_string(),
            ));
        }
        Ok(())
    }

    fn snapshot(&self, id: String) -> AccountSnapshot {
        let submitted = self.details_submitted.load(Ordering::SeqCst);
        AccountSnapshot {
            id,
            details_submitted: submitted,
            charges_enabled: submitted,
            payouts_enabled: submitted,
        }
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    fn publishable_key(&self) -> &str {
        "pk_test_mock"
    }

    async fn create_connected_account(&self, _email: &str) -> AppResult<AccountSnapshot> {
        self.check()?;
        Ok(self.snapshot(format!("acct_mock_{}", Uuid::new_v4().simple())))
    }

    async fn retrieve_account(&self, account_id: &str) -> AppResult<AccountSnapshot> {
        self.check()?;
        Ok(self.snapshot(account_id.to_string()))
    }

    async fn create_onboarding_link(
        &self,
        account_id: &str,
        _refresh_url: &str,
        _return_url: &str,
    ) -> AppResult<String> {
        self.check()?;
        Ok(format!(
            "https://connect.mock.test/setup/{}/{}",
            account_id,
            Uuid::new_v4().simple()
        ))
    }

    async fn create_dashboard_link(&self, account_id: &str) -> AppResult<String> {
        self.check()?;
        Ok(format!(
            "https://connect.mock.test/express/{}/{}",
            account_id,
            Uuid::new_v4().simple()
        ))
    }
}
