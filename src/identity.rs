use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::{
    config::IdentityConfig,
    error::{AppError, AppResult},
};

/// IdentityProvider
///
/// Owns credentials. This service only asks it to create a user and keeps the
/// returned id as the profile's primary key.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Creates the provider-side user. Fails with `EmailTaken` when the provider
    /// rejects the address.
    async fn signup(&self, email: &str, password: &str) -> AppResult<Uuid>;

    /// Removes a provider-side user. Used to roll back a signup whose profile
    /// could not be stored.
    async fn delete_user(&self, id: Uuid) -> AppResult<()>;
}

pub type IdentityState = Arc<dyn IdentityProvider>;

#[derive(Deserialize)]
struct SignupResponse {
    id: Option<Uuid>,
    user: Option<SignupUser>,
}

#[derive(Deserialize)]
struct SignupUser {
    id: Uuid,
}

/// SupabaseIdentityClient
///
/// Calls the GoTrue signup endpoint (`{url}/auth/v1/signup`) with the project's
/// API key. Deleting a user goes through the admin API and needs the service-role
/// key.
#[derive(Clone)]
pub struct SupabaseIdentityClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl SupabaseIdentityClient {
    pub fn new(config: &IdentityConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl IdentityProvider for SupabaseIdentityClient {
    async fn signup(&self, email: &str, password: &str) -> AppResult<Uuid> {
        let response = self
            .http
            .post(format!("{}/auth/v1/signup", self.url))
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AppError::IdentityProvider(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            // GoTrue answers 400/422 for an already-registered address.
            tracing::warn!(status = %status, "identity provider rejected signup");
            return Err(AppError::EmailTaken);
        }
        if !status.is_success() {
            return Err(AppError::IdentityProvider(format!("signup returned {}", status)));
        }

        // Depending on confirmation settings the user is either the body or nested under `user`.
        let body: SignupResponse = response
            .json()
            .await
            .map_err(|e| AppError::IdentityProvider(e.to_string()))?;
        body.id
            .or(body.user.map(|u| u.id))
            .ok_or_else(|| AppError::IdentityProvider("signup response carried no user id".into()))
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<()> {
        let response = self
            .http
            .delete(format!("{}/auth/v1/admin/users/{}", self.url, id))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AppError::IdentityProvider(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::IdentityProvider(format!("delete user returned {}", status)));
        }
        Ok(())
    }
}

/// MockIdentityProvider
///
/// Remembers the emails it has issued ids for and rejects repeats.
#[derive(Default)]
pub struct MockIdentityProvider {
    pub should_fail: bool,
    registered: Mutex<Vec<(Uuid, String)>>,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn is_registered(&self, email: &str) -> bool {
        let email = email.to_lowercase();
        self.registered
            .lock()
            .map(|registered| registered.iter().any(|(_, e)| *e == email))
            .unwrap_or(false)
    }

    fn registered(&self) -> AppResult<std::sync::MutexGuard<'_, Vec<(Uuid, String)>>> {
        self.registered
            .lock()
            .map_err(|_| AppError::Internal("mock identity lock poisoned".into()))
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn signup(&self, email: &str, _password: &str) -> AppResult<Uuid> {
        if self.should_fail {
            return Err(AppError::IdentityProvider(
                "Mock Identity Error: Simulation requested".to_string(),
            ));
        }
        let mut registered = self.registered()?;
        let email = email.to_lowercase();
        if registered.iter().any(|(_, e)| *e == email) {
            return Err(AppError::EmailTaken);
        }
        let id = Uuid::new_v4();
        registered.push((id, email));
        Ok(id)
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<()> {
        let mut registered = self.registered()?;
        let before = registered.len();
        registered.retain(|(user_id, _)| *user_id != id);
        if registered.len() == before {
            return Err(AppError::IdentityProvider(format!("no user {}", id)));
        }
        Ok(())
    }
}
