mod common;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use common::{TestContext, request, send, user_with_role};
use rental_marketplace::{
    InMemoryRepository,
    error::{AppError, AppResult, ErrorCode},
    identity::{IdentityProvider, MockIdentityProvider},
    models::Role,
    repository::Repository,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Stores a competing profile for the same email while the provider call is in
/// flight, so the profile insert that follows loses the race.
struct RacingIdentityProvider {
    repo: Arc<InMemoryRepository>,
    issued: Mutex<Vec<Uuid>>,
    deleted: Mutex<Vec<Uuid>>,
    fail_delete: bool,
}

impl RacingIdentityProvider {
    fn new(repo: Arc<InMemoryRepository>, fail_delete: bool) -> Self {
        Self {
            repo,
            issued: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            fail_delete,
        }
    }
}

#[async_trait]
impl IdentityProvider for RacingIdentityProvider {
    async fn signup(&self, email: &str, _password: &str) -> AppResult<Uuid> {
        let mut rival = user_with_role(Role::Buyer);
        rival.email = email.to_string();
        self.repo.insert_user(rival)?;

        let id = Uuid::new_v4();
        self.issued.lock().unwrap().push(id);
        Ok(id)
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<()> {
        if self.fail_delete {
            return Err(AppError::IdentityProvider("delete refused".to_string()));
        }
        self.deleted.lock().unwrap().push(id);
        Ok(())
    }
}

fn signup_body(email: &str) -> serde_json::Value {
    json!({
        "email": email,
        "password": "racing-password",
        "name": "Racer",
        "role": "BUYER"
    })
}

#[tokio::test]
async fn test_failed_profile_insert_removes_identity_user() {
    let mut ctx = TestContext::new();
    let identity = Arc::new(RacingIdentityProvider::new(ctx.repo.clone(), false));
    ctx.state.identity = identity.clone();

    let (status, body) = send(
        ctx.router(),
        request(Method::POST, "/api/auth/signup", None, Some(signup_body("race@example.com"))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "EMAIL_TAKEN");

    let issued = identity.issued.lock().unwrap().clone();
    assert_eq!(issued.len(), 1);
    assert_eq!(*identity.deleted.lock().unwrap(), issued);
    assert!(ctx.repo.get_user(issued[0]).await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_rollback_still_reports_original_error() {
    let mut ctx = TestContext::new();
    let identity = Arc::new(RacingIdentityProvider::new(ctx.repo.clone(), true));
    ctx.state.identity = identity.clone();

    let (status, body) = send(
        ctx.router(),
        request(Method::POST, "/api/auth/signup", None, Some(signup_body("orphan@example.com"))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "EMAIL_TAKEN");
    assert!(identity.deleted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_mock_identity_delete_frees_email() {
    let identity = MockIdentityProvider::new();
    let id = identity.signup("Free@Example.com", "password").await.unwrap();
    assert!(identity.is_registered("free@example.com"));

    identity.delete_user(id).await.unwrap();
    assert!(!identity.is_registered("free@example.com"));
    assert!(identity.signup("free@example.com", "password").await.is_ok());

    let err = identity.delete_user(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::IdentityProviderError);
}
