#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use rental_marketplace::{
    AppConfig, AppState, InMemoryRepository, create_router,
    auth::Claims,
    identity::MockIdentityProvider,
    models::{ReferenceItem, ReferenceKind, Role, User, Vehicle, VehicleStatus},
    payments::MockPaymentProvider,
    storage::{MockStorageService, StorageState},
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "integration-test-secret-value";

/// Shared fixture: an app state backed entirely by in-process doubles, with
/// typed handles on the doubles so tests can seed and inspect them.
pub struct TestContext {
    pub repo: Arc<InMemoryRepository>,
    pub payments: Arc<MockPaymentProvider>,
    pub state: AppState,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_storage(Arc::new(MockStorageService::new()))
    }

    pub fn with_storage(storage: StorageState) -> Self {
        let mut config = AppConfig::default();
        config.jwt_secret = TEST_JWT_SECRET.to_string();
        Self::build(config, storage)
    }

    pub fn build(config: AppConfig, storage: StorageState) -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let payments = Arc::new(MockPaymentProvider::new());
        let state = AppState {
            repo: repo.clone(),
            storage,
            payments: payments.clone(),
            identity: Arc::new(MockIdentityProvider::new()),
            config,
        };
        Self {
            repo,
            payments,
            state,
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    pub fn seed_user(&self, role: Role) -> User {
        let user = user_with_role(role);
        self.repo.insert_user(user.clone()).unwrap();
        user
    }

    pub fn seed_vehicle(&self, vehicle: Vehicle) -> Vehicle {
        self.repo.insert_vehicle(vehicle.clone()).unwrap();
        vehicle
    }

    pub fn seed_reference(&self, kind: ReferenceKind, name: &str) -> ReferenceItem {
        let now = Utc::now();
        let item = ReferenceItem {
            id: Uuid::new_v4(),
            name: name.to_string(),
            make_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.repo.insert_reference(kind, item.clone()).unwrap();
        item
    }
}

pub fn user_with_role(role: Role) -> User {
    let id = Uuid::new_v4();
    User {
        id,
        email: format!("{}@example.com", id.simple()),
        name: "Test User".to_string(),
        phone: None,
        role,
        is_active: true,
        created_at: Utc::now(),
    }
}

/// A listing that satisfies every submission precondition.
pub fn complete_vehicle(seller_id: Uuid, status: VehicleStatus) -> Vehicle {
    let now = Utc::now();
    Vehicle {
        id: Uuid::new_v4(),
        seller_id,
        status,
        title: "2019 Toyota Corolla".to_string(),
        description: Some("Clean, one owner".to_string()),
        model_name: Some("Corolla".to_string()),
        model_id: None,
        make_id: Some(Uuid::new_v4()),
        type_id: Some(Uuid::new_v4()),
        fuel_type_id: Some(Uuid::new_v4()),
        year: Some(2019),
        seats: Some(5),
        daily_rate_cents: 4_500,
        location: Some("Dublin".to_string()),
        images: vec!["https://cdn.example.com/corolla.jpg".to_string()],
        is_active: true,
        is_published: false,
        submitted_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// An APPROVED, active, published listing.
pub fn public_vehicle(seller_id: Uuid) -> Vehicle {
    Vehicle {
        is_published: true,
        ..complete_vehicle(seller_id, VehicleStatus::Approved)
    }
}

pub fn token_for(user_id: Uuid, ttl: Duration) -> String {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        iat: now.timestamp() as usize,
        exp: (now + ttl).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

/// Builds a JSON request authenticated through the local `x-user-id` bypass.
pub fn request(method: Method, uri: &str, as_user: Option<Uuid>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = as_user {
        builder = builder.header("x-user-id", id.to_string());
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Sends one request through the router and decodes the JSON body (Null when empty).
pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}
