mod common;

use chrono::Duration;
use common::{TestContext, token_for};
use rental_marketplace::create_router;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use uuid::Uuid;

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
}

/// Serves the full router on an ephemeral port, backed by the in-memory doubles.
async fn spawn_app() -> TestApp {
    let ctx = TestContext::new();
    let router = create_router(ctx.state.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = reqwest::get(format!("{}/health", app.address))
        .await
        .expect("req fail");

    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = spawn_app().await;
    let response = reqwest::get(format!("{}/health", app.address)).await.unwrap();
    let request_id = response.headers().get("x-request-id").expect("x-request-id header");
    assert!(Uuid::parse_str(request_id.to_str().unwrap()).is_ok());
}

#[tokio::test]
async fn test_openapi_document_lists_routes() {
    let app = spawn_app().await;
    let doc: Value = reqwest::get(format!("{}/api-docs/openapi.json", app.address))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let paths = doc["paths"].as_object().unwrap();
    for path in [
        "/api/auth/signup",
        "/api/vehicles/{id}/submit",
        "/api/admin/vehicles/{id}/review",
        "/api/bookings",
        "/api/stripe/connect/onboarding",
        "/api/upload",
    ] {
        assert!(paths.contains_key(path), "missing {path}");
    }
}

#[tokio::test]
async fn test_signup_then_session_flow() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let signup = client
        .post(format!("{}/api/auth/signup", app.address))
        .json(&json!({
            "email": "flow@example.com",
            "password": "flow-password",
            "name": "Flow Buyer",
            "role": "BUYER"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(signup.status(), reqwest::StatusCode::CREATED);
    let user: Value = signup.json().await.unwrap();
    let user_id = Uuid::parse_str(user["id"].as_str().unwrap()).unwrap();

    // No credentials.
    let anonymous = client
        .get(format!("{}/api/me", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status(), reqwest::StatusCode::UNAUTHORIZED);

    let me: Value = client
        .get(format!("{}/api/me", app.address))
        .bearer_auth(token_for(user_id, Duration::hours(1)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["email"], "flow@example.com");
    assert_eq!(me["role"], "BUYER");

    // Buyers are kept out of seller routes.
    let forbidden = client
        .get(format!("{}/api/vehicles", app.address))
        .bearer_auth(token_for(user_id, Duration::hours(1)))
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status(), reqwest::StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = spawn_app().await;
    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, format!("{}/api/vehicles/public", app.address))
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "GET")
        .send()
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}
