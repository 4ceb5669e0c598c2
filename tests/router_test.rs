mod common;

use axum::http::{Method, StatusCode};
use campus_gym::auth::Role;
use common::TestApp;
use pretty_assertions::assert_eq;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn health_reports_each_component() {
    let app = TestApp::offline();

    let (status, body) = app.request(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "campus-gym");
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["database"], "down");
    assert_eq!(body["checks"]["document_store"]["backend"], "memory");
    assert_eq!(body["checks"]["document_store"]["status"], "up");
}

#[tokio::test]
async fn protected_routes_require_a_bearer_token() {
    let app = TestApp::offline();

    let (status, body) = app.request(Method::GET, "/api/dashboard", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Missing authorization header");
}

#[tokio::test]
async fn non_bearer_scheme_is_rejected() {
    let app = TestApp::offline();
    let request = axum::http::Request::builder()
        .uri("/api/routines")
        .header("authorization", "Basic bGF1cmE6c2VjcmV0")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = tower::ServiceExt::oneshot(app.router.clone(), request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_token_is_rejected() {
    let app = TestApp::offline();

    let (status, _) = app.get("/api/exercises", "not-a-jwt").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_token_cannot_open_a_session() {
    let app = TestApp::offline();
    let refresh = app
        .state
        .auth
        .jwt()
        .create_refresh_token(Uuid::new_v4(), "laura.gomez", Role::Student)
        .unwrap();

    let (status, _) = app.get("/api/dashboard", &refresh).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_signed_with_another_secret_is_rejected() {
    let app = TestApp::offline();
    let forged = campus_gym::auth::JwtService::new("some-other-secret-entirely-here")
        .create_access_token(Uuid::new_v4(), "ana.lopez", Role::Admin)
        .unwrap();

    let (status, _) = app.get("/api/admin/dashboard", &forged).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_login_body_gets_a_json_error() {
    let app = TestApp::offline();
    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{\"username\": "))
        .unwrap();

    let response = tower::ServiceExt::oneshot(app.router.clone(), request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn logout_without_token_is_unauthorized() {
    let app = TestApp::offline();

    let (status, body) = app
        .request(Method::POST, "/api/auth/logout", None, Some(json!({})))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Missing authorization header");
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let app = TestApp::offline();
    let request = axum::http::Request::builder()
        .uri("/health")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = tower::ServiceExt::oneshot(app.router.clone(), request).await.unwrap();

    assert_eq!(
        response.headers().get("x-content-type-options").map(|v| v.to_str().unwrap()),
        Some("nosniff")
    );
}
