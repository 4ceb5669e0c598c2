mod common;

use axum::http::{Method, StatusCode};
use campus_gym::auth::Role;
use common::TestApp;
use pretty_assertions::assert_eq;
use serde_json::json;
use serial_test::serial;
use uuid::Uuid;

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn institutional_login_creates_local_account() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "laura.gomez", "password": "laura123" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["account"]["username"], "laura.gomez");
    assert_eq!(body["account"]["role"], "student");
    assert!(body["refresh_token"].is_string());

    let token = body["access_token"].as_str().unwrap();
    let (status, me) = app.get("/api/auth/me", token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "laura.gomez@campus.edu");
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn every_login_failure_looks_the_same() {
    let app = TestApp::spawn().await;

    for (username, password) in [
        ("laura.gomez", "wrong-password"),
        ("juan.perez", "juan123"),
        ("nobody.here", "whatever1"),
        ("laura.gomez", ""),
    ] {
        let (status, body) = app
            .request(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", username);
        assert_eq!(body["error"], "Invalid credentials");
    }
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn directory_role_never_downgrades_a_promoted_account() {
    let app = TestApp::spawn().await;
    let token = app.login("laura.gomez", "laura123").await;
    let account_id: Uuid = app.account_id(&token).await.parse().unwrap();

    app.state.auth.set_role(account_id, Role::Admin).await.unwrap();

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "laura.gomez", "password": "laura123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["account"]["role"], "admin");
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn local_account_logs_in_with_bcrypt_password() {
    let app = TestApp::spawn().await;
    app.state
        .auth
        .create_local_account("gym.admin", "gym.admin@campus.edu", "a-strong-passphrase", Role::Admin)
        .await
        .unwrap();

    let token = app.login("gym.admin", "a-strong-passphrase").await;
    let (status, _) = app.get("/api/admin/dashboard", &token).await;
    assert_eq!(status, StatusCode::OK);

    let duplicate = app
        .state
        .auth
        .create_local_account("gym.admin", "other@campus.edu", "another-passphrase", Role::Student)
        .await;
    assert!(duplicate.is_err());
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn logout_revokes_the_access_token() {
    let app = TestApp::spawn().await;
    let token = app.login("carlos.ruiz", "carlos123").await;

    let (status, _) = app.request(Method::POST, "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/api/auth/me", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn refresh_issues_a_new_access_token() {
    let app = TestApp::spawn().await;
    let (_, body) = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "marta.diaz", "password": "marta123" })),
        )
        .await;
    let refresh = body["refresh_token"].as_str().unwrap().to_string();

    let (status, refreshed) = app
        .request(
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let access = refreshed["access_token"].as_str().unwrap();
    let (status, me) = app.get("/api/auth/me", access).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["role"], "employee");
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn role_guards_protect_trainer_and_admin_routes() {
    let app = TestApp::spawn().await;
    let student = app.login("laura.gomez", "laura123").await;
    let trainer = app.login("carlos.ruiz", "carlos123").await;

    assert_eq!(app.get("/api/trainer/assignees", &student).await.0, StatusCode::FORBIDDEN);
    assert_eq!(app.get("/api/trainer/assignees", &trainer).await.0, StatusCode::OK);
    assert_eq!(app.get("/api/admin/accounts", &trainer).await.0, StatusCode::FORBIDDEN);
}
