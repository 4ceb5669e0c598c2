mod common;

use assert_matches::assert_matches;
use axum::http::StatusCode;
use campus_gym::config::DatabaseSeeder;
use campus_gym::documents::{Collection, Document, OutboxStatus};
use common::TestApp;
use pretty_assertions::assert_eq;
use serde_json::json;
use serial_test::serial;

async fn log_one_session(app: &TestApp, token: &str) -> String {
    DatabaseSeeder::new(app.db.clone()).seed_exercises().await.unwrap();
    let (_, routine) = app.post("/api/routines", token, json!({ "name": "Morning run" })).await;
    let (status, log) = app
        .post(
            "/api/progress",
            token,
            json!({
                "routine_id": routine["id"],
                "seconds": 1800,
                "effort": 6,
                "tags": ["outdoor"]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    log["id"].as_str().unwrap().to_string()
}

async fn make_due(app: &TestApp) {
    sqlx::query("UPDATE document_outbox SET next_attempt_at = NOW()")
        .execute(&app.db)
        .await
        .unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn committed_writes_reach_the_document_store() {
    let app = TestApp::spawn().await;
    let token = app.login("laura.gomez", "laura123").await;
    let account_id = app.account_id(&token).await;
    let log_id = log_one_session(&app, &token).await;

    assert_eq!(app.documents.len().await, 0);
    let report = app.state.relay.drain_all().await.unwrap();
    assert!(report.delivered >= 3);

    let mirrored = app.documents.find(Collection::ProgressLogs, &log_id).await.unwrap();
    assert_matches!(mirrored, Some(Document { collection: Collection::ProgressLogs, .. }));
    let body = mirrored.unwrap().body;
    assert_eq!(body["seconds"], 1800);
    assert_eq!(body["tags"], json!(["outdoor"]));
    assert_eq!(body["metrics"], json!({}));

    let activity = app
        .documents
        .find_by_user(Collection::UserActivityLogs, &account_id, None, 10)
        .await
        .unwrap();
    let actions: Vec<&str> = activity.iter().filter_map(|d| d.body["action"].as_str()).collect();
    assert!(actions.contains(&"login"), "activity was {:?}", actions);

    let status = app.state.relay.status().await.unwrap();
    assert_eq!(status.pending, 0);
    assert_eq!(status.failed, 0);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn store_outage_keeps_rows_pending() {
    let app = TestApp::spawn().await;
    let token = app.login("laura.gomez", "laura123").await;
    let log_id = log_one_session(&app, &token).await;

    app.documents.set_unavailable(true);
    let report = app.state.relay.drain_all().await.unwrap();
    assert_eq!(report.delivered, 0);
    assert!(report.retried > 0);

    let status = app.state.relay.status().await.unwrap();
    assert!(status.pending > 0);
    assert_eq!(status.delivered, 0);

    // Retried rows are not due again until their backoff passes.
    assert_eq!(app.state.relay.drain_once().await.unwrap().retried, 0);

    app.documents.set_unavailable(false);
    make_due(&app).await;
    app.state.relay.drain_all().await.unwrap();

    assert_eq!(
        app.state.relay.status().await.unwrap(),
        OutboxStatus { pending: 0, failed: 0, delivered: status.pending }
    );
    assert!(app.documents.find(Collection::ProgressLogs, &log_id).await.unwrap().is_some());
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn parked_rows_can_be_requeued() {
    let app = TestApp::spawn().await;
    let token = app.login("laura.gomez", "laura123").await;
    log_one_session(&app, &token).await;

    app.documents.set_unavailable(true);
    for _ in 0..3 {
        app.state.relay.drain_all().await.unwrap();
        make_due(&app).await;
    }
    let status = app.state.relay.status().await.unwrap();
    assert_eq!(status.pending, 0);
    assert!(status.failed > 0);

    let (_, health) = app.request(axum::http::Method::GET, "/health", None, None).await;
    assert_eq!(health["checks"]["outbox"]["failed"], status.failed);

    app.documents.set_unavailable(false);
    let requeued = app.state.relay.requeue_failed().await.unwrap();
    assert_eq!(requeued, status.failed as u64);
    app.state.relay.drain_all().await.unwrap();

    let after = app.state.relay.status().await.unwrap();
    assert_eq!(after.failed, 0);
    assert_eq!(after.delivered, status.failed);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn purge_drops_only_old_delivered_rows() {
    let app = TestApp::spawn().await;
    let token = app.login("laura.gomez", "laura123").await;
    let log_id = log_one_session(&app, &token).await;
    app.state.relay.drain_all().await.unwrap();

    let backdated = sqlx::query(
        "UPDATE document_outbox SET delivered_at = NOW() - INTERVAL '8 days'
         WHERE status = 'delivered' AND document_key <> $1",
    )
    .bind(&log_id)
    .execute(&app.db)
    .await
    .unwrap()
    .rows_affected();
    assert!(backdated >= 2);

    app.documents.set_unavailable(true);
    log_one_session(&app, &token).await;
    app.state.relay.drain_all().await.unwrap();
    app.documents.set_unavailable(false);
    let before = app.state.relay.status().await.unwrap();
    assert!(before.pending > 0);

    let purged = app.state.relay.purge_delivered().await.unwrap();
    assert_eq!(purged, backdated);

    let after = app.state.relay.status().await.unwrap();
    assert_eq!(
        after,
        OutboxStatus {
            pending: before.pending,
            failed: 0,
            delivered: 1,
        }
    );
    assert_eq!(app.state.relay.purge_delivered().await.unwrap(), 0);
}
