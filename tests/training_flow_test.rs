mod common;

use axum::http::StatusCode;
use campus_gym::config::DatabaseSeeder;
use campus_gym::models::MonthBounds;
use common::TestApp;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use serial_test::serial;
use uuid::Uuid;

async fn seeded_app() -> TestApp {
    let app = TestApp::spawn().await;
    DatabaseSeeder::new(app.db.clone()).seed_all().await.unwrap();
    app
}

async fn first_exercise(app: &TestApp, token: &str, category: &str) -> String {
    let (status, exercises) = app
        .get(&format!("/api/exercises?category={}", category), token)
        .await;
    assert_eq!(status, StatusCode::OK);
    exercises[0]["id"].as_str().unwrap().to_string()
}

async fn create_routine(app: &TestApp, token: &str, name: &str) -> Value {
    let (status, routine) = app
        .post(
            "/api/routines",
            token,
            json!({ "name": name, "frequency": "weekly", "weekdays": "mon,thu" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    routine
}

async fn sessions_logged(app: &TestApp, account_id: &str, bounds: MonthBounds) -> i32 {
    sqlx::query_scalar(
        "SELECT COALESCE(
             (SELECT sessions_logged FROM user_monthly_stats
              WHERE account_id = $1 AND year = $2 AND month = $3),
             0)",
    )
    .bind(Uuid::parse_str(account_id).unwrap())
    .bind(bounds.year)
    .bind(bounds.month as i16)
    .fetch_one(&app.db)
    .await
    .unwrap()
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn logging_progress_updates_dashboard_and_rollups() {
    let app = seeded_app().await;
    let token = app.login("laura.gomez", "laura123").await;
    let squat = first_exercise(&app, &token, "strength").await;

    let routine = create_routine(&app, &token, "Leg day").await;
    let routine_id = routine["id"].as_str().unwrap();

    let (status, item) = app
        .post(
            &format!("/api/routines/{}/items", routine_id),
            &token,
            json!({ "exercise_id": squat, "sets": 4, "reps": 8 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(item["position"], 1);

    let (status, log) = app
        .post(
            "/api/progress",
            &token,
            json!({
                "routine_id": routine_id,
                "repetitions": 32,
                "effort": 7,
                "metrics": { "heart_rate_avg": 132 }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, dashboard) = app.get("/api/dashboard", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["total_routines"], 1);
    assert_eq!(dashboard["total_sessions"], 1);
    assert_eq!(dashboard["month"]["sessions"], 1);
    assert_eq!(dashboard["month"]["average_effort"], 7.0);
    assert_eq!(dashboard["stats"]["routines_started"], 1);
    assert_eq!(dashboard["stats"]["sessions_logged"], 1);
    assert_eq!(dashboard["profile"]["student_id"], "S001");

    let (status, adherence) = app.get("/api/reports/adherence", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(adherence["active_days"], 1);
    assert_eq!(adherence["by_category"][0]["category"], "strength");

    app.state.relay.drain_all().await.unwrap();
    let (status, detail) = app
        .get(&format!("/api/progress/{}/details", log["id"].as_str().unwrap()), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["details"]["metrics"]["heart_rate_avg"], 132);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn routine_items_need_a_volume() {
    let app = seeded_app().await;
    let token = app.login("laura.gomez", "laura123").await;
    let exercise = first_exercise(&app, &token, "mobility").await;
    let routine = create_routine(&app, &token, "Stretching").await;

    let (status, body) = app
        .post(
            &format!("/api/routines/{}/items", routine["id"].as_str().unwrap()),
            &token,
            json!({ "exercise_id": exercise, "sets": 3 }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_failed");
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn progress_only_on_own_routines() {
    let app = seeded_app().await;
    let laura = app.login("laura.gomez", "laura123").await;
    let marta = app.login("marta.diaz", "marta123").await;
    let routine = create_routine(&app, &laura, "Cardio base").await;

    let (status, _) = app
        .post(
            "/api/progress",
            &marta,
            json!({ "routine_id": routine["id"], "seconds": 1200 }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .get(&format!("/api/routines/{}", routine["id"].as_str().unwrap()), &marta)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn exercise_in_use_cannot_be_deleted() {
    let app = seeded_app().await;
    let token = app.login("laura.gomez", "laura123").await;

    let (status, exercise) = app
        .post(
            "/api/exercises",
            &token,
            json!({ "name": "Stair climb", "category": "cardio", "duration_min": 15, "difficulty": 2 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(exercise["is_custom"], true);

    let routine = create_routine(&app, &token, "Stairs").await;
    let (status, _) = app
        .post(
            &format!("/api/routines/{}/items", routine["id"].as_str().unwrap()),
            &token,
            json!({ "exercise_id": exercise["id"], "seconds": 600 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .delete(&format!("/api/exercises/{}", exercise["id"].as_str().unwrap()), &token)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn adopting_a_preset_copies_its_items() {
    let app = seeded_app().await;
    let trainer = app.login("carlos.ruiz", "carlos123").await;
    let student = app.login("laura.gomez", "laura123").await;
    let exercise = first_exercise(&app, &trainer, "cardio").await;

    let (status, preset) = app
        .post("/api/trainer/presets", &trainer, json!({ "name": "Beginner cardio" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(preset["is_template"], true);
    let preset_id = preset["id"].as_str().unwrap();

    let (status, _) = app
        .post(
            &format!("/api/routines/{}/items", preset_id),
            &trainer,
            json!({ "exercise_id": exercise, "seconds": 900 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, presets) = app.get("/api/routines/presets", &student).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(presets.as_array().unwrap().len(), 1);

    let (status, adopted) = app
        .post(&format!("/api/routines/{}/adopt", preset_id), &student, json!({}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(adopted["routine"]["name"], "Beginner cardio (my copy)");
    assert_eq!(adopted["routine"]["is_template"], false);
    assert_eq!(adopted["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn deleting_a_routine_recounts_every_month_it_had_sessions_in() {
    let app = seeded_app().await;
    let token = app.login("laura.gomez", "laura123").await;
    let account_id = app.account_id(&token).await;
    let routine = create_routine(&app, &token, "Old plan").await;
    let routine_id = routine["id"].as_str().unwrap();

    let last_month = MonthBounds::current().previous();
    let (status, _) = app
        .post(
            "/api/progress",
            &token,
            json!({ "routine_id": routine_id, "logged_on": last_month.start, "seconds": 900 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sessions_logged(&app, &account_id, last_month).await, 1);

    let (status, _) = app.delete(&format!("/api/routines/{}", routine_id), &token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM progress_logs")
        .fetch_one(&app.db)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
    assert_eq!(sessions_logged(&app, &account_id, last_month).await, 0);

    let (_, dashboard) = app.get("/api/dashboard", &token).await;
    assert_eq!(dashboard["stats"]["routines_started"], 0);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn concurrent_sessions_both_count() {
    let app = seeded_app().await;
    let token = app.login("laura.gomez", "laura123").await;
    let account_id = app.account_id(&token).await;
    let routine = create_routine(&app, &token, "Twice a day").await;
    let body = json!({ "routine_id": routine["id"], "repetitions": 20 });

    let (first, second) = tokio::join!(
        app.post("/api/progress", &token, body.clone()),
        app.post("/api/progress", &token, body.clone()),
    );
    assert_eq!(first.0, StatusCode::CREATED);
    assert_eq!(second.0, StatusCode::CREATED);

    assert_eq!(sessions_logged(&app, &account_id, MonthBounds::current()).await, 2);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn load_balance_sums_volume_per_category() {
    let app = seeded_app().await;
    let token = app.login("laura.gomez", "laura123").await;
    let squat = first_exercise(&app, &token, "strength").await;
    let routine = create_routine(&app, &token, "Strength block").await;
    let routine_id = routine["id"].as_str().unwrap();

    let (status, _) = app
        .post(
            &format!("/api/routines/{}/items", routine_id),
            &token,
            json!({ "exercise_id": squat, "sets": 3, "reps": 10 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    for (repetitions, seconds) in [(30, 600), (24, 540)] {
        let (status, _) = app
            .post(
                "/api/progress",
                &token,
                json!({ "routine_id": routine_id, "repetitions": repetitions, "seconds": seconds }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, rows) = app.get("/api/reports/load-balance", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        rows,
        json!([{ "category": "strength", "total_repetitions": 54, "total_seconds": 1140 }])
    );
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn progress_history_reads_the_mirrored_month() {
    let app = seeded_app().await;
    let token = app.login("laura.gomez", "laura123").await;
    let routine = create_routine(&app, &token, "Intervals").await;
    let last_month = MonthBounds::current().previous();

    for (logged_on, tag) in [(None, "today"), (Some(last_month.start), "earlier")] {
        let (status, _) = app
            .post(
                "/api/progress",
                &token,
                json!({
                    "routine_id": routine["id"],
                    "logged_on": logged_on,
                    "seconds": 1200,
                    "tags": [tag]
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, history) = app.get("/api/progress/history", &token).await;
    assert_eq!(history["entries"], json!([]));

    app.state.relay.drain_all().await.unwrap();

    let (status, history) = app.get("/api/progress/history", &token).await;
    assert_eq!(status, StatusCode::OK);
    let entries = history["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["tags"], json!(["today"]));

    let (status, history) = app
        .get(
            &format!("/api/progress/history?year={}&month={}", last_month.year, last_month.month),
            &token,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["month"], last_month.month);
    assert_eq!(history["entries"][0]["tags"], json!(["earlier"]));

    let (status, _) = app.get("/api/progress/history?year=2025", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
