use axum::{extract::State, response::Json};
use serde_json::{json, Value};
use tracing::warn;

use super::AppState;

/// Liveness plus a snapshot of each backing service. Always answers 200 so
/// a degraded mirror never takes the API out of rotation.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let database = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db)
        .await
        .map(|_| "up")
        .unwrap_or_else(|e| {
            warn!(error = %e, "health check: database unreachable");
            "down"
        });

    let institutional = match state.identity.ping().await {
        Ok(()) => "up",
        Err(_) => "down",
    };

    let documents = if !state.store.is_enabled() {
        "disabled"
    } else if state.store.ping().await.is_ok() {
        "up"
    } else {
        "down"
    };

    let outbox = state.relay.status().await.ok();
    let status = if database == "up" { "healthy" } else { "degraded" };

    Json(json!({
        "status": status,
        "service": "campus-gym",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "checks": {
            "database": database,
            "institutional": institutional,
            "document_store": {
                "backend": state.store.backend_name(),
                "status": documents,
            },
            "outbox": outbox,
        }
    }))
}
