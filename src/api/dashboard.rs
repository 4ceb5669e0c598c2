use axum::{extract::State, response::Json, routing::get, Extension, Router};

use super::{ApiResult, AppState};
use crate::auth::UserSession;
use crate::models::{AdherenceReport, LoadBalanceRow, UserDashboard};

pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/", get(user_dashboard))
}

pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/adherence", get(adherence))
        .route("/load-balance", get(load_balance))
}

#[tracing::instrument(skip(state, session))]
async fn user_dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> ApiResult<Json<UserDashboard>> {
    Ok(Json(state.dashboards.user(&session).await?))
}

/// Training days and sessions per category for the current month
async fn adherence(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> ApiResult<Json<AdherenceReport>> {
    Ok(Json(state.dashboards.adherence(session.account_id).await?))
}

async fn load_balance(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> ApiResult<Json<Vec<LoadBalanceRow>>> {
    Ok(Json(state.dashboards.load_balance(session.account_id).await?))
}
