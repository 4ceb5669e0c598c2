use axum::{extract::State, response::Json, routing::get, Extension, Router};
use axum_extra::extract::WithRejection;

use super::{ApiError, ApiResult, AppState};
use crate::auth::UserSession;
use crate::models::{HealthProfileView, UpsertHealthProfileRequest};

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/", get(get_profile).put(upsert_profile))
}

/// `null` until the caller fills the profile in
async fn get_profile(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> ApiResult<Json<Option<HealthProfileView>>> {
    Ok(Json(state.profiles.get(session.account_id).await?))
}

#[tracing::instrument(skip(state, session, request), fields(account_id = %session.account_id))]
async fn upsert_profile(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Json(request), _): WithRejection<Json<UpsertHealthProfileRequest>, ApiError>,
) -> ApiResult<Json<HealthProfileView>> {
    Ok(Json(state.profiles.upsert(session.account_id, request).await?))
}
