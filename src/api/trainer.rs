use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use super::{ApiError, ApiResult, AppState};
use crate::auth::UserSession;
use crate::models::{
    Assignee, AssigneeDetail, CreateRecommendationRequest, CreateRoutineRequest, Routine, TrainerDashboard,
    TrainerRecommendation,
};

/// Routes for employees and admins; the trainer guard is applied by the caller.
pub fn trainer_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(trainer_dashboard))
        .route("/assignees", get(list_assignees))
        .route("/assignees/:user_id", get(get_assignee))
        .route("/recommendations", post(create_recommendation))
        .route("/presets", post(create_preset))
}

async fn trainer_dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> ApiResult<Json<TrainerDashboard>> {
    Ok(Json(state.dashboards.trainer(&session).await?))
}

async fn list_assignees(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> ApiResult<Json<Vec<Assignee>>> {
    Ok(Json(state.assignments.list_assignees(session.account_id).await?))
}

/// Routines and recent progress of a user assigned to the caller
async fn get_assignee(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(user_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<AssigneeDetail>> {
    Ok(Json(state.assignments.assignee_detail(&session, user_id).await?))
}

#[tracing::instrument(skip(state, session, request), fields(trainer_id = %session.account_id))]
async fn create_recommendation(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Json(request), _): WithRejection<Json<CreateRecommendationRequest>, ApiError>,
) -> ApiResult<(StatusCode, Json<TrainerRecommendation>)> {
    let recommendation = state.recommendations.create(&session, request).await?;
    Ok((StatusCode::CREATED, Json(recommendation)))
}

#[tracing::instrument(skip(state, session, request), fields(trainer_id = %session.account_id))]
async fn create_preset(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Json(request), _): WithRejection<Json<CreateRoutineRequest>, ApiError>,
) -> ApiResult<(StatusCode, Json<Routine>)> {
    let routine = state.routines.create_preset(&session, request).await?;
    Ok((StatusCode::CREATED, Json(routine)))
}
