use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Extension, Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use super::{ApiError, ApiResult, AppState};
use crate::auth::UserSession;
use crate::documents::ClientInfo;
use crate::models::{CreateExerciseRequest, Exercise, ExerciseQuery, ExerciseView, UpdateExerciseRequest};

pub fn exercise_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_exercises).post(create_exercise))
        .route("/:id", get(get_exercise).put(update_exercise).delete(delete_exercise))
}

async fn list_exercises(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<ExerciseQuery>, ApiError>,
) -> ApiResult<Json<Vec<Exercise>>> {
    Ok(Json(state.exercises.list(query).await?))
}

/// Relational record merged with its mirrored details document
async fn get_exercise(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<ExerciseView>> {
    Ok(Json(state.exercises.detail(id).await?))
}

#[tracing::instrument(skip(state, session, client, request), fields(account_id = %session.account_id))]
async fn create_exercise(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    client: ClientInfo,
    WithRejection(Json(request), _): WithRejection<Json<CreateExerciseRequest>, ApiError>,
) -> ApiResult<(StatusCode, Json<Exercise>)> {
    let exercise = state.exercises.create(&session, request, client).await?;
    Ok((StatusCode::CREATED, Json(exercise)))
}

#[tracing::instrument(skip(state, session, request), fields(account_id = %session.account_id))]
async fn update_exercise(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateExerciseRequest>, ApiError>,
) -> ApiResult<Json<Exercise>> {
    Ok(Json(state.exercises.update(&session, id, request).await?))
}

#[tracing::instrument(skip(state, session), fields(account_id = %session.account_id))]
async fn delete_exercise(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<StatusCode> {
    state.exercises.delete(&session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
