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
use crate::models::{CreateProgressRequest, ProgressDetail, ProgressHistory, ProgressLog, ProgressQuery};

pub fn progress_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_progress).post(log_progress))
        .route("/history", get(progress_history))
        .route("/:id", get(get_progress))
        .route("/:id/details", get(get_progress))
}

async fn list_progress(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Query(query), _): WithRejection<Query<ProgressQuery>, ApiError>,
) -> ApiResult<Json<Vec<ProgressLog>>> {
    Ok(Json(state.progress.list(session.account_id, query).await?))
}

async fn progress_history(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Query(query), _): WithRejection<Query<ProgressQuery>, ApiError>,
) -> ApiResult<Json<ProgressHistory>> {
    Ok(Json(state.progress.history(session.account_id, query).await?))
}

#[tracing::instrument(skip(state, session, client, request), fields(account_id = %session.account_id))]
async fn log_progress(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    client: ClientInfo,
    WithRejection(Json(request), _): WithRejection<Json<CreateProgressRequest>, ApiError>,
) -> ApiResult<(StatusCode, Json<ProgressLog>)> {
    let log = state.progress.log(&session, request, client).await?;
    Ok((StatusCode::CREATED, Json(log)))
}

/// Log entry plus whatever extra data the mirror holds for it
async fn get_progress(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<ProgressDetail>> {
    Ok(Json(state.progress.detail(&session, id).await?))
}
