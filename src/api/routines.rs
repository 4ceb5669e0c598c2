use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Extension, Router,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use super::{ApiError, ApiResult, AppState};
use crate::auth::UserSession;
use crate::documents::ClientInfo;
use crate::models::{AddRoutineItemRequest, CreateRoutineRequest, Routine, RoutineDetail, RoutineItem};

const PRESET_LIMIT: i64 = 10;

pub fn routine_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_routines).post(create_routine))
        .route("/presets", get(list_presets))
        .route("/:id", get(get_routine).delete(delete_routine))
        .route("/:id/items", post(add_item))
        .route("/:id/items/:item_id", delete(remove_item))
        .route("/:id/adopt", post(adopt_preset))
}

async fn list_routines(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> ApiResult<Json<Vec<Routine>>> {
    Ok(Json(state.routines.list_own(session.account_id).await?))
}

async fn list_presets(State(state): State<AppState>) -> ApiResult<Json<Vec<Routine>>> {
    Ok(Json(state.routines.presets(PRESET_LIMIT).await?))
}

#[tracing::instrument(skip(state, session, client, request), fields(account_id = %session.account_id))]
async fn create_routine(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    client: ClientInfo,
    WithRejection(Json(request), _): WithRejection<Json<CreateRoutineRequest>, ApiError>,
) -> ApiResult<(StatusCode, Json<Routine>)> {
    let routine = state.routines.create(&session, request, client).await?;
    Ok((StatusCode::CREATED, Json(routine)))
}

async fn get_routine(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<RoutineDetail>> {
    Ok(Json(state.routines.detail(&session, id).await?))
}

#[tracing::instrument(skip(state, session), fields(account_id = %session.account_id))]
async fn delete_routine(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<StatusCode> {
    state.routines.delete(&session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state, session, request), fields(account_id = %session.account_id))]
async fn add_item(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(request), _): WithRejection<Json<AddRoutineItemRequest>, ApiError>,
) -> ApiResult<(StatusCode, Json<RoutineItem>)> {
    let item = state.routines.add_item(&session, id, request).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn remove_item(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path((id, item_id)), _): WithRejection<Path<(Uuid, Uuid)>, ApiError>,
) -> ApiResult<StatusCode> {
    state.routines.remove_item(&session, id, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Copy a preset, with its items, into the caller's routines
#[tracing::instrument(skip(state, session, client), fields(account_id = %session.account_id))]
async fn adopt_preset(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    client: ClientInfo,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<(StatusCode, Json<RoutineDetail>)> {
    let detail = state.routines.adopt(&session, id, client).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}
