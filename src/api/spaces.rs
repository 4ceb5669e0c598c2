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
use crate::models::{CreateReservationRequest, Reservation, Space};

pub fn space_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_spaces))
        .route("/:id", get(get_space))
}

pub fn reservation_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_reservations).post(reserve))
        .route("/:id/cancel", post(cancel_reservation))
}

async fn list_spaces(State(state): State<AppState>) -> ApiResult<Json<Vec<Space>>> {
    Ok(Json(state.spaces.list_spaces().await?))
}

async fn get_space(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<Space>> {
    Ok(Json(state.spaces.space(id).await?))
}

async fn list_reservations(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> ApiResult<Json<Vec<Reservation>>> {
    Ok(Json(state.spaces.list_own(session.account_id).await?))
}

async fn reserve(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Json(request), _): WithRejection<Json<CreateReservationRequest>, ApiError>,
) -> ApiResult<(StatusCode, Json<Reservation>)> {
    let reservation = state.spaces.reserve(&session, request).await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

async fn cancel_reservation(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<Reservation>> {
    Ok(Json(state.spaces.cancel(&session, id).await?))
}
