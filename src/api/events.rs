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
use crate::models::{Event, EventDetail, EventRegistration};

pub fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_events))
        .route("/:id", get(get_event))
        .route("/:id/registration", post(register).delete(unregister))
}

async fn list_events(State(state): State<AppState>) -> ApiResult<Json<Vec<Event>>> {
    Ok(Json(state.events.list_upcoming().await?))
}

async fn get_event(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<EventDetail>> {
    Ok(Json(state.events.detail(session.account_id, id).await?))
}

#[tracing::instrument(skip(state, session), fields(account_id = %session.account_id))]
async fn register(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<(StatusCode, Json<EventRegistration>)> {
    let registration = state.events.register(session.account_id, id).await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

async fn unregister(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<StatusCode> {
    state.events.unregister(session.account_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
