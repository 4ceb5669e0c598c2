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
use crate::models::{Message, SendMessageRequest, TrainerRecommendation};

pub fn message_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(inbox).post(send_message))
        .route("/sent", get(sent))
        .route("/:id", get(open_message))
}

pub fn recommendation_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_recommendations))
        .route("/:id/read", post(mark_recommendation_read))
}

async fn inbox(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> ApiResult<Json<Vec<Message>>> {
    Ok(Json(state.messages.inbox(session.account_id).await?))
}

async fn sent(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> ApiResult<Json<Vec<Message>>> {
    Ok(Json(state.messages.sent(session.account_id).await?))
}

#[tracing::instrument(skip(state, session, request), fields(account_id = %session.account_id))]
async fn send_message(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Json(request), _): WithRejection<Json<SendMessageRequest>, ApiError>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    let message = state.messages.send(&session, request).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Opening a message as its recipient marks it read
async fn open_message(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<Message>> {
    Ok(Json(state.messages.open(&session, id).await?))
}

async fn list_recommendations(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
) -> ApiResult<Json<Vec<TrainerRecommendation>>> {
    Ok(Json(state.recommendations.list_received(session.account_id).await?))
}

async fn mark_recommendation_read(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<TrainerRecommendation>> {
    Ok(Json(state.recommendations.mark_read(session.account_id, id).await?))
}
