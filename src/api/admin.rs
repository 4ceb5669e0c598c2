use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Extension, Router,
};
use axum_extra::extract::WithRejection;
use tracing::info;
use uuid::Uuid;

use super::{ApiError, ApiResult, AppState};
use crate::auth::UserSession;
use crate::models::{
    Account, AdminDashboard, AssignTrainerRequest, AssignmentHistory, AssignmentOutcome, CreateEventRequest,
    CreateSpaceRequest, Event, ListAccountsQuery, MonthBounds, RecalculateReport, RecalculateRequest,
    Reservation, Space, TrainerAssignment, UpdateRoleRequest,
};

/// Admin routes; the admin guard is applied by the caller.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(admin_dashboard))
        .route("/accounts", get(list_accounts))
        .route("/accounts/:id/role", put(set_role))
        .route("/assignments", post(assign_trainer))
        .route("/assignments/:id/deactivate", post(deactivate_assignment))
        .route("/assignments/:id/reactivate", post(reactivate_assignment))
        .route("/assignments/:id/history", get(assignment_history))
        .route("/stats/recalculate", post(recalculate_stats))
        .route("/events", post(create_event))
        .route("/events/:id/deactivate", post(deactivate_event))
        .route("/spaces", post(create_space))
        .route("/reservations/:id/confirm", post(confirm_reservation))
}

async fn admin_dashboard(State(state): State<AppState>) -> ApiResult<Json<AdminDashboard>> {
    Ok(Json(state.dashboards.admin().await?))
}

async fn list_accounts(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<ListAccountsQuery>, ApiError>,
) -> ApiResult<Json<Vec<Account>>> {
    Ok(Json(state.accounts.list(query).await?))
}

#[tracing::instrument(skip(state, session, request), fields(admin_id = %session.account_id))]
async fn set_role(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateRoleRequest>, ApiError>,
) -> ApiResult<Json<Account>> {
    let account = state.auth.set_role(id, request.role).await?;
    info!(account_id = %id, role = ?account.role, "role changed by admin");
    Ok(Json(account))
}

#[tracing::instrument(skip(state, session, request), fields(admin_id = %session.account_id))]
async fn assign_trainer(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Json(request), _): WithRejection<Json<AssignTrainerRequest>, ApiError>,
) -> ApiResult<(StatusCode, Json<AssignmentOutcome>)> {
    let outcome = state.assignments.assign(&session, request).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn deactivate_assignment(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<TrainerAssignment>> {
    Ok(Json(state.assignments.deactivate(&session, id).await?))
}

async fn reactivate_assignment(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<TrainerAssignment>> {
    Ok(Json(state.assignments.reactivate(&session, id).await?))
}

async fn assignment_history(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<Vec<AssignmentHistory>>> {
    Ok(Json(state.assignments.history(id).await?))
}

/// Rebuild monthly rollups for every account. An empty body means the
/// current month.
#[tracing::instrument(skip(state, request))]
async fn recalculate_stats(
    State(state): State<AppState>,
    request: Option<Json<RecalculateRequest>>,
) -> ApiResult<Json<RecalculateReport>> {
    let (year, month) = request.map_or((None, None), |Json(r)| (r.year, r.month));
    let bounds = MonthBounds::from_parts(year, month).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    Ok(Json(state.stats.recompute_month_for_all(bounds).await?))
}

async fn create_event(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<CreateEventRequest>, ApiError>,
) -> ApiResult<(StatusCode, Json<Event>)> {
    let event = state.events.create(request).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

async fn deactivate_event(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<Event>> {
    Ok(Json(state.events.deactivate(id).await?))
}

async fn create_space(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<CreateSpaceRequest>, ApiError>,
) -> ApiResult<(StatusCode, Json<Space>)> {
    let space = state.spaces.create_space(request).await?;
    Ok((StatusCode::CREATED, Json(space)))
}

async fn confirm_reservation(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<Reservation>> {
    Ok(Json(state.spaces.confirm(id).await?))
}
