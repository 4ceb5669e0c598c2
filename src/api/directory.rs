use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use super::{ApiError, ApiResult, AppState};
use crate::models::{Instructor, InstructorDetail};

#[derive(Debug, Deserialize)]
pub struct DirectoryQuery {
    /// Maximum number of instructors to return (default: 50, max: 200)
    pub limit: Option<i64>,
}

pub fn directory_routes() -> Router<AppState> {
    Router::new()
        .route("/instructors", get(list_instructors))
        .route("/instructors/:employee_id", get(get_instructor))
}

async fn list_instructors(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<DirectoryQuery>, ApiError>,
) -> ApiResult<Json<Vec<Instructor>>> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    Ok(Json(state.identity.list_instructors(limit).await?))
}

async fn get_instructor(
    State(state): State<AppState>,
    WithRejection(Path(employee_id), _): WithRejection<Path<String>, ApiError>,
) -> ApiResult<Json<InstructorDetail>> {
    state
        .identity
        .instructor_detail(&employee_id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("instructor"))
}
