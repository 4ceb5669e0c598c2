use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;
use validator::Validate;

use super::{ProgressLog, Routine};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrainerAssignment {
    pub id: Uuid,
    pub account_id: Uuid,
    pub trainer_id: Uuid,
    pub assigned_on: NaiveDate,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Type)]
#[sqlx(type_name = "assignment_action", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AssignmentAction {
    Created,
    Modified,
    Deactivated,
    Reactivated,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AssignmentHistory {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub action: AssignmentAction,
    pub admin_id: Option<Uuid>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct AssignTrainerRequest {
    pub account_id: Uuid,
    pub trainer_id: Uuid,
    #[serde(default)]
    pub notes: String,
}

/// Result of an admin assignment: the row and what happened to it.
#[derive(Debug, Serialize)]
pub struct AssignmentOutcome {
    pub assignment: TrainerAssignment,
    pub action: AssignmentAction,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Assignee {
    pub assignment_id: Uuid,
    pub account_id: Uuid,
    pub username: String,
    pub email: String,
    pub assigned_on: NaiveDate,
    pub last_session_on: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct AssigneeDetail {
    pub account_id: Uuid,
    pub username: String,
    pub routines: Vec<Routine>,
    pub recent_progress: Vec<ProgressLog>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CurrentTrainer {
    pub trainer_id: Uuid,
    pub username: String,
    pub email: String,
    pub assigned_on: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrainerRecommendation {
    pub id: Uuid,
    pub trainer_id: Uuid,
    pub account_id: Uuid,
    pub routine_id: Option<Uuid>,
    pub progress_log_id: Option<Uuid>,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRecommendationRequest {
    pub account_id: Uuid,
    pub routine_id: Option<Uuid>,
    pub progress_log_id: Option<Uuid>,
    #[validate(length(min = 1, max = 4000, message = "message must not be empty"))]
    pub message: String,
}
