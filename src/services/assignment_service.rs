use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::api::{ApiError, ApiResult};
use crate::auth::{Role, UserSession};
use crate::documents::{mirror, Outbox, WriteMode};
use crate::models::{
    Assignee, AssigneeDetail, AssignmentAction, AssignmentHistory, AssignmentOutcome,
    AssignTrainerRequest, CurrentTrainer, MonthBounds, ProgressLog, Routine, TrainerAssignment,
};
use crate::services::StatsService;

const ASSIGNMENT_COLUMNS: &str = "id, account_id, trainer_id, assigned_on, active, created_at, updated_at";

/// Whether `account_id` currently has `trainer_id` as their active trainer.
pub async fn is_actively_assigned(db: &PgPool, trainer_id: Uuid, account_id: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS (
             SELECT 1 FROM trainer_assignments
             WHERE trainer_id = $1 AND account_id = $2 AND active
         )",
    )
    .bind(trainer_id)
    .bind(account_id)
    .fetch_one(db)
    .await
}

#[derive(Debug, Clone)]
pub struct AssignmentService {
    db: PgPool,
    outbox: Outbox,
}

impl AssignmentService {
    pub fn new(db: PgPool, outbox: Outbox) -> Self {
        Self { db, outbox }
    }

    /// Point a user at a trainer. An active assignment is re-pointed rather
    /// than duplicated, so a user never has two active trainers.
    #[tracing::instrument(skip(self, admin, request), fields(admin_id = %admin.account_id))]
    pub async fn assign(&self, admin: &UserSession, request: AssignTrainerRequest) -> ApiResult<AssignmentOutcome> {
        if request.account_id == request.trainer_id {
            return Err(ApiError::BadRequest("a user cannot be their own trainer".to_string()));
        }

        let user_exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM accounts WHERE id = $1)")
            .bind(request.account_id)
            .fetch_one(&self.db)
            .await?;
        if !user_exists {
            return Err(ApiError::NotFound("account"));
        }

        let trainer_role: Option<Role> =
            sqlx::query_scalar("SELECT role FROM accounts WHERE id = $1 AND is_active")
                .bind(request.trainer_id)
                .fetch_optional(&self.db)
                .await?;
        match trainer_role {
            None => return Err(ApiError::NotFound("trainer")),
            Some(role) if !role.is_trainer() => {
                return Err(ApiError::BadRequest("the selected account is not a trainer".to_string()))
            }
            Some(_) => {}
        }

        let bounds = MonthBounds::current();
        let mut tx = self.db.begin().await?;

        let existing = sqlx::query_as::<_, TrainerAssignment>(&format!(
            "SELECT {} FROM trainer_assignments WHERE account_id = $1 AND active FOR UPDATE",
            ASSIGNMENT_COLUMNS
        ))
        .bind(request.account_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (assignment, action) = match existing {
            Some(current) => {
                let assignment = sqlx::query_as::<_, TrainerAssignment>(&format!(
                    "UPDATE trainer_assignments
                     SET trainer_id = $2, assigned_on = CURRENT_DATE, updated_at = NOW()
                     WHERE id = $1
                     RETURNING {}",
                    ASSIGNMENT_COLUMNS
                ))
                .bind(current.id)
                .bind(request.trainer_id)
                .fetch_one(&mut *tx)
                .await?;

                if current.trainer_id != request.trainer_id {
                    StatsService::recompute_trainer(&mut tx, current.trainer_id, bounds).await?;
                }
                (assignment, AssignmentAction::Modified)
            }
            None => {
                let assignment = sqlx::query_as::<_, TrainerAssignment>(&format!(
                    "INSERT INTO trainer_assignments (id, account_id, trainer_id)
                     VALUES ($1, $2, $3)
                     RETURNING {}",
                    ASSIGNMENT_COLUMNS
                ))
                .bind(Uuid::new_v4())
                .bind(request.account_id)
                .bind(request.trainer_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|err| match &err {
                    sqlx::Error::Database(db) if db.is_unique_violation() => {
                        ApiError::Conflict("the user was assigned concurrently, retry".to_string())
                    }
                    _ => ApiError::Database(err),
                })?;
                (assignment, AssignmentAction::Created)
            }
        };

        StatsService::recompute_trainer(&mut tx, assignment.trainer_id, bounds).await?;
        self.record(&mut tx, &assignment, action, admin.account_id, &request.notes).await?;
        tx.commit().await?;
        self.outbox.nudge();

        info!(assignment_id = %assignment.id, action = ?action, "trainer assigned");
        Ok(AssignmentOutcome { assignment, action })
    }

    pub async fn deactivate(&self, admin: &UserSession, assignment_id: Uuid) -> ApiResult<TrainerAssignment> {
        let mut tx = self.db.begin().await?;
        let current = self.lock(&mut tx, assignment_id).await?;
        if !current.active {
            return Err(ApiError::Conflict("assignment is already inactive".to_string()));
        }

        let assignment = set_active(&mut tx, assignment_id, false).await?;
        self.record(&mut tx, &assignment, AssignmentAction::Deactivated, admin.account_id, "")
            .await?;
        tx.commit().await?;
        self.outbox.nudge();

        info!(assignment_id = %assignment_id, "assignment deactivated");
        Ok(assignment)
    }

    pub async fn reactivate(&self, admin: &UserSession, assignment_id: Uuid) -> ApiResult<TrainerAssignment> {
        let mut tx = self.db.begin().await?;
        let current = self.lock(&mut tx, assignment_id).await?;
        if current.active {
            return Err(ApiError::Conflict("assignment is already active".to_string()));
        }

        let other_active: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM trainer_assignments WHERE account_id = $1 AND active)",
        )
        .bind(current.account_id)
        .fetch_one(&mut *tx)
        .await?;
        if other_active {
            return Err(ApiError::Conflict("the user already has an active trainer".to_string()));
        }

        let assignment = set_active(&mut tx, assignment_id, true).await.map_err(|err| match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ApiError::Conflict("the user already has an active trainer".to_string())
            }
            _ => ApiError::Database(err),
        })?;
        self.record(&mut tx, &assignment, AssignmentAction::Reactivated, admin.account_id, "")
            .await?;
        tx.commit().await?;
        self.outbox.nudge();

        info!(assignment_id = %assignment_id, "assignment reactivated");
        Ok(assignment)
    }

    pub async fn history(&self, assignment_id: Uuid) -> ApiResult<Vec<AssignmentHistory>> {
        let history = sqlx::query_as::<_, AssignmentHistory>(
            "SELECT id, assignment_id, action, admin_id, notes, created_at
             FROM assignment_history WHERE assignment_id = $1 ORDER BY created_at",
        )
        .bind(assignment_id)
        .fetch_all(&self.db)
        .await?;

        Ok(history)
    }

    pub async fn list_assignees(&self, trainer_id: Uuid) -> ApiResult<Vec<Assignee>> {
        let assignees = sqlx::query_as::<_, Assignee>(
            "SELECT ta.id AS assignment_id, a.id AS account_id, a.username, a.email, ta.assigned_on,
                    (SELECT MAX(p.logged_on) FROM progress_logs p WHERE p.account_id = a.id) AS last_session_on
             FROM trainer_assignments ta
             JOIN accounts a ON a.id = ta.account_id
             WHERE ta.trainer_id = $1 AND ta.active
             ORDER BY a.username",
        )
        .bind(trainer_id)
        .fetch_all(&self.db)
        .await?;

        Ok(assignees)
    }

    /// Routines and the last 20 sessions of an assignee. Trainers only see
    /// users actively assigned to them; admins see everyone.
    pub async fn assignee_detail(&self, session: &UserSession, account_id: Uuid) -> ApiResult<AssigneeDetail> {
        if !session.role.is_admin() && !is_actively_assigned(&self.db, session.account_id, account_id).await? {
            return Err(ApiError::Forbidden("this user is not assigned to you"));
        }

        let username: String = sqlx::query_scalar("SELECT username FROM accounts WHERE id = $1")
            .bind(account_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(ApiError::NotFound("account"))?;

        let routines = sqlx::query_as::<_, Routine>(
            "SELECT id, owner_id, name, description, is_template, author_trainer_id, frequency,
                    weekdays, personal_goal, created_at
             FROM routines WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(account_id)
        .fetch_all(&self.db)
        .await?;

        let recent_progress = sqlx::query_as::<_, ProgressLog>(
            "SELECT id, account_id, routine_id, logged_on, repetitions, seconds, effort, weight_kg, notes, created_at
             FROM progress_logs WHERE account_id = $1
             ORDER BY logged_on DESC, created_at DESC
             LIMIT 20",
        )
        .bind(account_id)
        .fetch_all(&self.db)
        .await?;

        Ok(AssigneeDetail {
            account_id,
            username,
            routines,
            recent_progress,
        })
    }

    pub async fn current_trainer(&self, account_id: Uuid) -> ApiResult<Option<CurrentTrainer>> {
        let trainer = sqlx::query_as::<_, CurrentTrainer>(
            "SELECT t.id AS trainer_id, t.username, t.email, ta.assigned_on
             FROM trainer_assignments ta
             JOIN accounts t ON t.id = ta.trainer_id
             WHERE ta.account_id = $1 AND ta.active",
        )
        .bind(account_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(trainer)
    }

    async fn lock(&self, conn: &mut PgConnection, assignment_id: Uuid) -> ApiResult<TrainerAssignment> {
        sqlx::query_as::<_, TrainerAssignment>(&format!(
            "SELECT {} FROM trainer_assignments WHERE id = $1 FOR UPDATE",
            ASSIGNMENT_COLUMNS
        ))
        .bind(assignment_id)
        .fetch_optional(conn)
        .await?
        .ok_or(ApiError::NotFound("assignment"))
    }

    /// History row plus mirror update, on the caller's transaction.
    async fn record(
        &self,
        conn: &mut PgConnection,
        assignment: &TrainerAssignment,
        action: AssignmentAction,
        admin_id: Uuid,
        notes: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO assignment_history (id, assignment_id, action, admin_id, notes)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(assignment.id)
        .bind(action)
        .bind(admin_id)
        .bind(notes)
        .execute(&mut *conn)
        .await?;

        let document = mirror::assignment_document(assignment, action, admin_id);
        self.outbox.enqueue(conn, &document, WriteMode::Upsert).await?;
        Ok(())
    }
}

async fn set_active(conn: &mut PgConnection, assignment_id: Uuid, active: bool) -> Result<TrainerAssignment, sqlx::Error> {
    sqlx::query_as::<_, TrainerAssignment>(&format!(
        "UPDATE trainer_assignments SET active = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
        ASSIGNMENT_COLUMNS
    ))
    .bind(assignment_id)
    .bind(active)
    .fetch_one(conn)
    .await
}
