use chrono::NaiveDate;
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::api::{ApiError, ApiResult};
use crate::auth::UserSession;
use crate::documents::{mirror, ActivityRecord, ClientInfo, Outbox, WriteMode};
use crate::models::{
    adopted_name, AddRoutineItemRequest, CreateRoutineRequest, MonthBounds, Routine, RoutineDetail,
    RoutineItem, RoutineItemView,
};
use crate::services::StatsService;

const ROUTINE_COLUMNS: &str =
    "id, owner_id, name, description, is_template, author_trainer_id, frequency, weekdays, personal_goal, created_at";

#[derive(Debug, Clone)]
pub struct RoutineService {
    db: PgPool,
    outbox: Outbox,
}

impl RoutineService {
    pub fn new(db: PgPool, outbox: Outbox) -> Self {
        Self { db, outbox }
    }

    #[tracing::instrument(skip(self, session, request, client), fields(account_id = %session.account_id))]
    pub async fn create(
        &self,
        session: &UserSession,
        request: CreateRoutineRequest,
        client: ClientInfo,
    ) -> ApiResult<Routine> {
        request.validate()?;

        let mut tx = self.db.begin().await?;
        let routine = insert_routine(&mut tx, session.account_id, &request, None).await?;
        StatsService::recompute_user(&mut tx, session.account_id, MonthBounds::current()).await?;

        let activity = ActivityRecord::new(session.account_id, "routine_created")
            .entity("routine", routine.id)
            .metadata(json!({ "name": routine.name }))
            .client(client)
            .into_document();
        self.outbox.enqueue(&mut tx, &activity, WriteMode::Insert).await?;

        tx.commit().await?;
        self.outbox.nudge();

        info!(routine_id = %routine.id, "routine created");
        Ok(routine)
    }

    /// Preset authored by a trainer, offered to every user for adoption.
    #[tracing::instrument(skip(self, session, request), fields(trainer_id = %session.account_id))]
    pub async fn create_preset(&self, session: &UserSession, request: CreateRoutineRequest) -> ApiResult<Routine> {
        request.validate()?;

        let mut tx = self.db.begin().await?;
        let routine = insert_routine(&mut tx, session.account_id, &request, Some(session.account_id)).await?;
        StatsService::recompute_user(&mut tx, session.account_id, MonthBounds::current()).await?;
        self.mirror_template(&mut tx, &routine).await?;
        tx.commit().await?;
        self.outbox.nudge();

        info!(routine_id = %routine.id, "preset created");
        Ok(routine)
    }

    pub async fn list_own(&self, account_id: Uuid) -> ApiResult<Vec<Routine>> {
        let routines = sqlx::query_as::<_, Routine>(&format!(
            "SELECT {} FROM routines WHERE owner_id = $1 ORDER BY created_at DESC",
            ROUTINE_COLUMNS
        ))
        .bind(account_id)
        .fetch_all(&self.db)
        .await?;

        Ok(routines)
    }

    pub async fn presets(&self, limit: i64) -> ApiResult<Vec<Routine>> {
        let routines = sqlx::query_as::<_, Routine>(&format!(
            "SELECT {} FROM routines WHERE is_template ORDER BY name LIMIT $1",
            ROUTINE_COLUMNS
        ))
        .bind(limit.clamp(1, 100))
        .fetch_all(&self.db)
        .await?;

        Ok(routines)
    }

    pub async fn find(&self, id: Uuid) -> ApiResult<Routine> {
        sqlx::query_as::<_, Routine>(&format!("SELECT {} FROM routines WHERE id = $1", ROUTINE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(ApiError::NotFound("routine"))
    }

    /// Owners see their routines; presets are visible to everyone.
    pub async fn detail(&self, session: &UserSession, id: Uuid) -> ApiResult<RoutineDetail> {
        let routine = self.find(id).await?;
        if !can_view(session, &routine) {
            return Err(ApiError::Forbidden("this routine belongs to someone else"));
        }

        let items = load_items(&self.db, id).await?;
        Ok(RoutineDetail { routine, items })
    }

    pub async fn add_item(
        &self,
        session: &UserSession,
        routine_id: Uuid,
        request: AddRoutineItemRequest,
    ) -> ApiResult<RoutineItem> {
        request.validate()?;
        let routine = self.find_owned(session, routine_id).await?;

        let exercise_exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM exercises WHERE id = $1)")
            .bind(request.exercise_id)
            .fetch_one(&self.db)
            .await?;
        if !exercise_exists {
            return Err(ApiError::NotFound("exercise"));
        }

        let mut tx = self.db.begin().await?;
        // Serializes concurrent appends so default positions stay distinct.
        sqlx::query("SELECT id FROM routines WHERE id = $1 FOR UPDATE")
            .bind(routine_id)
            .execute(&mut *tx)
            .await?;

        let position = match request.position {
            Some(position) => position,
            None => {
                sqlx::query_scalar::<_, i32>(
                    "SELECT COALESCE(MAX(position), 0) + 1 FROM routine_items WHERE routine_id = $1",
                )
                .bind(routine_id)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        let item = sqlx::query_as::<_, RoutineItem>(
            "INSERT INTO routine_items (id, routine_id, exercise_id, position, sets, reps, seconds, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING id, routine_id, exercise_id, position, sets, reps, seconds, notes",
        )
        .bind(Uuid::new_v4())
        .bind(routine_id)
        .bind(request.exercise_id)
        .bind(position)
        .bind(request.sets)
        .bind(request.reps)
        .bind(request.seconds)
        .bind(&request.notes)
        .fetch_one(&mut *tx)
        .await?;

        if routine.is_template {
            self.mirror_template(&mut tx, &routine).await?;
        }
        tx.commit().await?;
        self.outbox.nudge();

        Ok(item)
    }

    pub async fn remove_item(&self, session: &UserSession, routine_id: Uuid, item_id: Uuid) -> ApiResult<()> {
        let routine = self.find_owned(session, routine_id).await?;

        let mut tx = self.db.begin().await?;
        let removed = sqlx::query("DELETE FROM routine_items WHERE id = $1 AND routine_id = $2")
            .bind(item_id)
            .bind(routine_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if removed == 0 {
            return Err(ApiError::NotFound("routine item"));
        }

        if routine.is_template {
            self.mirror_template(&mut tx, &routine).await?;
        }
        tx.commit().await?;
        self.outbox.nudge();
        Ok(())
    }

    /// Copy a preset and its items into a routine owned by the caller.
    #[tracing::instrument(skip(self, session, client), fields(account_id = %session.account_id))]
    pub async fn adopt(&self, session: &UserSession, preset_id: Uuid, client: ClientInfo) -> ApiResult<RoutineDetail> {
        let preset = self.find(preset_id).await?;
        if !preset.is_template {
            return Err(ApiError::NotFound("preset"));
        }

        let mut tx = self.db.begin().await?;
        let copy = sqlx::query_as::<_, Routine>(&format!(
            "INSERT INTO routines (id, owner_id, name, description, is_template, author_trainer_id,
                                   frequency, weekdays, personal_goal)
             VALUES ($1, $2, $3, $4, FALSE, $5, $6, $7, '')
             RETURNING {}",
            ROUTINE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(session.account_id)
        .bind(adopted_name(&preset.name))
        .bind(&preset.description)
        .bind(preset.author_trainer_id)
        .bind(preset.frequency)
        .bind(&preset.weekdays)
        .fetch_one(&mut *tx)
        .await?;

        let items = sqlx::query_as::<_, RoutineItem>(
            "SELECT id, routine_id, exercise_id, position, sets, reps, seconds, notes
             FROM routine_items WHERE routine_id = $1 ORDER BY position",
        )
        .bind(preset_id)
        .fetch_all(&mut *tx)
        .await?;

        for item in &items {
            sqlx::query(
                "INSERT INTO routine_items (id, routine_id, exercise_id, position, sets, reps, seconds, notes)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(Uuid::new_v4())
            .bind(copy.id)
            .bind(item.exercise_id)
            .bind(item.position)
            .bind(item.sets)
            .bind(item.reps)
            .bind(item.seconds)
            .bind(&item.notes)
            .execute(&mut *tx)
            .await?;
        }

        StatsService::recompute_user(&mut tx, session.account_id, MonthBounds::current()).await?;

        let activity = ActivityRecord::new(session.account_id, "preset_adopted")
            .entity("routine", copy.id)
            .metadata(json!({ "preset_id": preset_id }))
            .client(client)
            .into_document();
        self.outbox.enqueue(&mut tx, &activity, WriteMode::Insert).await?;

        let items = load_items(&mut *tx, copy.id).await?;
        tx.commit().await?;
        self.outbox.nudge();

        info!(routine_id = %copy.id, preset_id = %preset_id, "preset adopted");
        Ok(RoutineDetail { routine: copy, items })
    }

    /// Removing a routine cascades to its items and progress logs, so every
    /// month that held one of its sessions is recounted along with the month
    /// it was created in.
    pub async fn delete(&self, session: &UserSession, id: Uuid) -> ApiResult<()> {
        let routine = self.find(id).await?;
        if routine.owner_id != session.account_id && !session.role.is_admin() {
            return Err(ApiError::Forbidden("only the owner can delete this routine"));
        }

        let mut tx = self.db.begin().await?;
        let session_months: Vec<NaiveDate> = sqlx::query_scalar(
            "SELECT DISTINCT date_trunc('month', logged_on)::DATE
             FROM progress_logs WHERE routine_id = $1",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM routines WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for bounds in affected_months(routine.created_at.date_naive(), &session_months) {
            StatsService::recompute_user(&mut tx, routine.owner_id, bounds).await?;
        }
        tx.commit().await?;

        info!(routine_id = %id, "routine deleted");
        Ok(())
    }

    async fn find_owned(&self, session: &UserSession, id: Uuid) -> ApiResult<Routine> {
        let routine = self.find(id).await?;
        if routine.owner_id != session.account_id {
            return Err(ApiError::Forbidden("only the owner can change this routine"));
        }
        Ok(routine)
    }

    async fn mirror_template(&self, conn: &mut PgConnection, routine: &Routine) -> Result<(), sqlx::Error> {
        let items = load_items(&mut *conn, routine.id).await?;
        let document = mirror::routine_template_document(routine, &items);
        self.outbox.enqueue(conn, &document, WriteMode::Upsert).await?;
        Ok(())
    }
}

/// Distinct months touched by a routine, oldest first so rollup locks are
/// always taken in the same order.
fn affected_months(created_on: NaiveDate, session_days: &[NaiveDate]) -> Vec<MonthBounds> {
    let mut months: Vec<MonthBounds> = std::iter::once(created_on)
        .chain(session_days.iter().copied())
        .map(MonthBounds::containing)
        .collect();
    months.sort_by_key(|m| m.start);
    months.dedup();
    months
}

pub fn can_view(session: &UserSession, routine: &Routine) -> bool {
    routine.is_template || routine.owner_id == session.account_id
}

async fn insert_routine(
    conn: &mut PgConnection,
    owner_id: Uuid,
    request: &CreateRoutineRequest,
    author_trainer_id: Option<Uuid>,
) -> Result<Routine, sqlx::Error> {
    sqlx::query_as::<_, Routine>(&format!(
        "INSERT INTO routines (id, owner_id, name, description, is_template, author_trainer_id,
                               frequency, weekdays, personal_goal)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING {}",
        ROUTINE_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(owner_id)
    .bind(request.name.trim())
    .bind(&request.description)
    .bind(author_trainer_id.is_some())
    .bind(author_trainer_id)
    .bind(request.frequency)
    .bind(&request.weekdays)
    .bind(&request.personal_goal)
    .fetch_one(conn)
    .await
}

pub(crate) async fn load_items<'e, E>(executor: E, routine_id: Uuid) -> Result<Vec<RoutineItemView>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query_as::<_, RoutineItemView>(
        "SELECT ri.id, ri.exercise_id, e.name AS exercise_name, e.category AS exercise_category,
                ri.position, ri.sets, ri.reps, ri.seconds, ri.notes
         FROM routine_items ri
         JOIN exercises e ON e.id = ri.exercise_id
         WHERE ri.routine_id = $1
         ORDER BY ri.position, e.name",
    )
    .bind(routine_id)
    .fetch_all(executor)
    .await
}
