use serde_json::json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::api::{ApiError, ApiResult};
use crate::auth::UserSession;
use crate::documents::{mirror, ActivityRecord, ClientInfo, Collection, DocumentStore, Outbox, WriteMode};
use crate::models::{
    CreateExerciseRequest, Exercise, ExerciseQuery, ExerciseView, UpdateExerciseRequest,
};
use crate::services::mirror_body;

const EXERCISE_COLUMNS: &str = "id, name, category, description, duration_min, difficulty, video_url, \
     created_by, is_custom, instructions, muscles, equipment, precautions, contraindications, \
     variations, created_at";

#[derive(Debug, Clone)]
pub struct ExerciseService {
    db: PgPool,
    store: DocumentStore,
    outbox: Outbox,
}

impl ExerciseService {
    pub fn new(db: PgPool, store: DocumentStore, outbox: Outbox) -> Self {
        Self { db, store, outbox }
    }

    pub async fn list(&self, query: ExerciseQuery) -> ApiResult<Vec<Exercise>> {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.replace('%', "\\%").replace('_', "\\_")));

        let exercises = sqlx::query_as::<_, Exercise>(&format!(
            "SELECT {} FROM exercises
             WHERE ($1::exercise_category IS NULL OR category = $1)
               AND ($2::smallint IS NULL OR difficulty = $2)
               AND ($3::text IS NULL OR name ILIKE $3)
               AND (NOT $4 OR is_custom)
             ORDER BY name
             LIMIT $5 OFFSET $6",
            EXERCISE_COLUMNS
        ))
        .bind(query.category)
        .bind(query.difficulty)
        .bind(search)
        .bind(query.custom_only.unwrap_or(false))
        .bind(query.limit.unwrap_or(100).clamp(1, 500))
        .bind(query.offset.unwrap_or(0).max(0))
        .fetch_all(&self.db)
        .await?;

        Ok(exercises)
    }

    pub async fn find(&self, id: Uuid) -> ApiResult<Exercise> {
        sqlx::query_as::<_, Exercise>(&format!("SELECT {} FROM exercises WHERE id = $1", EXERCISE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(ApiError::NotFound("exercise"))
    }

    /// Exercise with its mirrored metadata, when the store has it.
    pub async fn detail(&self, id: Uuid) -> ApiResult<ExerciseView> {
        let exercise = self.find(id).await?;
        let details = mirror_body(&self.store, Collection::ExerciseDetails, &id.to_string()).await;
        Ok(ExerciseView { exercise, details })
    }

    /// Trainers add to the shared catalog; anyone else creates a custom exercise.
    #[tracing::instrument(skip(self, session, request, client), fields(account_id = %session.account_id))]
    pub async fn create(
        &self,
        session: &UserSession,
        request: CreateExerciseRequest,
        client: ClientInfo,
    ) -> ApiResult<Exercise> {
        request.validate()?;
        let is_custom = !session.role.is_trainer();

        let mut tx = self.db.begin().await?;
        let exercise = sqlx::query_as::<_, Exercise>(&format!(
            "INSERT INTO exercises (id, name, category, description, duration_min, difficulty, video_url,
                                    created_by, is_custom, instructions, muscles, equipment, precautions,
                                    contraindications, variations)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
             RETURNING {}",
            EXERCISE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(request.name.trim())
        .bind(request.category)
        .bind(&request.description)
        .bind(request.duration_min)
        .bind(request.difficulty)
        .bind(request.video_url.unwrap_or_default())
        .bind(session.account_id)
        .bind(is_custom)
        .bind(&request.instructions)
        .bind(&request.muscles)
        .bind(&request.equipment)
        .bind(&request.precautions)
        .bind(&request.contraindications)
        .bind(&request.variations)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(details) = request.details.filter(|d| !d.is_empty()) {
            let document = mirror::exercise_document(&exercise, &details);
            self.outbox.enqueue(&mut tx, &document, WriteMode::Upsert).await?;
        }

        let activity = ActivityRecord::new(session.account_id, "exercise_created")
            .entity("exercise", exercise.id)
            .metadata(json!({ "name": exercise.name, "custom": is_custom }))
            .client(client)
            .into_document();
        self.outbox.enqueue(&mut tx, &activity, WriteMode::Insert).await?;

        tx.commit().await?;
        self.outbox.nudge();

        info!(exercise_id = %exercise.id, "exercise created");
        Ok(exercise)
    }

    pub async fn update(
        &self,
        session: &UserSession,
        id: Uuid,
        request: UpdateExerciseRequest,
    ) -> ApiResult<Exercise> {
        request.validate()?;
        let existing = self.find(id).await?;
        ensure_can_edit(session, &existing)?;

        let mut tx = self.db.begin().await?;
        let exercise = sqlx::query_as::<_, Exercise>(&format!(
            "UPDATE exercises SET
                name = COALESCE($2, name),
                category = COALESCE($3, category),
                description = COALESCE($4, description),
                duration_min = COALESCE($5, duration_min),
                difficulty = COALESCE($6, difficulty),
                video_url = COALESCE($7, video_url),
                instructions = COALESCE($8, instructions),
                muscles = COALESCE($9, muscles),
                equipment = COALESCE($10, equipment),
                precautions = COALESCE($11, precautions),
                contraindications = COALESCE($12, contraindications),
                variations = COALESCE($13, variations)
             WHERE id = $1
             RETURNING {}",
            EXERCISE_COLUMNS
        ))
        .bind(id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(request.category)
        .bind(request.description)
        .bind(request.duration_min)
        .bind(request.difficulty)
        .bind(request.video_url)
        .bind(request.instructions)
        .bind(request.muscles)
        .bind(request.equipment)
        .bind(request.precautions)
        .bind(request.contraindications)
        .bind(request.variations)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(details) = request.details {
            let document = mirror::exercise_document(&exercise, &details);
            self.outbox.enqueue(&mut tx, &document, WriteMode::Upsert).await?;
        }

        tx.commit().await?;
        self.outbox.nudge();
        Ok(exercise)
    }

    /// Exercises still prescribed by a routine cannot be removed.
    pub async fn delete(&self, session: &UserSession, id: Uuid) -> ApiResult<()> {
        let existing = self.find(id).await?;
        ensure_can_edit(session, &existing)?;

        let in_use: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM routine_items WHERE exercise_id = $1)")
            .bind(id)
            .fetch_one(&self.db)
            .await?;
        if in_use {
            return Err(ApiError::Conflict("exercise is used by a routine".to_string()));
        }

        sqlx::query("DELETE FROM exercises WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|err| match &err {
                // A routine picked it up between the check and the delete.
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                    ApiError::Conflict("exercise is used by a routine".to_string())
                }
                _ => ApiError::Database(err),
            })?;

        info!(exercise_id = %id, "exercise deleted");
        Ok(())
    }
}

fn ensure_can_edit(session: &UserSession, exercise: &Exercise) -> ApiResult<()> {
    if session.role.is_admin() || exercise.created_by == Some(session.account_id) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("only the author or an admin can change this exercise"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::models::ExerciseCategory;
    use chrono::Utc;

    fn exercise(created_by: Option<Uuid>) -> Exercise {
        Exercise {
            id: Uuid::new_v4(),
            name: "Plank".to_string(),
            category: ExerciseCategory::Strength,
            description: String::new(),
            duration_min: 1,
            difficulty: 2,
            video_url: String::new(),
            created_by,
            is_custom: true,
            instructions: String::new(),
            muscles: String::new(),
            equipment: String::new(),
            precautions: String::new(),
            contraindications: String::new(),
            variations: String::new(),
            created_at: Utc::now(),
        }
    }

    fn session(role: Role) -> UserSession {
        UserSession {
            account_id: Uuid::new_v4(),
            username: "someone".to_string(),
            role,
            jti: "jti".to_string(),
        }
    }

    #[test]
    fn authors_and_admins_can_edit() {
        let author = session(Role::Student);
        assert!(ensure_can_edit(&author, &exercise(Some(author.account_id))).is_ok());
        assert!(ensure_can_edit(&session(Role::Admin), &exercise(None)).is_ok());
        assert!(matches!(
            ensure_can_edit(&session(Role::Employee), &exercise(Some(author.account_id))),
            Err(ApiError::Forbidden(_))
        ));
    }
}
