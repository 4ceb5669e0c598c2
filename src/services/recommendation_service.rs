use serde_json::json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::api::{ApiError, ApiResult};
use crate::auth::UserSession;
use crate::documents::{ActivityRecord, Outbox, WriteMode};
use crate::models::{CreateRecommendationRequest, MonthBounds, TrainerRecommendation};
use crate::services::{assignment_service::is_actively_assigned, StatsService};

const RECOMMENDATION_COLUMNS: &str =
    "id, trainer_id, account_id, routine_id, progress_log_id, message, is_read, created_at";

#[derive(Debug, Clone)]
pub struct RecommendationService {
    db: PgPool,
    outbox: Outbox,
}

impl RecommendationService {
    pub fn new(db: PgPool, outbox: Outbox) -> Self {
        Self { db, outbox }
    }

    /// Follow-up from a trainer to one of their active assignees.
    #[tracing::instrument(skip(self, trainer, request), fields(trainer_id = %trainer.account_id))]
    pub async fn create(
        &self,
        trainer: &UserSession,
        request: CreateRecommendationRequest,
    ) -> ApiResult<TrainerRecommendation> {
        request.validate()?;
        if request.message.trim().is_empty() {
            return Err(ApiError::BadRequest("message must not be empty".to_string()));
        }

        if !trainer.role.is_admin()
            && !is_actively_assigned(&self.db, trainer.account_id, request.account_id).await?
        {
            return Err(ApiError::Forbidden("this user is not assigned to you"));
        }

        if let Some(routine_id) = request.routine_id {
            let owned: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM routines WHERE id = $1 AND owner_id = $2)",
            )
            .bind(routine_id)
            .bind(request.account_id)
            .fetch_one(&self.db)
            .await?;
            if !owned {
                return Err(ApiError::BadRequest("routine does not belong to this user".to_string()));
            }
        }

        if let Some(progress_log_id) = request.progress_log_id {
            let owned: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM progress_logs WHERE id = $1 AND account_id = $2)",
            )
            .bind(progress_log_id)
            .bind(request.account_id)
            .fetch_one(&self.db)
            .await?;
            if !owned {
                return Err(ApiError::BadRequest("progress log does not belong to this user".to_string()));
            }
        }

        let mut tx = self.db.begin().await?;
        let recommendation = sqlx::query_as::<_, TrainerRecommendation>(&format!(
            "INSERT INTO trainer_recommendations (id, trainer_id, account_id, routine_id, progress_log_id, message)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            RECOMMENDATION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(trainer.account_id)
        .bind(request.account_id)
        .bind(request.routine_id)
        .bind(request.progress_log_id)
        .bind(request.message.trim())
        .fetch_one(&mut *tx)
        .await?;

        StatsService::recompute_trainer(&mut tx, trainer.account_id, MonthBounds::current()).await?;

        let activity = ActivityRecord::new(trainer.account_id, "recommendation_sent")
            .entity("recommendation", recommendation.id)
            .metadata(json!({ "user_id": request.account_id }))
            .into_document();
        self.outbox.enqueue(&mut tx, &activity, WriteMode::Insert).await?;

        tx.commit().await?;
        self.outbox.nudge();

        info!(recommendation_id = %recommendation.id, "recommendation sent");
        Ok(recommendation)
    }

    pub async fn list_received(&self, account_id: Uuid) -> ApiResult<Vec<TrainerRecommendation>> {
        let recommendations = sqlx::query_as::<_, TrainerRecommendation>(&format!(
            "SELECT {} FROM trainer_recommendations WHERE account_id = $1 ORDER BY created_at DESC",
            RECOMMENDATION_COLUMNS
        ))
        .bind(account_id)
        .fetch_all(&self.db)
        .await?;

        Ok(recommendations)
    }

    pub async fn mark_read(&self, account_id: Uuid, id: Uuid) -> ApiResult<TrainerRecommendation> {
        sqlx::query_as::<_, TrainerRecommendation>(&format!(
            "UPDATE trainer_recommendations SET is_read = TRUE
             WHERE id = $1 AND account_id = $2
             RETURNING {}",
            RECOMMENDATION_COLUMNS
        ))
        .bind(id)
        .bind(account_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(ApiError::NotFound("recommendation"))
    }

    pub async fn unread_count(&self, account_id: Uuid) -> ApiResult<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM trainer_recommendations WHERE account_id = $1 AND NOT is_read",
        )
        .bind(account_id)
        .fetch_one(&self.db)
        .await?;

        Ok(count)
    }

    pub async fn count_by_trainer(&self, trainer_id: Uuid, bounds: MonthBounds) -> ApiResult<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM trainer_recommendations
             WHERE trainer_id = $1 AND created_at >= $2 AND created_at < $3",
        )
        .bind(trainer_id)
        .bind(bounds.start_utc())
        .bind(bounds.end_utc())
        .fetch_one(&self.db)
        .await?;

        Ok(count)
    }
}
