use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::api::{ApiError, ApiResult};
use crate::auth::UserSession;
use crate::documents::{
    mirror, ActivityRecord, ClientInfo, Collection, DocumentStore, DocumentStoreError, Outbox, ProgressExtras, TimeRange,
    WriteMode,
};
use crate::models::{CreateProgressRequest, MonthBounds, ProgressDetail, ProgressHistory, ProgressLog, ProgressQuery};
use crate::services::{assignment_service::is_actively_assigned, mirror_body, StatsService};

const PROGRESS_COLUMNS: &str =
    "id, account_id, routine_id, logged_on, repetitions, seconds, effort, weight_kg, notes, created_at";

#[derive(Debug, Clone)]
pub struct ProgressService {
    db: PgPool,
    store: DocumentStore,
    outbox: Outbox,
}

impl ProgressService {
    pub fn new(db: PgPool, store: DocumentStore, outbox: Outbox) -> Self {
        Self { db, store, outbox }
    }

    /// Record a session against one of the caller's routines. Free-form
    /// metrics, photos and tags only go to the mirror.
    #[tracing::instrument(skip(self, session, request, client), fields(account_id = %session.account_id))]
    pub async fn log(
        &self,
        session: &UserSession,
        request: CreateProgressRequest,
        client: ClientInfo,
    ) -> ApiResult<ProgressLog> {
        request.validate()?;

        let owner: Option<Uuid> = sqlx::query_scalar("SELECT owner_id FROM routines WHERE id = $1")
            .bind(request.routine_id)
            .fetch_optional(&self.db)
            .await?;
        match owner {
            None => return Err(ApiError::NotFound("routine")),
            Some(owner) if owner != session.account_id => {
                return Err(ApiError::Forbidden("progress can only be logged on your own routines"))
            }
            Some(_) => {}
        }

        let logged_on = request.logged_on.unwrap_or_else(|| Utc::now().date_naive());

        let mut tx = self.db.begin().await?;
        let log = sqlx::query_as::<_, ProgressLog>(&format!(
            "INSERT INTO progress_logs (id, account_id, routine_id, logged_on, repetitions, seconds, effort, weight_kg, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {}",
            PROGRESS_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(session.account_id)
        .bind(request.routine_id)
        .bind(logged_on)
        .bind(request.repetitions)
        .bind(request.seconds)
        .bind(request.effort)
        .bind(request.weight_kg)
        .bind(&request.notes)
        .fetch_one(&mut *tx)
        .await?;

        StatsService::recompute_user(&mut tx, session.account_id, MonthBounds::containing(logged_on)).await?;

        let extras = ProgressExtras {
            exercise_id: request.exercise_id,
            metrics: request.metrics,
            photos: request.photos,
            tags: request.tags,
        };
        let document = mirror::progress_document(&log, &extras);
        self.outbox.enqueue(&mut tx, &document, WriteMode::Insert).await?;

        let activity = ActivityRecord::new(session.account_id, "progress_logged")
            .entity("progress_log", log.id)
            .metadata(json!({ "routine_id": log.routine_id, "date": log.logged_on }))
            .client(client)
            .into_document();
        self.outbox.enqueue(&mut tx, &activity, WriteMode::Insert).await?;

        tx.commit().await?;
        self.outbox.nudge();

        info!(progress_id = %log.id, "progress logged");
        Ok(log)
    }

    pub async fn list(&self, account_id: Uuid, query: ProgressQuery) -> ApiResult<Vec<ProgressLog>> {
        let bounds = match (query.year, query.month) {
            (Some(year), Some(month)) => Some(
                MonthBounds::for_month(year, month)
                    .ok_or_else(|| ApiError::BadRequest("month must be between 1 and 12".to_string()))?,
            ),
            (None, None) => None,
            _ => return Err(ApiError::BadRequest("year and month must be given together".to_string())),
        };

        let logs = sqlx::query_as::<_, ProgressLog>(&format!(
            "SELECT {} FROM progress_logs
             WHERE account_id = $1
               AND ($2::date IS NULL OR logged_on >= $2)
               AND ($3::date IS NULL OR logged_on < $3)
               AND ($4::uuid IS NULL OR routine_id = $4)
             ORDER BY logged_on DESC, created_at DESC
             LIMIT $5",
            PROGRESS_COLUMNS
        ))
        .bind(account_id)
        .bind(bounds.map(|b| b.start))
        .bind(bounds.map(|b| b.end))
        .bind(query.routine_id)
        .bind(query.limit.unwrap_or(50).clamp(1, 500))
        .fetch_all(&self.db)
        .await?;

        Ok(logs)
    }

    pub async fn recent(&self, account_id: Uuid, limit: i64) -> ApiResult<Vec<ProgressLog>> {
        self.list(
            account_id,
            ProgressQuery {
                limit: Some(limit),
                ..Default::default()
            },
        )
        .await
    }

    /// Month of sessions as the mirror holds them, including the free-form
    /// metrics, photos and tags. Defaults to the current month. An
    /// unreachable mirror yields an empty history.
    pub async fn history(&self, account_id: Uuid, query: ProgressQuery) -> ApiResult<ProgressHistory> {
        let bounds = MonthBounds::from_parts(query.year, query.month)
            .map_err(|message| ApiError::BadRequest(message.to_string()))?;
        let range = TimeRange {
            from: bounds.start_utc(),
            to: bounds.end_utc(),
        };
        let limit = query.limit.unwrap_or(100).clamp(1, 500) as usize;

        let entries = match self
            .store
            .find_by_user(Collection::ProgressLogs, &account_id.to_string(), Some(range), limit)
            .await
        {
            Ok(documents) => documents.into_iter().map(|document| document.body).collect(),
            Err(DocumentStoreError::Disabled) => Vec::new(),
            Err(e) => {
                warn!(%account_id, error = %e, "progress history lookup failed");
                Vec::new()
            }
        };

        Ok(ProgressHistory {
            year: bounds.year,
            month: bounds.month,
            entries,
        })
    }

    /// Visible to the owner, the owner's active trainer and admins.
    pub async fn detail(&self, session: &UserSession, id: Uuid) -> ApiResult<ProgressDetail> {
        let log = sqlx::query_as::<_, ProgressLog>(&format!(
            "SELECT {} FROM progress_logs WHERE id = $1",
            PROGRESS_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(ApiError::NotFound("progress log"))?;

        if log.account_id != session.account_id
            && !session.role.is_admin()
            && !is_actively_assigned(&self.db, session.account_id, log.account_id).await?
        {
            return Err(ApiError::Forbidden("this progress log belongs to someone else"));
        }

        let details = mirror_body(&self.store, Collection::ProgressLogs, &id.to_string()).await;
        Ok(ProgressDetail { log, details })
    }
}
