use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::api::ApiResult;
use crate::auth::UserSession;
use crate::documents::OutboxRelay;
use crate::models::{
    AdherenceReport, AdminDashboard, CategoryCount, LoadBalanceRow, MonthActivity, MonthBounds, Routine,
    TrainerDashboard, UserDashboard,
};
use crate::services::{
    AccountService, AssignmentService, EventService, IdentityService, MessageService, ProgressService,
    RecommendationService, RoutineService, SpaceService, StatsService,
};

/// Sessions joined to the distinct exercise categories of their routine.
/// A log whose routine has no items lands in the `NULL` category.
const LOG_CATEGORIES: &str = "FROM progress_logs pl
     LEFT JOIN (
         SELECT DISTINCT ri.routine_id, e.category::text AS category
         FROM routine_items ri JOIN exercises e ON e.id = ri.exercise_id
     ) c ON c.routine_id = pl.routine_id";

#[derive(Debug, Clone)]
pub struct DashboardService {
    db: PgPool,
    identity: IdentityService,
    stats: StatsService,
    routines: RoutineService,
    progress: ProgressService,
    assignments: AssignmentService,
    recommendations: RecommendationService,
    messages: MessageService,
    accounts: AccountService,
    events: EventService,
    spaces: SpaceService,
    relay: OutboxRelay,
}

impl DashboardService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: PgPool,
        identity: IdentityService,
        stats: StatsService,
        routines: RoutineService,
        progress: ProgressService,
        assignments: AssignmentService,
        recommendations: RecommendationService,
        messages: MessageService,
        accounts: AccountService,
        events: EventService,
        spaces: SpaceService,
        relay: OutboxRelay,
    ) -> Self {
        Self {
            db,
            identity,
            stats,
            routines,
            progress,
            assignments,
            recommendations,
            messages,
            accounts,
            events,
            spaces,
            relay,
        }
    }

    #[tracing::instrument(skip(self, session), fields(account_id = %session.account_id))]
    pub async fn user(&self, session: &UserSession) -> ApiResult<UserDashboard> {
        let account_id = session.account_id;
        let bounds = MonthBounds::current();

        let profile = self.identity.resolve_profile(&session.username).await;
        let latest_progress = self.progress.recent(account_id, 5).await?;
        let mut recent_routines = self.routines.list_own(account_id).await?;
        recent_routines.truncate(5);

        let (total_routines, total_sessions): (i64, i64) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM routines WHERE owner_id = $1),
                    (SELECT COUNT(*) FROM progress_logs WHERE account_id = $1)",
        )
        .bind(account_id)
        .fetch_one(&self.db)
        .await?;

        let (sessions, active_days, effort_sum): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(DISTINCT logged_on), COALESCE(SUM(effort), 0)::BIGINT
             FROM progress_logs
             WHERE account_id = $1 AND logged_on >= $2 AND logged_on < $3",
        )
        .bind(account_id)
        .bind(bounds.start)
        .bind(bounds.end)
        .fetch_one(&self.db)
        .await?;

        Ok(UserDashboard {
            profile,
            latest_progress,
            recent_routines,
            total_routines,
            total_sessions,
            month: MonthActivity::new(sessions, active_days, effort_sum),
            stats: self.stats.user_stats(account_id, bounds).await?,
            trainer: self.assignments.current_trainer(account_id).await?,
            unread_messages: self.messages.unread_count(account_id).await?,
            unread_recommendations: self.recommendations.unread_count(account_id).await?,
        })
    }

    #[tracing::instrument(skip(self, session), fields(trainer_id = %session.account_id))]
    pub async fn trainer(&self, session: &UserSession) -> ApiResult<TrainerDashboard> {
        let trainer_id = session.account_id;
        let bounds = MonthBounds::current();

        let presets_authored = sqlx::query_as::<_, Routine>(
            "SELECT id, owner_id, name, description, is_template, author_trainer_id,
                    frequency, weekdays, personal_goal, created_at
             FROM routines
             WHERE is_template AND author_trainer_id = $1
             ORDER BY name",
        )
        .bind(trainer_id)
        .fetch_all(&self.db)
        .await?;

        Ok(TrainerDashboard {
            profile: self.identity.resolve_profile(&session.username).await,
            assignees: self.assignments.list_assignees(trainer_id).await?,
            presets_authored,
            recommendations_this_month: self.recommendations.count_by_trainer(trainer_id, bounds).await?,
            stats: self.stats.trainer_stats(trainer_id, bounds).await?,
        })
    }

    pub async fn admin(&self) -> ApiResult<AdminDashboard> {
        let outbox = match self.relay.status().await {
            Ok(status) => Some(status),
            Err(e) => {
                warn!(error = %e, "could not read outbox status");
                None
            }
        };

        Ok(AdminDashboard {
            accounts_by_role: self.accounts.count_by_role().await?,
            active_assignments: self.accounts.count_active_assignments().await?,
            upcoming_events: self.events.count_upcoming().await?,
            pending_reservations: self.spaces.count_pending().await?,
            outbox,
        })
    }

    /// Current-month adherence: distinct training days plus sessions per
    /// exercise category.
    pub async fn adherence(&self, account_id: Uuid) -> ApiResult<AdherenceReport> {
        let bounds = MonthBounds::current();

        let active_days: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT logged_on) FROM progress_logs
             WHERE account_id = $1 AND logged_on >= $2 AND logged_on < $3",
        )
        .bind(account_id)
        .bind(bounds.start)
        .bind(bounds.end)
        .fetch_one(&self.db)
        .await?;

        let by_category = sqlx::query_as::<_, CategoryCount>(&format!(
            "SELECT c.category, COUNT(pl.id) AS sessions
             {}
             WHERE pl.account_id = $1 AND pl.logged_on >= $2 AND pl.logged_on < $3
             GROUP BY c.category
             ORDER BY c.category NULLS LAST",
            LOG_CATEGORIES
        ))
        .bind(account_id)
        .bind(bounds.start)
        .bind(bounds.end)
        .fetch_all(&self.db)
        .await?;

        Ok(AdherenceReport {
            period_start: bounds.start,
            period_end: bounds.last_day(),
            active_days,
            by_category,
        })
    }

    pub async fn load_balance(&self, account_id: Uuid) -> ApiResult<Vec<LoadBalanceRow>> {
        let rows = sqlx::query_as::<_, LoadBalanceRow>(&format!(
            "SELECT c.category,
                    SUM(pl.repetitions)::BIGINT AS total_repetitions,
                    SUM(pl.seconds)::BIGINT AS total_seconds
             {}
             WHERE pl.account_id = $1
             GROUP BY c.category
             ORDER BY c.category NULLS LAST",
            LOG_CATEGORIES
        ))
        .bind(account_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }
}
