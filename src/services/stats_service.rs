use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::models::{MonthBounds, RecalculateReport, TrainerMonthlyStats, UserMonthlyStats};

/// Monthly rollups. Every update is a full recount from the source tables,
/// serialized per row with a transaction-scoped advisory lock, so concurrent
/// triggers converge on the same numbers.
#[derive(Debug, Clone)]
pub struct StatsService {
    db: PgPool,
}

impl StatsService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn recompute_user(
        conn: &mut PgConnection,
        account_id: Uuid,
        bounds: MonthBounds,
    ) -> Result<UserMonthlyStats, sqlx::Error> {
        lock_rollup(conn, "user-stats", account_id, bounds).await?;

        sqlx::query_as::<_, UserMonthlyStats>(
            r#"
            INSERT INTO user_monthly_stats (account_id, year, month, routines_started, sessions_logged, updated_at)
            SELECT $1, $2, $3,
                   (SELECT COUNT(*) FROM routines
                     WHERE owner_id = $1 AND created_at >= $4 AND created_at < $5)::INT,
                   (SELECT COUNT(*) FROM progress_logs
                     WHERE account_id = $1 AND logged_on >= $6 AND logged_on < $7)::INT,
                   NOW()
            ON CONFLICT (account_id, year, month) DO UPDATE
            SET routines_started = EXCLUDED.routines_started,
                sessions_logged = EXCLUDED.sessions_logged,
                updated_at = NOW()
            RETURNING account_id, year, month, routines_started, sessions_logged, updated_at
            "#,
        )
        .bind(account_id)
        .bind(bounds.year)
        .bind(bounds.month as i16)
        .bind(bounds.start_utc())
        .bind(bounds.end_utc())
        .bind(bounds.start)
        .bind(bounds.end)
        .fetch_one(conn)
        .await
    }

    pub async fn recompute_trainer(
        conn: &mut PgConnection,
        trainer_id: Uuid,
        bounds: MonthBounds,
    ) -> Result<TrainerMonthlyStats, sqlx::Error> {
        lock_rollup(conn, "trainer-stats", trainer_id, bounds).await?;

        sqlx::query_as::<_, TrainerMonthlyStats>(
            r#"
            INSERT INTO trainer_monthly_stats (trainer_id, year, month, new_assignments, follow_ups, updated_at)
            SELECT $1, $2, $3,
                   (SELECT COUNT(*) FROM trainer_assignments
                     WHERE trainer_id = $1 AND assigned_on >= $4 AND assigned_on < $5)::INT,
                   (SELECT COUNT(*) FROM trainer_recommendations
                     WHERE trainer_id = $1 AND created_at >= $6 AND created_at < $7)::INT,
                   NOW()
            ON CONFLICT (trainer_id, year, month) DO UPDATE
            SET new_assignments = EXCLUDED.new_assignments,
                follow_ups = EXCLUDED.follow_ups,
                updated_at = NOW()
            RETURNING trainer_id, year, month, new_assignments, follow_ups, updated_at
            "#,
        )
        .bind(trainer_id)
        .bind(bounds.year)
        .bind(bounds.month as i16)
        .bind(bounds.start)
        .bind(bounds.end)
        .bind(bounds.start_utc())
        .bind(bounds.end_utc())
        .fetch_one(conn)
        .await
    }

    /// Recount every account for one month. Each account gets its own short
    /// transaction.
    #[tracing::instrument(skip(self))]
    pub async fn recompute_month_for_all(&self, bounds: MonthBounds) -> Result<RecalculateReport, sqlx::Error> {
        let accounts: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM accounts ORDER BY id")
            .fetch_all(&self.db)
            .await?;

        let trainers: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM accounts WHERE role IN ('employee', 'admin')
             UNION
             SELECT DISTINCT trainer_id FROM trainer_assignments
             UNION
             SELECT DISTINCT trainer_id FROM trainer_recommendations",
        )
        .fetch_all(&self.db)
        .await?;

        for account_id in &accounts {
            let mut tx = self.db.begin().await?;
            Self::recompute_user(&mut tx, *account_id, bounds).await?;
            tx.commit().await?;
        }

        for trainer_id in &trainers {
            let mut tx = self.db.begin().await?;
            Self::recompute_trainer(&mut tx, *trainer_id, bounds).await?;
            tx.commit().await?;
        }

        let report = RecalculateReport {
            year: bounds.year,
            month: bounds.month,
            users: accounts.len(),
            trainers: trainers.len(),
        };
        info!(?report, "monthly statistics recalculated");
        Ok(report)
    }

    pub async fn user_stats(
        &self,
        account_id: Uuid,
        bounds: MonthBounds,
    ) -> Result<Option<UserMonthlyStats>, sqlx::Error> {
        sqlx::query_as::<_, UserMonthlyStats>(
            "SELECT account_id, year, month, routines_started, sessions_logged, updated_at
             FROM user_monthly_stats WHERE account_id = $1 AND year = $2 AND month = $3",
        )
        .bind(account_id)
        .bind(bounds.year)
        .bind(bounds.month as i16)
        .fetch_optional(&self.db)
        .await
    }

    pub async fn trainer_stats(
        &self,
        trainer_id: Uuid,
        bounds: MonthBounds,
    ) -> Result<Option<TrainerMonthlyStats>, sqlx::Error> {
        sqlx::query_as::<_, TrainerMonthlyStats>(
            "SELECT trainer_id, year, month, new_assignments, follow_ups, updated_at
             FROM trainer_monthly_stats WHERE trainer_id = $1 AND year = $2 AND month = $3",
        )
        .bind(trainer_id)
        .bind(bounds.year)
        .bind(bounds.month as i16)
        .fetch_optional(&self.db)
        .await
    }
}

fn rollup_lock_key(kind: &str, id: Uuid, bounds: MonthBounds) -> String {
    format!("{}:{}:{}-{:02}", kind, id, bounds.year, bounds.month)
}

async fn lock_rollup(
    conn: &mut PgConnection,
    kind: &str,
    id: Uuid,
    bounds: MonthBounds,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(rollup_lock_key(kind, id, bounds))
        .execute(conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_keys_are_per_row() {
        let id = Uuid::nil();
        let may = MonthBounds::for_month(2024, 5).unwrap();
        let june = MonthBounds::for_month(2024, 6).unwrap();

        assert_eq!(
            rollup_lock_key("user-stats", id, may),
            "user-stats:00000000-0000-0000-0000-000000000000:2024-05"
        );
        assert_ne!(rollup_lock_key("user-stats", id, may), rollup_lock_key("user-stats", id, june));
        assert_ne!(
            rollup_lock_key("user-stats", id, may),
            rollup_lock_key("trainer-stats", id, may)
        );
    }
}
