use sqlx::PgPool;

use crate::api::ApiResult;
use crate::models::{Account, ListAccountsQuery, RoleCount};

#[derive(Debug, Clone)]
pub struct AccountService {
    db: PgPool,
}

impl AccountService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, query: ListAccountsQuery) -> ApiResult<Vec<Account>> {
        let accounts = sqlx::query_as::<_, Account>(
            "SELECT id, username, email, password_hash, role, is_active, last_login_at, created_at, updated_at
             FROM accounts
             WHERE ($1::account_role IS NULL OR role = $1)
             ORDER BY username
             LIMIT $2 OFFSET $3",
        )
        .bind(query.role)
        .bind(query.limit.unwrap_or(50).clamp(1, 200))
        .bind(query.offset.unwrap_or(0).max(0))
        .fetch_all(&self.db)
        .await?;

        Ok(accounts)
    }

    pub async fn count_by_role(&self) -> ApiResult<Vec<RoleCount>> {
        let counts = sqlx::query_as::<_, RoleCount>(
            "SELECT role, COUNT(*) AS total FROM accounts WHERE is_active GROUP BY role ORDER BY role",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(counts)
    }

    pub async fn count_active_assignments(&self) -> ApiResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM trainer_assignments WHERE active")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }
}
