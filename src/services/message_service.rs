use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::api::{ApiError, ApiResult};
use crate::auth::UserSession;
use crate::models::{Message, SendMessageRequest};

const MESSAGE_SELECT: &str = "SELECT m.id, m.sender_id, s.username AS sender_username,
            m.recipient_id, r.username AS recipient_username, m.subject, m.body, m.is_read,
            m.related_routine_id, m.related_progress_id, m.created_at
     FROM messages m
     JOIN accounts s ON s.id = m.sender_id
     JOIN accounts r ON r.id = m.recipient_id";

#[derive(Debug, Clone)]
pub struct MessageService {
    db: PgPool,
}

impl MessageService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    #[tracing::instrument(skip(self, sender, request), fields(sender_id = %sender.account_id))]
    pub async fn send(&self, sender: &UserSession, request: SendMessageRequest) -> ApiResult<Message> {
        request.validate()?;

        let recipient_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM accounts WHERE id = $1 AND is_active)")
                .bind(request.recipient_id)
                .fetch_one(&self.db)
                .await?;
        if !recipient_exists {
            return Err(ApiError::NotFound("recipient"));
        }

        let participants = [sender.account_id, request.recipient_id];

        if let Some(routine_id) = request.related_routine_id {
            let related: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM routines WHERE id = $1 AND owner_id = ANY($2))",
            )
            .bind(routine_id)
            .bind(&participants[..])
            .fetch_one(&self.db)
            .await?;
            if !related {
                return Err(ApiError::BadRequest("related routine must belong to a participant".to_string()));
            }
        }

        if let Some(progress_id) = request.related_progress_id {
            let related: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM progress_logs WHERE id = $1 AND account_id = ANY($2))",
            )
            .bind(progress_id)
            .bind(&participants[..])
            .fetch_one(&self.db)
            .await?;
            if !related {
                return Err(ApiError::BadRequest(
                    "related progress log must belong to a participant".to_string(),
                ));
            }
        }

        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO messages (id, sender_id, recipient_id, subject, body, related_routine_id, related_progress_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(sender.account_id)
        .bind(request.recipient_id)
        .bind(request.subject.trim())
        .bind(&request.body)
        .bind(request.related_routine_id)
        .bind(request.related_progress_id)
        .fetch_one(&self.db)
        .await?;

        info!(message_id = %id, "message sent");
        self.find(id).await
    }

    pub async fn inbox(&self, account_id: Uuid) -> ApiResult<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(&format!(
            "{} WHERE m.recipient_id = $1 ORDER BY m.created_at DESC",
            MESSAGE_SELECT
        ))
        .bind(account_id)
        .fetch_all(&self.db)
        .await?;

        Ok(messages)
    }

    pub async fn sent(&self, account_id: Uuid) -> ApiResult<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(&format!(
            "{} WHERE m.sender_id = $1 ORDER BY m.created_at DESC",
            MESSAGE_SELECT
        ))
        .bind(account_id)
        .fetch_all(&self.db)
        .await?;

        Ok(messages)
    }

    /// Only the two participants may read a message; the recipient reading
    /// it marks it as read.
    pub async fn open(&self, reader: &UserSession, id: Uuid) -> ApiResult<Message> {
        let mut message = self.find(id).await?;
        if !message.involves(reader.account_id) {
            return Err(ApiError::Forbidden("this message is not addressed to you"));
        }

        if message.recipient_id == reader.account_id && !message.is_read {
            sqlx::query("UPDATE messages SET is_read = TRUE WHERE id = $1")
                .bind(id)
                .execute(&self.db)
                .await?;
            message.is_read = true;
        }

        Ok(message)
    }

    pub async fn unread_count(&self, account_id: Uuid) -> ApiResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE recipient_id = $1 AND NOT is_read")
            .bind(account_id)
            .fetch_one(&self.db)
            .await?;

        Ok(count)
    }

    async fn find(&self, id: Uuid) -> ApiResult<Message> {
        sqlx::query_as::<_, Message>(&format!("{} WHERE m.id = $1", MESSAGE_SELECT))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(ApiError::NotFound("message"))
    }
}
