use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::validation::not_blank;

/// Message joined with both participants' usernames.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub sender_username: String,
    pub recipient_id: Uuid,
    pub recipient_username: String,
    pub subject: String,
    pub body: String,
    pub is_read: bool,
    pub related_routine_id: Option<Uuid>,
    pub related_progress_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn involves(&self, account_id: Uuid) -> bool {
        self.sender_id == account_id || self.recipient_id == account_id
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    pub recipient_id: Uuid,
    #[validate(
        length(min = 1, max = 200, message = "subject must be 1-200 characters"),
        custom(function = "not_blank")
    )]
    pub subject: String,
    #[validate(length(min = 1, message = "message must not be empty"), custom(function = "not_blank"))]
    pub body: String,
    pub related_routine_id: Option<Uuid>,
    pub related_progress_id: Option<Uuid>,
}
