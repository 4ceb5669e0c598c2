//! Schema-flexible mirror of relational records.
//!
//! Relational writes that need a mirror enqueue an [`outbox`] row in the same
//! transaction. The [`OutboxRelay`] later copies those rows into whichever
//! [`DocumentStore`] backend is configured.

pub mod memory;
pub mod mirror;
pub mod outbox;
pub mod postgres;
pub mod redis;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use memory::MemoryDocumentStore;
pub use mirror::{ActivityRecord, ClientInfo, ProgressExtras};
pub use outbox::{DrainReport, Outbox, OutboxEntry, OutboxRelay, OutboxState, OutboxStatus};
pub use postgres::PgDocumentStore;
pub use self::redis::RedisDocumentStore;
pub use store::DocumentStore;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    ProgressLogs,
    UserActivityLogs,
    ExerciseDetails,
    RoutineTemplates,
    TrainerAssignments,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::ProgressLogs,
        Collection::UserActivityLogs,
        Collection::ExerciseDetails,
        Collection::RoutineTemplates,
        Collection::TrainerAssignments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::ProgressLogs => "progress_logs",
            Collection::UserActivityLogs => "user_activity_logs",
            Collection::ExerciseDetails => "exercise_details",
            Collection::RoutineTemplates => "routine_templates",
            Collection::TrainerAssignments => "trainer_assignments",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DocumentStoreError> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| DocumentStoreError::UnknownCollection(s.to_string()))
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One mirrored record, addressed by `(collection, key)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub collection: Collection,
    pub key: String,
    pub user_key: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub body: Value,
}

/// How a document is written: `Insert` keeps an existing document untouched,
/// `Upsert` replaces it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "outbox_operation", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    Insert,
    Upsert,
}

/// Time window for [`DocumentStore::find_by_user`], half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from && at < self.to
    }
}

#[derive(Error, Debug)]
pub enum DocumentStoreError {
    #[error("document store is disabled")]
    Disabled,
    #[error("unknown collection: {0}")]
    UnknownCollection(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("document store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collections_parse_from_their_names() {
        for collection in Collection::ALL {
            assert_eq!(Collection::parse(collection.as_str()).unwrap(), collection);
        }
        assert!(matches!(
            Collection::parse("sessions"),
            Err(DocumentStoreError::UnknownCollection(_))
        ));
    }

    #[test]
    fn time_range_is_half_open() {
        let from = Utc::now();
        let to = from + chrono::Duration::days(1);
        let range = TimeRange { from, to };
        assert!(range.contains(from));
        assert!(!range.contains(to));
    }
}
