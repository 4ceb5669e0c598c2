use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, PgConnection, PgPool};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{Collection, Document, DocumentStore, DocumentStoreError, WriteMode};
use crate::config::DocumentStoreConfig;

const MAX_BACKOFF_SECONDS: i64 = 3600;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "outbox_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OutboxState {
    Pending,
    Delivered,
    Failed,
}

#[derive(Debug, Clone, FromRow)]
pub struct OutboxEntry {
    pub id: i64,
    pub collection: String,
    pub document_key: String,
    pub user_key: Option<String>,
    pub operation: WriteMode,
    pub occurred_at: DateTime<Utc>,
    pub body: Value,
    pub attempts: i32,
}

impl OutboxEntry {
    pub fn to_document(&self) -> Result<Document, DocumentStoreError> {
        Ok(Document {
            collection: Collection::parse(&self.collection)?,
            key: self.document_key.clone(),
            user_key: self.user_key.clone(),
            occurred_at: self.occurred_at,
            body: self.body.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, FromRow, PartialEq, Eq)]
pub struct OutboxStatus {
    pub pending: i64,
    pub failed: i64,
    pub delivered: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub delivered: usize,
    pub retried: usize,
    pub parked: usize,
    pub skipped: usize,
}

impl DrainReport {
    pub fn is_empty(&self) -> bool {
        self.delivered + self.retried + self.parked + self.skipped == 0
    }
}

/// Delay before the next delivery attempt: `2^attempts` seconds, capped at an hour.
pub fn backoff_delay(attempts: i32) -> Duration {
    let exponent = attempts.clamp(0, 12) as u32;
    Duration::seconds(2_i64.pow(exponent).min(MAX_BACKOFF_SECONDS))
}

/// Write side of the outbox. Cheap to clone; shared by every service that
/// mirrors records.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    notify: Arc<Notify>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a document write. Must run on the connection of the transaction
    /// that performs the relational write.
    pub async fn enqueue(
        &self,
        conn: &mut PgConnection,
        document: &Document,
        mode: WriteMode,
    ) -> Result<i64, sqlx::Error> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO document_outbox (collection, document_key, user_key, operation, occurred_at, body)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id",
        )
        .bind(document.collection.as_str())
        .bind(&document.key)
        .bind(&document.user_key)
        .bind(mode)
        .bind(document.occurred_at)
        .bind(&document.body)
        .fetch_one(conn)
        .await?;

        debug!(id, collection = %document.collection, key = %document.key, "outbox entry queued");
        Ok(id)
    }

    /// Wake the relay. Call after the enqueuing transaction commits.
    pub fn nudge(&self) {
        self.notify.notify_one();
    }
}

/// Copies pending outbox rows into the document store.
#[derive(Debug, Clone)]
pub struct OutboxRelay {
    db: PgPool,
    store: DocumentStore,
    outbox: Outbox,
    batch_size: i64,
    max_attempts: i32,
    retention: Duration,
}

impl OutboxRelay {
    pub fn new(db: PgPool, store: DocumentStore, outbox: Outbox, config: &DocumentStoreConfig) -> Self {
        Self {
            db,
            store,
            outbox,
            batch_size: config.batch_size.max(1),
            max_attempts: config.max_attempts.max(1),
            retention: Duration::days(config.retention_days.max(0)),
        }
    }

    pub fn nudge(&self) {
        self.outbox.nudge();
    }

    /// Deliver one batch. Rows for a given document are delivered in id order:
    /// a row is not claimed while an older row for the same document is still
    /// pending, and after a failure later rows for that document in the same
    /// batch are skipped.
    #[tracing::instrument(skip(self))]
    pub async fn drain_once(&self) -> Result<DrainReport, sqlx::Error> {
        let mut report = DrainReport::default();
        if !self.store.is_enabled() {
            return Ok(report);
        }

        let mut tx = self.db.begin().await?;
        let entries = sqlx::query_as::<_, OutboxEntry>(
            r#"
            SELECT o.id, o.collection, o.document_key, o.user_key, o.operation,
                   o.occurred_at, o.body, o.attempts
            FROM document_outbox o
            WHERE o.status = 'pending'
              AND o.next_attempt_at <= NOW()
              AND NOT EXISTS (
                  SELECT 1 FROM document_outbox older
                  WHERE older.collection = o.collection
                    AND older.document_key = o.document_key
                    AND older.status = 'pending'
                    AND older.id < o.id
              )
            ORDER BY o.id
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(self.batch_size)
        .fetch_all(&mut *tx)
        .await?;

        let mut blocked: HashSet<(String, String)> = HashSet::new();

        for entry in entries {
            let slot = (entry.collection.clone(), entry.document_key.clone());
            if blocked.contains(&slot) {
                report.skipped += 1;
                continue;
            }

            match self.deliver(&entry).await {
                Ok(()) => {
                    sqlx::query(
                        "UPDATE document_outbox
                         SET status = 'delivered', delivered_at = NOW(), attempts = attempts + 1, last_error = NULL
                         WHERE id = $1",
                    )
                    .bind(entry.id)
                    .execute(&mut *tx)
                    .await?;
                    report.delivered += 1;
                }
                Err(err) => {
                    blocked.insert(slot);
                    let attempts = entry.attempts + 1;
                    let parked = attempts >= self.max_attempts
                        || matches!(err, DocumentStoreError::UnknownCollection(_));
                    let status = if parked { OutboxState::Failed } else { OutboxState::Pending };
                    let next_attempt_at = Utc::now() + backoff_delay(attempts);

                    sqlx::query(
                        "UPDATE document_outbox
                         SET status = $2, attempts = $3, last_error = $4, next_attempt_at = $5
                         WHERE id = $1",
                    )
                    .bind(entry.id)
                    .bind(status)
                    .bind(attempts)
                    .bind(err.to_string())
                    .bind(next_attempt_at)
                    .execute(&mut *tx)
                    .await?;

                    if parked {
                        error!(id = entry.id, attempts, error = %err, "outbox entry parked as failed");
                        report.parked += 1;
                    } else {
                        warn!(id = entry.id, attempts, error = %err, "document store write failed, will retry");
                        report.retried += 1;
                    }
                }
            }
        }

        tx.commit().await?;

        if !report.is_empty() {
            info!(?report, "outbox drained");
        }
        Ok(report)
    }

    async fn deliver(&self, entry: &OutboxEntry) -> Result<(), DocumentStoreError> {
        let document = entry.to_document()?;
        self.store.write(&document, entry.operation).await
    }

    /// Drain until a batch comes back empty or something goes wrong.
    pub async fn drain_all(&self) -> Result<DrainReport, sqlx::Error> {
        let mut total = DrainReport::default();
        loop {
            let report = self.drain_once().await?;
            if report.delivered == 0 {
                total.retried += report.retried;
                total.parked += report.parked;
                total.skipped += report.skipped;
                return Ok(total);
            }
            total.delivered += report.delivered;
            total.retried += report.retried;
            total.parked += report.parked;
            total.skipped += report.skipped;
        }
    }

    /// Put parked rows back in the queue with a fresh attempt budget.
    pub async fn requeue_failed(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE document_outbox
             SET status = 'pending', attempts = 0, last_error = NULL, next_attempt_at = NOW()
             WHERE status = 'failed'",
        )
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete delivered rows older than the retention window. Pending and
    /// parked rows are never purged.
    pub async fn purge_delivered(&self) -> Result<u64, sqlx::Error> {
        let cutoff = Utc::now() - self.retention;
        let result = sqlx::query(
            "DELETE FROM document_outbox WHERE status = 'delivered' AND delivered_at < $1",
        )
        .bind(cutoff)
        .execute(&self.db)
        .await?;

        let purged = result.rows_affected();
        if purged > 0 {
            info!(purged, "delivered outbox rows purged");
        }
        Ok(purged)
    }

    pub async fn status(&self) -> Result<OutboxStatus, sqlx::Error> {
        sqlx::query_as::<_, OutboxStatus>(
            "SELECT COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                    COUNT(*) FILTER (WHERE status = 'failed') AS failed,
                    COUNT(*) FILTER (WHERE status = 'delivered') AS delivered
             FROM document_outbox",
        )
        .fetch_one(&self.db)
        .await
    }

    /// Drain whenever a service nudges the outbox. Periodic draining is left
    /// to the scheduler.
    pub fn spawn_listener(&self) -> JoinHandle<()> {
        let relay = self.clone();
        tokio::spawn(async move {
            loop {
                relay.outbox.notify.notified().await;
                if let Err(err) = relay.drain_once().await {
                    warn!(error = %err, "outbox drain after nudge failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_capped() {
        assert_eq!(backoff_delay(0), Duration::seconds(1));
        assert_eq!(backoff_delay(1), Duration::seconds(2));
        assert_eq!(backoff_delay(5), Duration::seconds(32));
        assert_eq!(backoff_delay(11), Duration::seconds(2048));
        assert_eq!(backoff_delay(12), Duration::seconds(3600));
        assert_eq!(backoff_delay(40), Duration::seconds(3600));
    }

    #[test]
    fn entries_with_unknown_collections_do_not_convert() {
        let entry = OutboxEntry {
            id: 1,
            collection: "legacy".to_string(),
            document_key: "k".to_string(),
            user_key: None,
            operation: WriteMode::Insert,
            occurred_at: Utc::now(),
            body: Value::Null,
            attempts: 0,
        };
        assert!(entry.to_document().is_err());
    }

    #[test]
    fn empty_report() {
        assert!(DrainReport::default().is_empty());
        assert!(!DrainReport { skipped: 1, ..Default::default() }.is_empty());
    }
}
