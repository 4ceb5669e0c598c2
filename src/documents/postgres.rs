use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

use super::{Collection, Document, DocumentStoreError, TimeRange};

/// JSONB-backed document store. The table is owned by this backend, not by the
/// relational migrations, so it can live in a separate database.
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct DocumentRow {
    collection: String,
    document_key: String,
    user_key: Option<String>,
    occurred_at: DateTime<Utc>,
    body: Value,
}

impl TryFrom<DocumentRow> for Document {
    type Error = DocumentStoreError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        Ok(Document {
            collection: Collection::parse(&row.collection)?,
            key: row.document_key,
            user_key: row.user_key,
            occurred_at: row.occurred_at,
            body: row.body,
        })
    }
}

impl PgDocumentStore {
    pub async fn connect(url: &str) -> Result<Self, DocumentStoreError> {
        let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: PgPool) -> Result<Self, DocumentStoreError> {
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), DocumentStoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection VARCHAR(64) NOT NULL,
                document_key VARCHAR(128) NOT NULL,
                user_key VARCHAR(128),
                occurred_at TIMESTAMPTZ NOT NULL,
                body JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (collection, document_key)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_documents_user
             ON documents (collection, user_key, occurred_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn insert(&self, document: &Document) -> Result<bool, DocumentStoreError> {
        let result = sqlx::query(
            "INSERT INTO documents (collection, document_key, user_key, occurred_at, body)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (collection, document_key) DO NOTHING",
        )
        .bind(document.collection.as_str())
        .bind(&document.key)
        .bind(&document.user_key)
        .bind(document.occurred_at)
        .bind(&document.body)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn upsert(&self, document: &Document) -> Result<(), DocumentStoreError> {
        sqlx::query(
            "INSERT INTO documents (collection, document_key, user_key, occurred_at, body)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (collection, document_key) DO UPDATE
             SET user_key = EXCLUDED.user_key,
                 occurred_at = EXCLUDED.occurred_at,
                 body = EXCLUDED.body,
                 updated_at = NOW()",
        )
        .bind(document.collection.as_str())
        .bind(&document.key)
        .bind(&document.user_key)
        .bind(document.occurred_at)
        .bind(&document.body)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<Document>, DocumentStoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT collection, document_key, user_key, occurred_at, body
             FROM documents WHERE collection = $1 AND document_key = $2",
        )
        .bind(collection.as_str())
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Document::try_from).transpose()
    }

    pub async fn find_by_user(
        &self,
        collection: Collection,
        user_key: &str,
        range: Option<TimeRange>,
        limit: usize,
    ) -> Result<Vec<Document>, DocumentStoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT collection, document_key, user_key, occurred_at, body
             FROM documents
             WHERE collection = $1 AND user_key = $2
               AND ($3::timestamptz IS NULL OR occurred_at >= $3)
               AND ($4::timestamptz IS NULL OR occurred_at < $4)
             ORDER BY occurred_at DESC
             LIMIT $5",
        )
        .bind(collection.as_str())
        .bind(user_key)
        .bind(range.map(|r| r.from))
        .bind(range.map(|r| r.to))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Document::try_from).collect()
    }

    pub async fn ping(&self) -> Result<(), DocumentStoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
