use redis::{aio::MultiplexedConnection, Client};

use super::{Collection, Document, DocumentStoreError, TimeRange};

const KEY_PREFIX: &str = "campus_gym";

/// Redis backend: each document is a JSON string, and every user has a sorted
/// set per collection scored by `occurred_at` in milliseconds.
#[derive(Debug, Clone)]
pub struct RedisDocumentStore {
    client: Client,
}

fn document_key(collection: Collection, key: &str) -> String {
    format!("{}:{}:{}", KEY_PREFIX, collection.as_str(), key)
}

fn user_index_key(collection: Collection, user_key: &str) -> String {
    format!("{}:{}:user:{}", KEY_PREFIX, collection.as_str(), user_key)
}

impl RedisDocumentStore {
    pub fn open(url: &str) -> Result<Self, DocumentStoreError> {
        Ok(Self {
            client: Client::open(url)?,
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, DocumentStoreError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    async fn index(
        &self,
        conn: &mut MultiplexedConnection,
        document: &Document,
    ) -> Result<(), DocumentStoreError> {
        if let Some(user_key) = &document.user_key {
            redis::cmd("ZADD")
                .arg(user_index_key(document.collection, user_key))
                .arg(document.occurred_at.timestamp_millis())
                .arg(&document.key)
                .query_async::<_, i64>(conn)
                .await?;
        }
        Ok(())
    }

    pub async fn insert(&self, document: &Document) -> Result<bool, DocumentStoreError> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(document)?;
        let written: Option<String> = redis::cmd("SET")
            .arg(document_key(document.collection, &document.key))
            .arg(payload)
            .arg("NX")
            .query_async(&mut conn)
            .await?;

        // Re-index even when the document already existed, so a crash between
        // SET and ZADD heals on the next delivery attempt.
        self.index(&mut conn, document).await?;
        Ok(written.is_some())
    }

    pub async fn upsert(&self, document: &Document) -> Result<(), DocumentStoreError> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(document)?;
        redis::cmd("SET")
            .arg(document_key(document.collection, &document.key))
            .arg(payload)
            .query_async::<_, ()>(&mut conn)
            .await?;
        self.index(&mut conn, document).await
    }

    pub async fn find(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<Document>, DocumentStoreError> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = redis::cmd("GET")
            .arg(document_key(collection, key))
            .query_async(&mut conn)
            .await?;

        payload
            .map(|p| serde_json::from_str(&p).map_err(DocumentStoreError::from))
            .transpose()
    }

    pub async fn find_by_user(
        &self,
        collection: Collection,
        user_key: &str,
        range: Option<TimeRange>,
        limit: usize,
    ) -> Result<Vec<Document>, DocumentStoreError> {
        let mut conn = self.connection().await?;
        let (max, min) = match range {
            // Upper bound is exclusive.
            Some(r) => (format!("({}", r.to.timestamp_millis()), r.from.timestamp_millis().to_string()),
            None => ("+inf".to_string(), "-inf".to_string()),
        };

        let keys: Vec<String> = redis::cmd("ZREVRANGEBYSCORE")
            .arg(user_index_key(collection, user_key))
            .arg(max)
            .arg(min)
            .arg("LIMIT")
            .arg(0)
            .arg(limit)
            .query_async(&mut conn)
            .await?;

        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let full_keys: Vec<String> = keys.iter().map(|k| document_key(collection, k)).collect();
        let payloads: Vec<Option<String>> = redis::cmd("MGET")
            .arg(full_keys)
            .query_async(&mut conn)
            .await?;

        payloads
            .into_iter()
            .flatten()
            .map(|p| serde_json::from_str(&p).map_err(DocumentStoreError::from))
            .collect()
    }

    pub async fn ping(&self) -> Result<(), DocumentStoreError> {
        let mut conn = self.connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_by_collection() {
        assert_eq!(
            document_key(Collection::ProgressLogs, "42"),
            "campus_gym:progress_logs:42"
        );
        assert_eq!(
            user_index_key(Collection::UserActivityLogs, "u-1"),
            "campus_gym:user_activity_logs:user:u-1"
        );
    }

    #[test]
    fn bad_url_is_rejected_without_connecting() {
        assert!(RedisDocumentStore::open("not a url").is_err());
        assert!(RedisDocumentStore::open("redis://127.0.0.1:6379").is_ok());
    }
}
