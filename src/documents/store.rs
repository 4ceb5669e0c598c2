use tracing::info;

use super::{
    Collection, Document, DocumentStoreError, MemoryDocumentStore, PgDocumentStore,
    RedisDocumentStore, TimeRange, WriteMode,
};
use crate::config::{DocumentBackend, DocumentStoreConfig};

/// Document store client, constructed once at startup and passed to whoever
/// needs it.
#[derive(Debug, Clone)]
pub enum DocumentStore {
    Disabled,
    Memory(MemoryDocumentStore),
    Postgres(PgDocumentStore),
    Redis(RedisDocumentStore),
}

impl DocumentStore {
    pub async fn connect(config: &DocumentStoreConfig) -> Result<Self, DocumentStoreError> {
        let backend = config
            .backend()
            .map_err(|e| DocumentStoreError::Unavailable(e.to_string()))?;

        let store = match backend {
            DocumentBackend::Disabled => DocumentStore::Disabled,
            DocumentBackend::Memory => DocumentStore::Memory(MemoryDocumentStore::new()),
            DocumentBackend::Postgres(url) => {
                DocumentStore::Postgres(PgDocumentStore::connect(&url).await?)
            }
            DocumentBackend::Redis(url) => DocumentStore::Redis(RedisDocumentStore::open(&url)?),
        };

        info!(backend = store.backend_name(), "document store configured");
        Ok(store)
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, DocumentStore::Disabled)
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            DocumentStore::Disabled => "disabled",
            DocumentStore::Memory(_) => "memory",
            DocumentStore::Postgres(_) => "postgres",
            DocumentStore::Redis(_) => "redis",
        }
    }

    /// Insert unless a document with the same key exists. Returns whether
    /// anything was written.
    pub async fn insert(&self, document: &Document) -> Result<bool, DocumentStoreError> {
        match self {
            DocumentStore::Disabled => Err(DocumentStoreError::Disabled),
            DocumentStore::Memory(store) => store.insert(document).await,
            DocumentStore::Postgres(store) => store.insert(document).await,
            DocumentStore::Redis(store) => store.insert(document).await,
        }
    }

    pub async fn upsert(&self, document: &Document) -> Result<(), DocumentStoreError> {
        match self {
            DocumentStore::Disabled => Err(DocumentStoreError::Disabled),
            DocumentStore::Memory(store) => store.upsert(document).await,
            DocumentStore::Postgres(store) => store.upsert(document).await,
            DocumentStore::Redis(store) => store.upsert(document).await,
        }
    }

    pub async fn write(&self, document: &Document, mode: WriteMode) -> Result<(), DocumentStoreError> {
        match mode {
            WriteMode::Insert => self.insert(document).await.map(|_| ()),
            WriteMode::Upsert => self.upsert(document).await,
        }
    }

    pub async fn find(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<Document>, DocumentStoreError> {
        match self {
            DocumentStore::Disabled => Ok(None),
            DocumentStore::Memory(store) => store.find(collection, key).await,
            DocumentStore::Postgres(store) => store.find(collection, key).await,
            DocumentStore::Redis(store) => store.find(collection, key).await,
        }
    }

    /// Documents belonging to a user, newest first.
    pub async fn find_by_user(
        &self,
        collection: Collection,
        user_key: &str,
        range: Option<TimeRange>,
        limit: usize,
    ) -> Result<Vec<Document>, DocumentStoreError> {
        match self {
            DocumentStore::Disabled => Ok(Vec::new()),
            DocumentStore::Memory(store) => store.find_by_user(collection, user_key, range, limit).await,
            DocumentStore::Postgres(store) => {
                store.find_by_user(collection, user_key, range, limit).await
            }
            DocumentStore::Redis(store) => store.find_by_user(collection, user_key, range, limit).await,
        }
    }

    pub async fn ping(&self) -> Result<(), DocumentStoreError> {
        match self {
            DocumentStore::Disabled => Err(DocumentStoreError::Disabled),
            DocumentStore::Memory(_) => Ok(()),
            DocumentStore::Postgres(store) => store.ping().await,
            DocumentStore::Redis(store) => store.ping().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[tokio::test]
    async fn disabled_store_reads_nothing_and_refuses_writes() {
        let store = DocumentStore::Disabled;
        let document = Document {
            collection: Collection::ProgressLogs,
            key: "k".to_string(),
            user_key: None,
            occurred_at: Utc::now(),
            body: json!({}),
        };

        assert!(!store.is_enabled());
        assert!(matches!(store.insert(&document).await, Err(DocumentStoreError::Disabled)));
        assert!(store.find(Collection::ProgressLogs, "k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_url_opens_the_memory_backend() {
        let config = DocumentStoreConfig {
            url: Some("memory://".to_string()),
            ..Default::default()
        };
        let store = DocumentStore::connect(&config).await.unwrap();
        assert_eq!(store.backend_name(), "memory");
        assert!(store.ping().await.is_ok());
    }
}
