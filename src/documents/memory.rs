use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{Collection, Document, DocumentStoreError, TimeRange};

/// Process-local backend used in development and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    documents: Arc<RwLock<HashMap<(Collection, String), Document>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every call fails until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), DocumentStoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(DocumentStoreError::Unavailable("memory store offline".to_string()))
        } else {
            Ok(())
        }
    }

    pub async fn insert(&self, document: &Document) -> Result<bool, DocumentStoreError> {
        self.check()?;
        let mut documents = self.documents.write().await;
        let slot = (document.collection, document.key.clone());
        if documents.contains_key(&slot) {
            return Ok(false);
        }
        documents.insert(slot, document.clone());
        Ok(true)
    }

    pub async fn upsert(&self, document: &Document) -> Result<(), DocumentStoreError> {
        self.check()?;
        self.documents
            .write()
            .await
            .insert((document.collection, document.key.clone()), document.clone());
        Ok(())
    }

    pub async fn find(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<Document>, DocumentStoreError> {
        self.check()?;
        Ok(self
            .documents
            .read()
            .await
            .get(&(collection, key.to_string()))
            .cloned())
    }

    pub async fn find_by_user(
        &self,
        collection: Collection,
        user_key: &str,
        range: Option<TimeRange>,
        limit: usize,
    ) -> Result<Vec<Document>, DocumentStoreError> {
        self.check()?;
        let documents = self.documents.read().await;
        let mut found: Vec<Document> = documents
            .values()
            .filter(|d| d.collection == collection && d.user_key.as_deref() == Some(user_key))
            .filter(|d| range.map_or(true, |r| r.contains(d.occurred_at)))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        found.truncate(limit);
        Ok(found)
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn document(key: &str, user: &str, minutes_ago: i64, body: serde_json::Value) -> Document {
        Document {
            collection: Collection::UserActivityLogs,
            key: key.to_string(),
            user_key: Some(user.to_string()),
            occurred_at: Utc::now() - Duration::minutes(minutes_ago),
            body,
        }
    }

    #[tokio::test]
    async fn insert_keeps_the_first_write() {
        let store = MemoryDocumentStore::new();
        assert!(store.insert(&document("a", "u1", 0, json!({"v": 1}))).await.unwrap());
        assert!(!store.insert(&document("a", "u1", 0, json!({"v": 2}))).await.unwrap());

        let stored = store.find(Collection::UserActivityLogs, "a").await.unwrap().unwrap();
        assert_eq!(stored.body, json!({"v": 1}));
    }

    #[tokio::test]
    async fn upsert_replaces() {
        let store = MemoryDocumentStore::new();
        store.upsert(&document("a", "u1", 0, json!({"v": 1}))).await.unwrap();
        store.upsert(&document("a", "u1", 0, json!({"v": 2}))).await.unwrap();

        let stored = store.find(Collection::UserActivityLogs, "a").await.unwrap().unwrap();
        assert_eq!(stored.body, json!({"v": 2}));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn user_documents_come_back_newest_first() {
        let store = MemoryDocumentStore::new();
        store.insert(&document("old", "u1", 30, json!({}))).await.unwrap();
        store.insert(&document("new", "u1", 1, json!({}))).await.unwrap();
        store.insert(&document("other", "u2", 1, json!({}))).await.unwrap();

        let found = store
            .find_by_user(Collection::UserActivityLogs, "u1", None, 10)
            .await
            .unwrap();
        let keys: Vec<_> = found.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["new", "old"]);

        let recent = TimeRange {
            from: Utc::now() - Duration::minutes(10),
            to: Utc::now() + Duration::minutes(1),
        };
        let found = store
            .find_by_user(Collection::UserActivityLogs, "u1", Some(recent), 10)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn outage_fails_every_call() {
        let store = MemoryDocumentStore::new();
        store.set_unavailable(true);
        assert!(store.insert(&document("a", "u1", 0, json!({}))).await.is_err());
        store.set_unavailable(false);
        assert!(store.insert(&document("a", "u1", 0, json!({}))).await.is_ok());
    }
}
