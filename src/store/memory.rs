//! In-process document store
//!
//! Used by tests and by the server when no `DATABASE_URL` is configured.
//! Documents keep their first insertion order, matching the order a full
//! collection scan returns.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use super::{Document, DocumentStore, Filter, StoreError, StoredDocument};

#[derive(Default)]
struct Collection {
    order: Vec<String>,
    docs: HashMap<String, Document>,
}

impl Collection {
    fn upsert(&mut self, id: &str, doc: Document) {
        if self.docs.insert(id.to_string(), doc).is_none() {
            self.order.push(id.to_string());
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map(|c| c.docs.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|c| c.docs.get(id))
            .cloned())
    }

    async fn put(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
        merge: bool,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write();
        let coll = collections.entry(collection.to_string()).or_default();

        let doc = match coll.docs.get(id) {
            Some(existing) if merge => {
                let mut merged = existing.clone();
                merged.extend(fields);
                merged
            }
            _ => fields,
        };
        coll.upsert(id, doc);
        Ok(())
    }

    async fn add(&self, collection: &str, fields: Document) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .upsert(&id, fields);
        Ok(id)
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let collections = self.collections.read();
        let Some(coll) = collections.get(collection) else {
            return Ok(vec![]);
        };

        Ok(coll
            .order
            .iter()
            .filter_map(|id| coll.docs.get(id).map(|doc| (id, doc)))
            .filter(|(_, doc)| filters.iter().all(|f| f.matches(doc)))
            .map(|(id, doc)| StoredDocument {
                id: id.clone(),
                fields: doc.clone(),
            })
            .collect())
    }

    async fn increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: i64,
        fields: Document,
    ) -> Result<i64, StoreError> {
        // Read and write happen under one write lock
        let mut collections = self.collections.write();
        let coll = collections.entry(collection.to_string()).or_default();

        let mut doc = coll.docs.get(id).cloned().unwrap_or_default();
        let not_an_integer = || StoreError::NotAnInteger {
            collection: collection.to_string(),
            id: id.to_string(),
            field: field.to_string(),
        };
        // Whole-valued floats such as 70.0 count, as they do in Postgres
        let current = match doc.get(field) {
            None | Some(Value::Null) => 0,
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .ok_or_else(not_an_integer)?,
            Some(_) => return Err(not_an_integer()),
        };

        let updated = current
            .checked_add(delta)
            .ok_or_else(|| StoreError::Overflow {
                collection: collection.to_string(),
                id: id.to_string(),
                field: field.to_string(),
            })?;
        doc.extend(fields);
        doc.insert(field.to_string(), Value::from(updated));
        coll.upsert(id, doc);

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_put_merge_and_replace() {
        let store = MemoryStore::new();
        store
            .put("users", "u1", doc(json!({ "name": "Ada", "bio": "hi" })), false)
            .await
            .unwrap();

        store
            .put("users", "u1", doc(json!({ "bio": "updated" })), true)
            .await
            .unwrap();
        let merged = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(merged["name"], json!("Ada"));
        assert_eq!(merged["bio"], json!("updated"));

        store
            .put("users", "u1", doc(json!({ "bio": "only" })), false)
            .await
            .unwrap();
        let replaced = store.get("users", "u1").await.unwrap().unwrap();
        assert!(replaced.get("name").is_none());
    }

    #[tokio::test]
    async fn test_query_keeps_insertion_order() {
        let store = MemoryStore::new();
        for (user, category) in [("u1", "CP"), ("u2", "CP"), ("u1", "Projects"), ("u1", "CP")] {
            store
                .add("data", doc(json!({ "userId": user, "category": category })))
                .await
                .unwrap();
        }

        let all = store.list("data").await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[2].fields["category"], json!("Projects"));

        let filtered = store
            .query(
                "data",
                &[Filter::eq("userId", "u1"), Filter::eq("category", "CP")],
            )
            .await
            .unwrap();
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0].id, all[0].id);
        assert_eq!(filtered[1].id, all[3].id);

        assert!(store.list("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_increment_creates_and_accumulates() {
        let store = MemoryStore::new();
        let total = store
            .increment("leaderboard", "u1", "points", 30, doc(json!({ "userId": "u1" })))
            .await
            .unwrap();
        assert_eq!(total, 30);

        let total = store
            .increment("leaderboard", "u1", "points", 40, Document::new())
            .await
            .unwrap();
        assert_eq!(total, 70);

        let entry = store.get("leaderboard", "u1").await.unwrap().unwrap();
        assert_eq!(entry["userId"], json!("u1"));
        assert_eq!(entry["points"], json!(70));
    }

    #[tokio::test]
    async fn test_increment_rejects_non_integer() {
        let store = MemoryStore::new();
        store
            .put("leaderboard", "u1", doc(json!({ "points": "many" })), false)
            .await
            .unwrap();

        let err = store
            .increment("leaderboard", "u1", "points", 10, Document::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotAnInteger { .. }));
    }

    #[tokio::test]
    async fn test_increment_accepts_whole_floats() {
        let store = MemoryStore::new();
        store
            .put("leaderboard", "u1", doc(json!({ "points": 70.0 })), false)
            .await
            .unwrap();

        let total = store
            .increment("leaderboard", "u1", "points", 30, Document::new())
            .await
            .unwrap();
        assert_eq!(total, 100);

        store
            .put("leaderboard", "u2", doc(json!({ "points": 70.5 })), false)
            .await
            .unwrap();
        let err = store
            .increment("leaderboard", "u2", "points", 30, Document::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotAnInteger { .. }));
    }

    #[tokio::test]
    async fn test_increment_overflow_leaves_document_alone() {
        let store = MemoryStore::new();
        store
            .put("leaderboard", "u1", doc(json!({ "points": i64::MAX - 5 })), false)
            .await
            .unwrap();

        let err = store
            .increment("leaderboard", "u1", "points", 30, Document::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Overflow { .. }));

        let entry = store.get("leaderboard", "u1").await.unwrap().unwrap();
        assert_eq!(entry["points"], json!(i64::MAX - 5));
    }

    #[tokio::test]
    async fn test_concurrent_increments_do_not_lose_updates() {
        let store = Arc::new(MemoryStore::new());
        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .increment("leaderboard", "u1", "points", 10, Document::new())
                        .await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let entry = store.get("leaderboard", "u1").await.unwrap().unwrap();
        assert_eq!(entry["points"], json!(500));
        assert_eq!(store.count("leaderboard"), 1);
    }
}
