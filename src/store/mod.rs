//! Document store abstraction
//!
//! Collections of JSON documents keyed by id, with equality-filtered
//! queries and an atomic per-field counter. Every persistent operation in
//! the service goes through [`DocumentStore`].

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgDocumentStore;

/// Field map of a single document
pub type Document = Map<String, Value>;

/// A document together with its key
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub fields: Document,
}

/// Equality filter on a top-level field
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        doc.get(&self.field) == Some(&self.value)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    #[error("document store error: {0}")]
    Backend(String),
    #[error("field {field} of {collection}/{id} is not an integer")]
    NotAnInteger {
        collection: String,
        id: String,
        field: String,
    },
    #[error("field {field} of {collection}/{id} would overflow")]
    Overflow {
        collection: String,
        id: String,
        field: String,
    },
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by id
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Write a document. With `merge` the given fields are layered over the
    /// existing ones, otherwise the document is replaced.
    async fn put(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
        merge: bool,
    ) -> Result<(), StoreError>;

    /// Insert a document under a store-assigned id
    async fn add(&self, collection: &str, fields: Document) -> Result<String, StoreError>;

    /// All documents matching every filter, in insertion order
    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> Result<Vec<StoredDocument>, StoreError>;

    /// Atomically add `delta` to an integer field, creating the document
    /// (and the field, starting from 0) when absent. `fields` are merged
    /// into the document in the same write. Returns the new value.
    async fn increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: i64,
        fields: Document,
    ) -> Result<i64, StoreError>;

    /// Full collection scan
    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>, StoreError> {
        self.query(collection, &[]).await
    }
}
