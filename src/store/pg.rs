//! PostgreSQL document store
//!
//! Each document is one JSONB row keyed by `(collection, id)`. Insertion
//! order is preserved through a sequence column. Connects with DATABASE_URL.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use serde_json::Value;
use tokio_postgres::NoTls;
use tracing::{debug, info};

use super::{Document, DocumentStore, Filter, StoreError, StoredDocument};

/// Database pool configuration
const DB_POOL_MAX_SIZE: usize = 20;
const DB_QUERY_TIMEOUT_SECS: u64 = 30;

impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(e: tokio_postgres::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: Pool,
}

impl PgDocumentStore {
    /// Create storage from DATABASE_URL
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let mut config = Config::new();
        config.url = Some(database_url.to_string());

        config.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        config.pool = Some(PoolConfig {
            max_size: DB_POOL_MAX_SIZE,
            timeouts: deadpool_postgres::Timeouts {
                wait: Some(Duration::from_secs(DB_QUERY_TIMEOUT_SECS)),
                create: Some(Duration::from_secs(10)),
                recycle: Some(Duration::from_secs(30)),
            },
            ..Default::default()
        });

        let pool = config.create_pool(Some(Runtime::Tokio1), NoTls)?;

        // Test connection
        let client = pool.get().await?;
        client
            .execute(
                &format!("SET statement_timeout = '{}s'", DB_QUERY_TIMEOUT_SECS),
                &[],
            )
            .await?;

        info!(
            "Connected to PostgreSQL (pool_size: {}, query_timeout: {}s)",
            DB_POOL_MAX_SIZE, DB_QUERY_TIMEOUT_SECS
        );

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run embedded migrations
    async fn run_migrations(&self) -> anyhow::Result<()> {
        let client = self.pool.get().await?;

        let exists: bool = client
            .query_one(
                "SELECT EXISTS(SELECT 1 FROM information_schema.tables WHERE table_name = 'schema_migrations')",
                &[],
            )
            .await?
            .get(0);

        if !exists {
            let migration_sql = include_str!("../../migrations/001_documents.sql");
            client.batch_execute(migration_sql).await?;
            info!("Applied migration 001_documents");
        }

        Ok(())
    }
}

/// Filters as a JSONB containment pattern (`fields @> pattern`)
fn containment_pattern(filters: &[Filter]) -> Value {
    Value::Object(
        filters
            .iter()
            .map(|f| (f.field.clone(), f.value.clone()))
            .collect(),
    )
}

fn into_document(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let client = self.pool.get().await?;

        let row = client
            .query_opt(
                "SELECT fields FROM documents WHERE collection = $1 AND id = $2",
                &[&collection, &id],
            )
            .await?;

        Ok(row.map(|r| into_document(r.get(0))))
    }

    async fn put(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
        merge: bool,
    ) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        let fields = Value::Object(fields);

        let sql = if merge {
            "INSERT INTO documents (collection, id, fields) VALUES ($1, $2, $3)
             ON CONFLICT (collection, id) DO UPDATE
             SET fields = documents.fields || EXCLUDED.fields, updated_at = NOW()"
        } else {
            "INSERT INTO documents (collection, id, fields) VALUES ($1, $2, $3)
             ON CONFLICT (collection, id) DO UPDATE
             SET fields = EXCLUDED.fields, updated_at = NOW()"
        };

        client.execute(sql, &[&collection, &id, &fields]).await?;
        debug!("Wrote {}/{} (merge: {})", collection, id, merge);
        Ok(())
    }

    async fn add(&self, collection: &str, fields: Document) -> Result<String, StoreError> {
        let client = self.pool.get().await?;
        let id = uuid::Uuid::new_v4().simple().to_string();

        client
            .execute(
                "INSERT INTO documents (collection, id, fields) VALUES ($1, $2, $3)",
                &[&collection, &id, &Value::Object(fields)],
            )
            .await?;

        debug!("Added {}/{}", collection, id);
        Ok(id)
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let client = self.pool.get().await?;

        let rows = if filters.is_empty() {
            client
                .query(
                    "SELECT id, fields FROM documents WHERE collection = $1 ORDER BY seq",
                    &[&collection],
                )
                .await?
        } else {
            client
                .query(
                    "SELECT id, fields FROM documents
                     WHERE collection = $1 AND fields @> $2
                     ORDER BY seq",
                    &[&collection, &containment_pattern(filters)],
                )
                .await?
        };

        Ok(rows
            .iter()
            .map(|r| StoredDocument {
                id: r.get(0),
                fields: into_document(r.get(1)),
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
        let client = self.pool.get().await?;
        let fields = Value::Object(fields);

        // Single statement: concurrent increments serialize on the row lock
        let row = client
            .query_one(
                "INSERT INTO documents (collection, id, fields)
                 VALUES ($1, $2, $4::jsonb || jsonb_build_object($3::text, $5::bigint))
                 ON CONFLICT (collection, id) DO UPDATE
                 SET fields = documents.fields || $4::jsonb || jsonb_build_object(
                         $3::text,
                         COALESCE((documents.fields ->> $3::text)::numeric, 0)::bigint + $5::bigint
                     ),
                     updated_at = NOW()
                 RETURNING (fields ->> $3::text)::bigint",
                &[&collection, &id, &field, &fields, &delta],
            )
            .await?;

        let updated: i64 = row.get(0);
        debug!(
            "Incremented {}/{}.{} by {} to {}",
            collection, id, field, delta, updated
        );
        Ok(updated)
    }
}
