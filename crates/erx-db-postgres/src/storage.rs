//! PostgreSQL implementation of the BlobStore trait.

use std::collections::HashSet;

use async_trait::async_trait;
use erx_core::{BlobEntry, BlobId, BlobName, BlobType, NewBlobEntry};
use erx_storage::{BlobStore, StorageError};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::PgPool;
use tracing::{debug, instrument};

use crate::config::{BlobScope, PostgresConfig};
use crate::error::{commit_error, statement_error};
use crate::pool;
use crate::rows::{self, BlobRow, SELECT_COLUMNS};
use crate::schema;

/// Rows visible to this instance: unbound, or bound to this host and build.
const SCOPE_FILTER: &str =
    "(host_ip IS NULL OR host_ip = $1) AND (build IS NULL OR build = $2)";

/// PostgreSQL blob store.
///
/// Several instances share one table. Endorsement and attestation blobs are
/// stored with this instance's host address and quotes with its build, so
/// every instance only sees its own.
#[derive(Debug, Clone)]
pub struct PostgresBlobStore {
    pool: PgPool,
    scope: BlobScope,
}

impl PostgresBlobStore {
    /// Creates a new `PostgresBlobStore` with the given configuration.
    ///
    /// This will:
    /// 1. Create a connection pool
    /// 2. Create the blob table (if configured)
    ///
    /// # Errors
    ///
    /// Returns an error if the connection pool cannot be created
    /// or if the schema cannot be created.
    pub async fn new(config: &PostgresConfig) -> Result<Self, StorageError> {
        config
            .validate()
            .map_err(|e| StorageError::internal(format!("Configuration error: {e}")))?;

        let pool = pool::create_pool(config).await?;
        if config.ensure_schema {
            schema::ensure_schema(&pool).await?;
        }

        Ok(Self::from_pool(pool, config.scope()))
    }

    /// Creates a new `PostgresBlobStore` from an existing connection pool.
    ///
    /// The schema is not created when using this constructor.
    #[must_use]
    pub fn from_pool(pool: PgPool, scope: BlobScope) -> Self {
        Self { pool, scope }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[must_use]
    pub fn scope(&self) -> &BlobScope {
        &self.scope
    }

    fn host_ip_for(&self, blob_type: BlobType) -> Option<&str> {
        blob_type
            .is_host_bound()
            .then_some(self.scope.host_ip.as_deref())
            .flatten()
    }

    fn build_for(&self, blob_type: BlobType) -> Option<&str> {
        blob_type
            .is_build_bound()
            .then_some(self.scope.build.as_deref())
            .flatten()
    }
}

#[async_trait]
impl BlobStore for PostgresBlobStore {
    #[instrument(skip(self))]
    async fn list_all_sorted_by_id(&self) -> Result<Vec<BlobEntry>, StorageError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM {table} WHERE {SCOPE_FILTER} ORDER BY blob_id",
            table = schema::BLOB_TABLE
        );
        let rows: Vec<BlobRow> = query_as(&sql)
            .bind(self.scope.host_ip.as_deref())
            .bind(self.scope.build.as_deref())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| statement_error(e, "list blobs"))?;

        debug!(count = rows.len(), "listed blobs");
        rows.into_iter().map(rows::entry_from_row).collect()
    }

    #[instrument(skip(self, entry), fields(blob_type = %entry.blob_type, name = %entry.name))]
    async fn insert(&self, entry: NewBlobEntry) -> Result<BlobId, StorageError> {
        if let Some(message) = entry.consistency_error() {
            return Err(StorageError::invalid_blob(message));
        }

        let meta = rows::metadata_to_json(&entry.metadata)?;
        let valid_from = entry.valid_from.map(rows::time_to_chrono).transpose()?;
        let valid_until = entry.valid_until.map(rows::time_to_chrono).transpose()?;
        let sql = format!(
            "INSERT INTO {table} \
             (type, name, data, generation, host_ip, build, valid_from, valid_until, platform_state, meta) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING blob_id",
            table = schema::BLOB_TABLE
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| statement_error(e, "insert blob"))?;

        let id: i64 = query_scalar(&sql)
            .bind(entry.blob_type.code())
            .bind(entry.name.as_bytes())
            .bind(&entry.blob.data)
            .bind(i64::from(entry.blob.generation))
            .bind(self.host_ip_for(entry.blob_type))
            .bind(self.build_for(entry.blob_type))
            .bind(valid_from)
            .bind(valid_until)
            .bind(entry.required_platform_state.as_ref().map(|s| s.as_bytes()))
            .bind(meta)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| statement_error(e, "insert blob"))?;

        tx.commit()
            .await
            .map_err(|e| commit_error(&e, "insert blob"))?;

        let id = BlobId::try_from(id).map_err(|e| StorageError::internal(e.to_string()))?;
        debug!(id = %id, "inserted blob");
        Ok(id)
    }

    #[instrument(skip(self, name), fields(name = %name))]
    async fn delete(&self, blob_type: BlobType, name: &BlobName) -> Result<(), StorageError> {
        let sql = format!(
            "DELETE FROM {table} WHERE type = $1 AND name = $2",
            table = schema::BLOB_TABLE
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| statement_error(e, "delete blob"))?;

        let result = query(&sql)
            .bind(blob_type.code())
            .bind(name.as_bytes())
            .execute(&mut *tx)
            .await
            .map_err(|e| statement_error(e, "delete blob"))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(blob_type, name.clone()));
        }

        tx.commit()
            .await
            .map_err(|e| commit_error(&e, "delete blob"))?;

        debug!("deleted blob");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn has_valid_of_type(&self, types: &[BlobType]) -> Result<Vec<bool>, StorageError> {
        let codes: Vec<i16> = types.iter().map(|t| t.code()).collect();
        let sql = format!(
            "SELECT DISTINCT type FROM {table} \
             WHERE {SCOPE_FILTER} AND type = ANY($3) \
             AND (valid_from IS NULL OR valid_from <= now()) \
             AND (valid_until IS NULL OR valid_until >= now())",
            table = schema::BLOB_TABLE
        );

        let valid: Vec<i16> = query_scalar(&sql)
            .bind(self.scope.host_ip.as_deref())
            .bind(self.scope.build.as_deref())
            .bind(&codes)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| statement_error(e, "check valid blobs"))?;

        let valid: HashSet<i16> = valid.into_iter().collect();
        Ok(codes.iter().map(|code| valid.contains(code)).collect())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
