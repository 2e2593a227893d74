//! Schema management for the PostgreSQL blob store.

use sqlx_core::query::query;
use sqlx_postgres::PgPool;
use tracing::{debug, instrument};

use crate::error::{PostgresError, Result};

/// Name of the blob table.
pub const BLOB_TABLE: &str = "hsm_blob";

const SCHEMA: &[&str] = &[
    r"CREATE TABLE IF NOT EXISTS hsm_blob (
        blob_id        BIGSERIAL PRIMARY KEY,
        type           SMALLINT NOT NULL,
        name           BYTEA NOT NULL,
        data           BYTEA NOT NULL,
        generation     BIGINT NOT NULL,
        host_ip        TEXT,
        build          TEXT,
        valid_from     TIMESTAMPTZ,
        valid_until    TIMESTAMPTZ,
        platform_state BYTEA,
        meta           JSONB,
        CONSTRAINT hsm_blob_type_name_key UNIQUE (type, name),
        CONSTRAINT hsm_blob_name_check CHECK (octet_length(name) > 0),
        CONSTRAINT hsm_blob_validity_check
            CHECK (valid_from IS NULL OR valid_until IS NULL OR valid_from <= valid_until)
    )",
    "CREATE INDEX IF NOT EXISTS hsm_blob_type_idx ON hsm_blob (type)",
];

/// Creates the blob table and its indexes if they do not exist.
#[instrument(skip(pool))]
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        query(statement)
            .execute(pool)
            .await
            .map_err(|e| PostgresError::schema(format!("{e}")))?;
    }
    debug!(table = BLOB_TABLE, "blob schema ready");
    Ok(())
}
