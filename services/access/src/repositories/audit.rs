//! Audit entry repository for database operations
//!
//! The queries are executor-generic so they run both on the pool and inside
//! a background job's transaction.

use async_trait::async_trait;
use common::error::DatabaseError;
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use super::AuditStore;
use crate::error::AccessResult;
use crate::models::{AuditEntry, NewAuditEntry};

pub(crate) async fn insert_entry<'e, E>(
    executor: E,
    entry: &NewAuditEntry,
) -> sqlx::Result<AuditEntry>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, AuditEntry>(
        r#"
        INSERT INTO audit_entries
            (id, authorization_code_id, command, response_status, response_message)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, authorization_code_id, command, response_status, response_message, accessed_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(entry.authorization_code_id)
    .bind(&entry.command)
    .bind(&entry.response_status)
    .bind(&entry.response_message)
    .fetch_one(executor)
    .await
}

/// Insert `entries` in order on one connection, stopping at the first failure
pub(crate) async fn insert_entries(
    conn: &mut PgConnection,
    entries: &[NewAuditEntry],
) -> sqlx::Result<Vec<AuditEntry>> {
    let mut stored = Vec::with_capacity(entries.len());
    for entry in entries {
        stored.push(insert_entry(&mut *conn, entry).await?);
    }
    Ok(stored)
}

pub(crate) async fn entries_for_code<'e, E>(
    executor: E,
    authorization_code_id: Uuid,
) -> sqlx::Result<Vec<AuditEntry>>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, AuditEntry>(
        r#"
        SELECT id, authorization_code_id, command, response_status, response_message, accessed_at
        FROM audit_entries
        WHERE authorization_code_id = $1
        ORDER BY accessed_at ASC
        "#,
    )
    .bind(authorization_code_id)
    .fetch_all(executor)
    .await
}

/// Pool-backed audit store; every append commits on its own
#[derive(Clone)]
pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    /// Create a new audit store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn append(&self, entry: NewAuditEntry) -> AccessResult<AuditEntry> {
        let stored = insert_entry(&self.pool, &entry)
            .await
            .map_err(DatabaseError::Query)?;
        Ok(stored)
    }

    async fn append_all(&self, entries: Vec<NewAuditEntry>) -> AccessResult<Vec<AuditEntry>> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Connection)?;
        let stored = insert_entries(&mut tx, &entries)
            .await
            .map_err(DatabaseError::Query)?;
        tx.commit().await.map_err(DatabaseError::Query)?;
        Ok(stored)
    }

    async fn list_for_code(&self, authorization_code_id: Uuid) -> AccessResult<Vec<AuditEntry>> {
        let entries = entries_for_code(&self.pool, authorization_code_id)
            .await
            .map_err(DatabaseError::Query)?;
        Ok(entries)
    }
}
