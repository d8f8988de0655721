//! Transaction-backed resource for background jobs
//!
//! The transaction opens on the first write, so work done before that (device
//! round-trips in particular) holds no connection. Each [`AuditStore::append_all`]
//! batch runs inside its own savepoint: a failing batch is rolled back alone
//! and the rest of the job's writes stay pending for the final commit.

use async_trait::async_trait;
use common::error::DatabaseError;
use sqlx::{Connection, PgPool, Postgres, Transaction};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

use super::AuditStore;
use super::audit::{entries_for_code, insert_entries};
use crate::error::{AccessError, AccessResult};
use crate::models::{AuditEntry, NewAuditEntry};
use crate::session::{JobResource, ResourceFactory};

type OpenTransaction = Transaction<'static, Postgres>;

/// One lazily opened transaction; writes stay invisible until [`JobResource::commit`]
pub struct PgJobResource {
    pool: PgPool,
    tx: Mutex<Option<OpenTransaction>>,
    closed: AtomicBool,
    // Set when a batch failed and its savepoint could not be rolled back,
    // which leaves PostgreSQL refusing everything up to the final ROLLBACK
    poisoned: AtomicBool,
}

fn closed() -> AccessError {
    AccessError::Database(DatabaseError::TransactionClosed)
}

impl PgJobResource {
    fn new(pool: PgPool) -> Self {
        Self {
            pool,
            tx: Mutex::new(None),
            closed: AtomicBool::new(false),
            poisoned: AtomicBool::new(false),
        }
    }

    /// Lock the transaction slot, beginning the transaction if needed
    async fn open(&self) -> AccessResult<MutexGuard<'_, Option<OpenTransaction>>> {
        let mut guard = self.tx.lock().await;
        if self.closed.load(Ordering::SeqCst) {
            return Err(closed());
        }
        if self.poisoned.load(Ordering::SeqCst) {
            return Err(AccessError::Database(DatabaseError::TransactionAborted));
        }
        if guard.is_none() {
            debug!("Beginning job transaction");
            let tx = self.pool.begin().await.map_err(DatabaseError::Connection)?;
            *guard = Some(tx);
        }
        Ok(guard)
    }
}

#[async_trait]
impl JobResource for PgJobResource {
    async fn commit(&self) -> AccessResult<()> {
        let mut guard = self.tx.lock().await;
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(closed());
        }
        let Some(tx) = guard.take() else {
            return Ok(());
        };

        if self.poisoned.load(Ordering::SeqCst) {
            if let Err(e) = tx.rollback().await {
                warn!("Failed to roll back aborted job transaction: {}", e);
            }
            return Err(AccessError::Database(DatabaseError::TransactionAborted));
        }

        tx.commit().await.map_err(DatabaseError::Query)?;
        Ok(())
    }

    async fn release(&self) {
        let mut guard = self.tx.lock().await;
        self.closed.store(true, Ordering::SeqCst);
        // Still open only when commit never happened
        if let Some(tx) = guard.take() {
            if let Err(e) = tx.rollback().await {
                warn!("Failed to roll back job transaction: {}", e);
            }
        }
    }
}

#[async_trait]
impl AuditStore for PgJobResource {
    async fn append(&self, entry: NewAuditEntry) -> AccessResult<AuditEntry> {
        let mut stored = self.append_all(vec![entry]).await?;
        let entry = stored.pop().ok_or(DatabaseError::Query(sqlx::Error::RowNotFound))?;
        Ok(entry)
    }

    async fn append_all(&self, entries: Vec<NewAuditEntry>) -> AccessResult<Vec<AuditEntry>> {
        let mut guard = self.open().await?;
        let tx = guard.as_mut().ok_or_else(closed)?;

        let mut savepoint = match Connection::begin(&mut **tx).await {
            Ok(savepoint) => savepoint,
            Err(e) => {
                self.poisoned.store(true, Ordering::SeqCst);
                return Err(DatabaseError::Query(e).into());
            }
        };

        let inserted = insert_entries(&mut savepoint, &entries).await;
        match inserted {
            Ok(stored) => {
                if let Err(e) = savepoint.commit().await {
                    self.poisoned.store(true, Ordering::SeqCst);
                    return Err(DatabaseError::Query(e).into());
                }
                Ok(stored)
            }
            Err(e) => {
                if let Err(rollback) = savepoint.rollback().await {
                    warn!("Failed to roll back audit savepoint: {}", rollback);
                    self.poisoned.store(true, Ordering::SeqCst);
                }
                Err(DatabaseError::Query(e).into())
            }
        }
    }

    async fn list_for_code(&self, authorization_code_id: Uuid) -> AccessResult<Vec<AuditEntry>> {
        let mut guard = self.open().await?;
        let tx = guard.as_mut().ok_or_else(closed)?;
        let entries = entries_for_code(&mut **tx, authorization_code_id)
            .await
            .map_err(|e| {
                self.poisoned.store(true, Ordering::SeqCst);
                DatabaseError::Query(e)
            })?;
        Ok(entries)
    }
}

/// Hands each job run its own [`PgJobResource`] on the pool
#[derive(Clone)]
pub struct PgResourceFactory {
    pool: PgPool,
}

impl PgResourceFactory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourceFactory for PgResourceFactory {
    type Resource = PgJobResource;

    async fn acquire(&self) -> AccessResult<PgJobResource> {
        Ok(PgJobResource::new(self.pool.clone()))
    }
}
