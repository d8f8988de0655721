//! Errors raised while talking to PostgreSQL
//!
//! Services wrap [`DatabaseError`] in their own error enums through `#[from]`.

use sqlx::Error as SqlxError;
use sqlx::migrate::MigrateError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Pool could not hand out or open a connection
    #[error("could not reach database: {0}")]
    Connection(#[source] SqlxError),

    #[error("query failed: {0}")]
    Query(#[source] SqlxError),

    #[error("migration failed: {0}")]
    Migration(#[source] MigrateError),

    /// Invalid settings, detected before any connection attempt
    #[error("invalid database configuration: {0}")]
    Configuration(String),

    /// Work submitted to a transaction that was already committed or rolled back
    #[error("transaction already finished")]
    TransactionClosed,

    /// A statement failed outside a savepoint, so PostgreSQL would roll back on commit
    #[error("transaction aborted by an earlier failure")]
    TransactionAborted,
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;
