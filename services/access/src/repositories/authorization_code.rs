//! Authorization code repository for database operations

use async_trait::async_trait;
use common::error::DatabaseError;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::AuthorizationCodeStore;
use crate::error::AccessResult;
use crate::models::{AuthorizationCode, NewAuthorizationCode};

/// PostgreSQL-backed authorization code store
#[derive(Clone)]
pub struct PgAuthorizationCodeStore {
    pool: PgPool,
}

impl PgAuthorizationCodeStore {
    /// Create a new authorization code store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthorizationCodeStore for PgAuthorizationCodeStore {
    async fn replace_for_booking(
        &self,
        code: NewAuthorizationCode,
    ) -> AccessResult<AuthorizationCode> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Connection)?;

        let superseded = sqlx::query("DELETE FROM authorization_codes WHERE booking_id = $1")
            .bind(code.booking_id)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::Query)?
            .rows_affected();

        let stored = sqlx::query_as::<_, AuthorizationCode>(
            r#"
            INSERT INTO authorization_codes (id, booking_id, code, valid_from, valid_until)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, booking_id, code, valid_from, valid_until
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(code.booking_id)
        .bind(&code.code)
        .bind(code.valid_from)
        .bind(code.valid_until)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        tx.commit().await.map_err(DatabaseError::Query)?;

        if superseded > 0 {
            info!(booking_id = %code.booking_id, "Superseded previous authorization code");
        }

        Ok(stored)
    }

    async fn find_by_booking(&self, booking_id: Uuid) -> AccessResult<Option<AuthorizationCode>> {
        let code = sqlx::query_as::<_, AuthorizationCode>(
            r#"
            SELECT id, booking_id, code, valid_from, valid_until
            FROM authorization_codes
            WHERE booking_id = $1
            "#,
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(code)
    }

    async fn delete_by_booking(&self, booking_id: Uuid) -> AccessResult<Option<AuthorizationCode>> {
        let code = sqlx::query_as::<_, AuthorizationCode>(
            r#"
            DELETE FROM authorization_codes
            WHERE booking_id = $1
            RETURNING id, booking_id, code, valid_from, valid_until
            "#,
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(code)
    }
}
