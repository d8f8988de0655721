//! Property repository for database operations
//!
//! Reads the booking service's `properties`, `users` and `bookings` tables.

use async_trait::async_trait;
use common::error::DatabaseError;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::PropertyRepository;
use crate::error::AccessResult;
use crate::models::{Owner, Property};

/// PostgreSQL-backed property repository
#[derive(Clone)]
pub struct PgPropertyRepository {
    pool: PgPool,
}

impl PgPropertyRepository {
    /// Create a new property repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn property_from_row(row: PgRow) -> Property {
    Property {
        id: row.get("id"),
        name: row.get("name"),
        lock_id: row.get("lock_id"),
        owner: Owner {
            id: row.get("owner_id"),
            email: row.get("owner_email"),
        },
    }
}

#[async_trait]
impl PropertyRepository for PgPropertyRepository {
    async fn list_with_lock(&self) -> AccessResult<Vec<Property>> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.name, p.lock_id, u.id AS owner_id, u.email AS owner_email
            FROM properties p
            JOIN users u ON u.id = p.owner_id
            WHERE p.lock_id IS NOT NULL
            ORDER BY p.created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(rows.into_iter().map(property_from_row).collect())
    }

    async fn get_by_booking(&self, booking_id: Uuid) -> AccessResult<Option<Property>> {
        let row = sqlx::query(
            r#"
            SELECT p.id, p.name, p.lock_id, u.id AS owner_id, u.email AS owner_email
            FROM bookings b
            JOIN properties p ON p.id = b.property_id
            JOIN users u ON u.id = p.owner_id
            WHERE b.id = $1
            "#,
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(row.map(property_from_row))
    }
}
