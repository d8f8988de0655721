//! Storage traits and their PostgreSQL implementations

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AccessResult;
use crate::models::{AuditEntry, AuthorizationCode, NewAuditEntry, NewAuthorizationCode, Property};

pub mod audit;
pub mod authorization_code;
pub mod job_resource;
pub mod property;

pub use audit::PgAuditStore;
pub use authorization_code::PgAuthorizationCodeStore;
pub use job_resource::{PgJobResource, PgResourceFactory};
pub use property::PgPropertyRepository;

/// Storage for authorization codes, at most one per booking
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthorizationCodeStore: Send + Sync {
    /// Store `code`, superseding any code the booking already has
    async fn replace_for_booking(
        &self,
        code: NewAuthorizationCode,
    ) -> AccessResult<AuthorizationCode>;

    async fn find_by_booking(&self, booking_id: Uuid) -> AccessResult<Option<AuthorizationCode>>;

    /// Delete the booking's code, returning what was removed
    async fn delete_by_booking(&self, booking_id: Uuid) -> AccessResult<Option<AuthorizationCode>>;
}

/// Append-only audit storage
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: NewAuditEntry) -> AccessResult<AuditEntry>;

    /// Store all `entries` or none of them
    async fn append_all(&self, entries: Vec<NewAuditEntry>) -> AccessResult<Vec<AuditEntry>>;

    async fn list_for_code(&self, authorization_code_id: Uuid) -> AccessResult<Vec<AuditEntry>>;
}

/// Read access to the properties owned by the booking service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PropertyRepository: Send + Sync {
    /// Every property that has a lock identifier
    async fn list_with_lock(&self) -> AccessResult<Vec<Property>>;

    /// Property a booking refers to
    async fn get_by_booking(&self, booking_id: Uuid) -> AccessResult<Option<Property>>;
}
