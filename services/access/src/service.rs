//! Booking-scoped lock operations
//!
//! Ties the authority, the dispatcher and the audit log together for the
//! HTTP surface: a guest presents the booking's code, the command goes to the
//! booking's lock and the round-trip is audited against that code.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::audit::AccessAuditLog;
use crate::authority::AccessCodeAuthority;
use crate::credential::DeviceCredential;
use crate::dispatcher::{CommandResult, LockCommand, LockCommandDispatcher};
use crate::error::{AccessError, AccessResult};
use crate::models::AuditEntry;
use crate::repositories::PropertyRepository;

#[derive(Clone)]
pub struct AccessService {
    authority: AccessCodeAuthority,
    properties: Arc<dyn PropertyRepository>,
    dispatcher: LockCommandDispatcher,
    audit: AccessAuditLog,
}

impl AccessService {
    pub fn new(
        authority: AccessCodeAuthority,
        properties: Arc<dyn PropertyRepository>,
        dispatcher: LockCommandDispatcher,
        audit: AccessAuditLog,
    ) -> Self {
        Self {
            authority,
            properties,
            dispatcher,
            audit,
        }
    }

    pub fn authority(&self) -> &AccessCodeAuthority {
        &self.authority
    }

    pub async fn open_door(&self, booking_id: Uuid, code: &str) -> AccessResult<CommandResult> {
        self.send_booking_command(booking_id, code, LockCommand::OpenLock.as_str())
            .await
    }

    pub async fn close_door(&self, booking_id: Uuid, code: &str) -> AccessResult<CommandResult> {
        self.send_booking_command(booking_id, code, LockCommand::CloseLock.as_str())
            .await
    }

    /// Send `command` to the booking's lock if `code` is currently valid
    ///
    /// An unknown booking is [`AccessError::NotFound`] before any code check,
    /// a refused code is [`AccessError::Forbidden`].
    pub async fn send_booking_command(
        &self,
        booking_id: Uuid,
        code: &str,
        command: &str,
    ) -> AccessResult<CommandResult> {
        let property = self
            .properties
            .get_by_booking(booking_id)
            .await?
            .ok_or_else(|| {
                AccessError::NotFound(format!("no property for booking {}", booking_id))
            })?;

        let authorization = self.authority.authorize(booking_id, code, Utc::now()).await?;

        let lock_id = property.lock_id.as_deref().ok_or_else(|| {
            AccessError::NotFound(format!("property {} has no lock", property.id))
        })?;

        let credential = DeviceCredential::parse(lock_id)?;
        let result = self.dispatcher.dispatch(&credential, command).await?;
        self.audit
            .record_result(command, &result, Some(authorization.id))
            .await?;

        info!(
            booking_id = %booking_id,
            property_id = %property.id,
            command,
            status = result.status_code,
            "Booking command sent"
        );

        Ok(result)
    }

    /// Send `command` straight to a lock, audited without an authorization code
    pub async fn send_admin_command(
        &self,
        lock_identifier: &str,
        command: &str,
    ) -> AccessResult<CommandResult> {
        let credential = DeviceCredential::parse(lock_identifier)?;
        let result = self.dispatcher.dispatch(&credential, command).await?;
        self.audit.record_result(command, &result, None).await?;
        Ok(result)
    }

    /// Audit entries recorded against the booking's current code
    pub async fn audit_trail(&self, booking_id: Uuid) -> AccessResult<Vec<AuditEntry>> {
        let code = self.authority.get(booking_id).await?;
        self.audit.entries_for_code(code.id).await
    }
}
