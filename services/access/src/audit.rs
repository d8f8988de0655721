//! Append-only audit trail of lock commands

use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::dispatcher::CommandResult;
use crate::error::AccessResult;
use crate::models::{AuditEntry, NewAuditEntry};
use crate::repositories::AuditStore;

/// Records every dispatched command together with the device's answer
#[derive(Clone)]
pub struct AccessAuditLog {
    store: Arc<dyn AuditStore>,
}

impl AccessAuditLog {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Append one entry; `payload` is stored as its JSON text
    pub async fn record(
        &self,
        command: &str,
        status: i32,
        payload: &serde_json::Value,
        authorization_code_id: Option<Uuid>,
    ) -> AccessResult<AuditEntry> {
        let entry = self
            .store
            .append(new_entry(command, status, payload, authorization_code_id))
            .await?;

        debug!(command, status, entry_id = %entry.id, "Recorded audit entry");
        Ok(entry)
    }

    pub async fn record_result(
        &self,
        command: &str,
        result: &CommandResult,
        authorization_code_id: Option<Uuid>,
    ) -> AccessResult<AuditEntry> {
        self.record(command, result.status_code, &result.raw_payload, authorization_code_id)
            .await
    }

    /// Append one entry per `(command, result)` pair as a single unit
    ///
    /// Either every entry is stored or, on error, none of them.
    pub async fn record_results(
        &self,
        results: &[(&str, &CommandResult)],
        authorization_code_id: Option<Uuid>,
    ) -> AccessResult<Vec<AuditEntry>> {
        let entries = results
            .iter()
            .map(|(command, result)| {
                new_entry(
                    command,
                    result.status_code,
                    &result.raw_payload,
                    authorization_code_id,
                )
            })
            .collect();

        let stored = self.store.append_all(entries).await?;
        debug!(count = stored.len(), "Recorded audit entries");
        Ok(stored)
    }

    /// Entries recorded against one authorization code, oldest first
    pub async fn entries_for_code(
        &self,
        authorization_code_id: Uuid,
    ) -> AccessResult<Vec<AuditEntry>> {
        self.store.list_for_code(authorization_code_id).await
    }
}

fn new_entry(
    command: &str,
    status: i32,
    payload: &serde_json::Value,
    authorization_code_id: Option<Uuid>,
) -> NewAuditEntry {
    NewAuditEntry {
        authorization_code_id,
        command: command.to_string(),
        response_status: status.to_string(),
        response_message: (!payload.is_null()).then(|| payload.to_string()),
    }
}
