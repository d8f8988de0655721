//! Audit trail model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Immutable record of one dispatch and its outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AuditEntry {
    pub id: Uuid,
    pub authorization_code_id: Option<Uuid>,
    pub command: String,
    pub response_status: String,
    pub response_message: Option<String>,
    pub accessed_at: DateTime<Utc>,
}

/// Audit entry creation payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAuditEntry {
    pub authorization_code_id: Option<Uuid>,
    pub command: String,
    pub response_status: String,
    pub response_message: Option<String>,
}

/// Request body for a command sent straight to a lock, outside any booking
#[derive(Debug, Clone, Deserialize)]
pub struct AdminCommandRequest {
    /// `"<deviceId>:<base64Key>"`
    pub lock_identifier: String,
    pub command: String,
}
