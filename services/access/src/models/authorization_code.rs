//! Authorization code model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Time-windowed secret granting permission to command a booking's lock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AuthorizationCode {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub code: String,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl AuthorizationCode {
    /// Whether `now` falls inside the validity window, both ends inclusive
    pub fn covers(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && now <= self.valid_until
    }
}

/// Authorization code creation payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAuthorizationCode {
    pub booking_id: Uuid,
    pub code: String,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

/// Request body for issuing a code
#[derive(Debug, Clone, Deserialize)]
pub struct IssueCodeRequest {
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

/// Request body carrying a code presented by a guest
#[derive(Debug, Clone, Deserialize)]
pub struct CodeRequest {
    pub code: String,
}

/// Response for code validation
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResponse {
    pub is_valid: bool,
}
