//! Property model as seen by the access service
//!
//! Properties are owned by the booking service; this is the read-only
//! projection needed to reach a lock and its owner.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Owner of a property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub id: Uuid,
    pub email: String,
}

/// Rental property, optionally equipped with a lock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: Uuid,
    pub name: String,
    /// Stored lock identifier, `"<deviceId>:<base64Key>"`
    pub lock_id: Option<String>,
    pub owner: Owner,
}
