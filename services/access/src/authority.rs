//! Authorization codes for booking-scoped lock access
//!
//! Each booking holds at most one code. Issuing a new code supersedes the
//! previous one; codes are never edited in place.

use chrono::{DateTime, Utc};
use rand::RngCore;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AccessError, AccessResult};
use crate::models::{AuthorizationCode, NewAuthorizationCode};
use crate::repositories::AuthorizationCodeStore;

/// Random bytes behind every code (128 bits)
const CODE_BYTES: usize = 16;

/// Generate an opaque hex-encoded code
pub fn generate_code() -> String {
    let mut bytes = [0u8; CODE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Compare secrets without short-circuiting on the first differing byte
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

fn accepts(stored: &AuthorizationCode, code: &str, now: DateTime<Utc>) -> bool {
    constant_time_eq(stored.code.as_bytes(), code.as_bytes()) && stored.covers(now)
}

/// Issues, looks up, validates and revokes authorization codes
#[derive(Clone)]
pub struct AccessCodeAuthority {
    store: Arc<dyn AuthorizationCodeStore>,
}

impl AccessCodeAuthority {
    pub fn new(store: Arc<dyn AuthorizationCodeStore>) -> Self {
        Self { store }
    }

    /// Issue a fresh code for `booking_id`, replacing any existing one
    pub async fn issue(
        &self,
        booking_id: Uuid,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> AccessResult<AuthorizationCode> {
        if valid_from >= valid_until {
            return Err(AccessError::Validation(format!(
                "valid_from ({}) must be before valid_until ({})",
                valid_from, valid_until
            )));
        }

        let code = self
            .store
            .replace_for_booking(NewAuthorizationCode {
                booking_id,
                code: generate_code(),
                valid_from,
                valid_until,
            })
            .await?;

        info!(booking_id = %booking_id, code_id = %code.id, "Issued authorization code");
        Ok(code)
    }

    pub async fn get(&self, booking_id: Uuid) -> AccessResult<AuthorizationCode> {
        self.store
            .find_by_booking(booking_id)
            .await?
            .ok_or_else(|| not_found(booking_id))
    }

    /// Delete the booking's code and return it
    pub async fn revoke(&self, booking_id: Uuid) -> AccessResult<AuthorizationCode> {
        let code = self
            .store
            .delete_by_booking(booking_id)
            .await?
            .ok_or_else(|| not_found(booking_id))?;

        info!(booking_id = %booking_id, code_id = %code.id, "Revoked authorization code");
        Ok(code)
    }

    /// Whether `code` is the booking's current code and `now` lies in its window
    ///
    /// Reads without isolation against a concurrent revoke.
    pub async fn is_valid(
        &self,
        booking_id: Uuid,
        code: &str,
        now: DateTime<Utc>,
    ) -> AccessResult<bool> {
        let Some(stored) = self.store.find_by_booking(booking_id).await? else {
            debug!(booking_id = %booking_id, "No authorization code for booking");
            return Ok(false);
        };

        Ok(accepts(&stored, code, now))
    }

    /// Like [`Self::is_valid`] but hands back the matching code
    ///
    /// Any refusal, including a missing code, is [`AccessError::Forbidden`].
    pub async fn authorize(
        &self,
        booking_id: Uuid,
        code: &str,
        now: DateTime<Utc>,
    ) -> AccessResult<AuthorizationCode> {
        match self.store.find_by_booking(booking_id).await? {
            Some(stored) if accepts(&stored, code, now) => Ok(stored),
            _ => {
                info!(booking_id = %booking_id, "Rejected authorization code");
                Err(AccessError::Forbidden(format!(
                    "authorization code not valid for booking {}",
                    booking_id
                )))
            }
        }
    }
}

fn not_found(booking_id: Uuid) -> AccessError {
    AccessError::NotFound(format!("no authorization code for booking {}", booking_id))
}
