//! Device credential parsing
//!
//! A property stores its lock as a single `"<deviceId>:<base64Key>"` string.
//! It is parsed into a [`DeviceCredential`] at the point of use and never
//! persisted in structured form.

use base64::{
    Engine,
    engine::general_purpose::{STANDARD, URL_SAFE},
};
use std::fmt;
use std::str::FromStr;

use crate::error::{AccessError, AccessResult};

/// Device identifier plus the symmetric key used to encrypt its commands
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceCredential {
    device_id: String,
    symmetric_key: Vec<u8>,
}

impl DeviceCredential {
    /// Parse a lock identifier, splitting on the first `:`
    pub fn parse(identifier: &str) -> AccessResult<Self> {
        let (device_id, encoded_key) = identifier.split_once(':').ok_or_else(|| {
            AccessError::Format("lock identifier is missing the ':' separator".to_string())
        })?;

        if device_id.is_empty() {
            return Err(AccessError::Format(
                "lock identifier has an empty device id".to_string(),
            ));
        }

        // Keys generated for the locks use either alphabet
        let symmetric_key = STANDARD
            .decode(encoded_key)
            .or_else(|_| URL_SAFE.decode(encoded_key))
            .map_err(|e| AccessError::Format(format!("lock key is not valid base64: {}", e)))?;

        if symmetric_key.is_empty() {
            return Err(AccessError::Format("lock identifier has an empty key".to_string()));
        }

        Ok(Self {
            device_id: device_id.to_string(),
            symmetric_key,
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn symmetric_key(&self) -> &[u8] {
        &self.symmetric_key
    }
}

impl FromStr for DeviceCredential {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// Never print key material
impl fmt::Debug for DeviceCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceCredential")
            .field("device_id", &self.device_id)
            .field("symmetric_key", &"<redacted>")
            .finish()
    }
}
