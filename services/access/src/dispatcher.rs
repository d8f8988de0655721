//! Lock command dispatch
//!
//! Encrypts a command under the device key, wraps it in an envelope and
//! invokes the matching remote method on the device. No retries happen here;
//! callers decide whether a failed dispatch is worth repeating.

pub mod cipher;
pub mod command;
pub mod transport;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::credential::DeviceCredential;
use crate::error::{AccessError, AccessResult};

pub use cipher::CommandCipher;
pub use command::{CommandPayload, CommandResult, LockCommand};
pub use transport::{DeviceMethodTransport, IotHubSettings, IotHubTransport, MethodResponse};

pub const ENVELOPE_CONTENT_TYPE: &str = "application/json";
pub const ENVELOPE_CONTENT_ENCODING: &str = "utf-8";

/// Body of the envelope; `command` holds the encrypted token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeBody {
    pub command: String,
}

/// Message attached to a direct method call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEnvelope {
    pub message_id: Uuid,
    pub content_type: String,
    pub content_encoding: String,
    pub body: EnvelopeBody,
}

impl CommandEnvelope {
    /// Encrypt `command` and wrap it under a fresh message id
    pub fn seal(cipher: &CommandCipher, command: &str) -> AccessResult<Self> {
        Ok(Self {
            message_id: Uuid::new_v4(),
            content_type: ENVELOPE_CONTENT_TYPE.to_string(),
            content_encoding: ENVELOPE_CONTENT_ENCODING.to_string(),
            body: EnvelopeBody {
                command: cipher.encrypt(command)?,
            },
        })
    }

    /// Recover the plaintext command
    pub fn open(&self, cipher: &CommandCipher) -> AccessResult<String> {
        cipher.decrypt(&self.body.command)
    }
}

/// Sends encrypted commands to locks
#[derive(Clone)]
pub struct LockCommandDispatcher {
    transport: Arc<dyn DeviceMethodTransport>,
}

impl LockCommandDispatcher {
    pub fn new(transport: Arc<dyn DeviceMethodTransport>) -> Self {
        Self { transport }
    }

    /// Dispatch `command` to the device named by `credential`
    ///
    /// Format problems (empty command, unusable key) are reported before any
    /// network traffic. Transport failures come back as
    /// [`AccessError::Dispatch`].
    pub async fn dispatch(
        &self,
        credential: &DeviceCredential,
        command: &str,
    ) -> AccessResult<CommandResult> {
        if command.trim().is_empty() {
            return Err(AccessError::Format("command must not be empty".to_string()));
        }

        let cipher = CommandCipher::new(credential.symmetric_key())?;
        let envelope = CommandEnvelope::seal(&cipher, command)?;

        debug!(
            device_id = credential.device_id(),
            command,
            message_id = %envelope.message_id,
            "Dispatching lock command"
        );

        let response = self
            .transport
            .invoke(credential.device_id(), command, &envelope)
            .await
            .inspect_err(|e| {
                warn!(device_id = credential.device_id(), command, "Dispatch failed: {}", e);
            })?;

        let result = CommandResult::interpret(
            &LockCommand::from(command),
            response.status,
            response.payload,
        );

        info!(
            device_id = credential.device_id(),
            command,
            status = result.status_code,
            "Lock command completed"
        );

        Ok(result)
    }
}
