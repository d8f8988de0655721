//! Authenticated encryption of lock commands
//!
//! AES-256-GCM with a fresh random nonce per message. Tokens are
//! `base64(nonce || ciphertext || tag)`.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};

use crate::error::{AccessError, AccessResult};

const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;
pub const KEY_SIZE: usize = 32;

/// Cipher bound to one device key
pub struct CommandCipher {
    cipher: Aes256Gcm,
}

impl CommandCipher {
    pub fn new(key: &[u8]) -> AccessResult<Self> {
        if key.len() != KEY_SIZE {
            return Err(AccessError::Format(format!(
                "device key must be {} bytes, got {}",
                KEY_SIZE,
                key.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| AccessError::Format(format!("invalid device key: {}", e)))?;

        Ok(Self { cipher })
    }

    /// Encrypt `plaintext` into a base64 token
    pub fn encrypt(&self, plaintext: &str) -> AccessResult<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| AccessError::Format("command encryption failed".to_string()))?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend(ciphertext);
        Ok(BASE64.encode(combined))
    }

    /// Decrypt a token produced by [`CommandCipher::encrypt`]
    ///
    /// Fails if the token was altered in any way.
    pub fn decrypt(&self, token: &str) -> AccessResult<String> {
        let data = BASE64
            .decode(token)
            .map_err(|e| AccessError::Format(format!("token is not valid base64: {}", e)))?;

        if data.len() < NONCE_SIZE + TAG_SIZE {
            return Err(AccessError::Format("token too short".to_string()));
        }

        let (nonce, ciphertext) = data.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| AccessError::Format("token failed authentication".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|e| AccessError::Format(format!("decrypted command is not UTF-8: {}", e)))
    }
}
